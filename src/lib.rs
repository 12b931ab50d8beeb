//! Voice-driven task list core: task persistence, the shared task hub,
//! speech capture sessions and language-model task extraction.

pub mod config;
pub mod extractor;
pub mod hub;
pub mod recorder;
pub mod speech;
pub mod storage;
pub mod store;
pub mod task;
pub mod task_list;
pub mod transcriber;

pub use config::{Config, ConfigError};
pub use extractor::{
    ExtractError, ExtractedTask, ExtractionResult, GeminiClient, LanguageModel, TaskExtractor,
};
pub use hub::TaskHub;
pub use speech::{
    PermissionStatus, RecognitionEngine, RecognitionEvent, RecognitionOptions, SessionState,
    SessionUpdate, SpeechError, SpeechSession,
};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{CorruptStorePolicy, StoreError, TaskStore};
pub use task::{Task, TaskId};
pub use task_list::ScreenTaskList;
