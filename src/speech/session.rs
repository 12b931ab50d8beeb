use super::{RecognitionEngine, RecognitionEvent, RecognitionOptions, SpeechError};

/// Where a recognition session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recognizing,
    /// The session ended with a transcript that has not been taken yet.
    Complete { transcript: String },
}

/// What a handled engine event means for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Ignored,
    Started,
    /// Displayed transcript changed.
    Transcript(String),
    /// Session ended with a transcript; fetch it with `take_transcript`.
    Completed,
    /// Session ended without anything to extract.
    Ended,
    Error(String),
}

/// Explicit state machine over one recognition engine.
pub struct SpeechSession {
    engine: Box<dyn RecognitionEngine>,
    options: RecognitionOptions,
    events: async_channel::Sender<RecognitionEvent>,
    state: SessionState,
    transcript: String,
}

impl SpeechSession {
    pub fn new(
        engine: Box<dyn RecognitionEngine>,
        options: RecognitionOptions,
        events: async_channel::Sender<RecognitionEvent>,
    ) -> Self {
        Self {
            engine,
            options,
            events,
            state: SessionState::Idle,
            transcript: String::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_recognizing(&self) -> bool {
        self.state == SessionState::Recognizing
    }

    /// Transcript to display while recognizing.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Request permission and start the engine.
    ///
    /// The state stays unchanged when permission is denied or the engine
    /// refuses to start.
    pub fn start(&mut self) -> Result<(), SpeechError> {
        match &self.state {
            SessionState::Recognizing => {
                log::warn!("Start requested while already recognizing");
                return Ok(());
            }
            SessionState::Complete { .. } => {
                log::warn!("Discarding untaken transcript from previous session");
            }
            SessionState::Idle => {}
        }

        let permission = self.engine.request_permissions();
        if !permission.granted {
            log::info!(
                "Microphone permission denied (can_ask_again={})",
                permission.can_ask_again
            );
            return Err(SpeechError::PermissionDenied {
                can_ask_again: permission.can_ask_again,
            });
        }

        self.engine.start(&self.options, self.events.clone())?;
        self.transcript.clear();
        self.state = SessionState::Recognizing;
        log::info!("Speech session started");
        Ok(())
    }

    /// Ask the engine to end the session. The engine follows with `End`.
    pub fn stop(&mut self) {
        if self.is_recognizing() {
            log::info!("Stopping speech session");
            self.engine.stop();
        }
    }

    pub fn handle_event(&mut self, event: RecognitionEvent) -> SessionUpdate {
        match event {
            RecognitionEvent::Start if self.is_recognizing() => SessionUpdate::Started,
            RecognitionEvent::Result { transcript, .. } if self.is_recognizing() => {
                self.transcript = transcript;
                SessionUpdate::Transcript(self.transcript.clone())
            }
            RecognitionEvent::End if self.is_recognizing() => {
                self.engine.stop();
                let transcript = std::mem::take(&mut self.transcript);
                if transcript.trim().is_empty() {
                    log::info!("Speech session ended with no transcript");
                    self.state = SessionState::Idle;
                    SessionUpdate::Ended
                } else {
                    log::info!("Speech session complete");
                    self.state = SessionState::Complete { transcript };
                    SessionUpdate::Completed
                }
            }
            RecognitionEvent::Error(message) => {
                log::error!("Recognition error: {message}");
                SessionUpdate::Error(message)
            }
            other => {
                log::debug!("Ignoring {other:?} in state {:?}", self.state);
                SessionUpdate::Ignored
            }
        }
    }

    /// Hand off the completed transcript. Returns `Some` at most once per
    /// session and moves the state back to `Idle`.
    pub fn take_transcript(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Complete { transcript } => Some(transcript),
            other => {
                self.state = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::PermissionStatus;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        starts: usize,
        stops: usize,
    }

    struct MockEngine {
        permission: PermissionStatus,
        fail_start: bool,
        calls: Rc<RefCell<Calls>>,
    }

    impl RecognitionEngine for MockEngine {
        fn request_permissions(&mut self) -> PermissionStatus {
            self.permission
        }

        fn start(
            &mut self,
            _options: &RecognitionOptions,
            events: async_channel::Sender<RecognitionEvent>,
        ) -> Result<(), SpeechError> {
            if self.fail_start {
                return Err(SpeechError::ModelNotReady);
            }
            self.calls.borrow_mut().starts += 1;
            let _ = events.try_send(RecognitionEvent::Start);
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.borrow_mut().stops += 1;
        }
    }

    fn session_with(
        permission: PermissionStatus,
    ) -> (
        SpeechSession,
        async_channel::Receiver<RecognitionEvent>,
        Rc<RefCell<Calls>>,
    ) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let engine = MockEngine {
            permission,
            fail_start: false,
            calls: calls.clone(),
        };
        let (tx, rx) = async_channel::unbounded();
        let session = SpeechSession::new(Box::new(engine), RecognitionOptions::default(), tx);
        (session, rx, calls)
    }

    fn result(text: &str) -> RecognitionEvent {
        RecognitionEvent::Result {
            transcript: text.into(),
            is_final: false,
        }
    }

    #[test]
    fn granted_start_enters_recognizing() {
        let (mut session, rx, calls) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        assert!(session.is_recognizing());
        assert_eq!(calls.borrow().starts, 1);
        assert_eq!(session.handle_event(rx.try_recv().unwrap()), SessionUpdate::Started);
    }

    #[test]
    fn denied_permission_keeps_idle() {
        for can_ask_again in [true, false] {
            let (mut session, _rx, calls) = session_with(PermissionStatus {
                granted: false,
                can_ask_again,
            });
            match session.start() {
                Err(SpeechError::PermissionDenied { can_ask_again: c }) => {
                    assert_eq!(c, can_ask_again)
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(session.state(), &SessionState::Idle);
            assert_eq!(calls.borrow().starts, 0);
        }
    }

    #[test]
    fn engine_start_failure_keeps_idle() {
        let (tx, _rx) = async_channel::unbounded();
        let engine = MockEngine {
            permission: PermissionStatus::GRANTED,
            fail_start: true,
            calls: Rc::default(),
        };
        let mut session = SpeechSession::new(Box::new(engine), RecognitionOptions::default(), tx);
        assert!(matches!(session.start(), Err(SpeechError::ModelNotReady)));
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn last_result_is_handed_off_exactly_once() {
        let (mut session, _rx, _) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        session.handle_event(result("buy"));
        assert_eq!(
            session.handle_event(result("buy milk")),
            SessionUpdate::Transcript("buy milk".into())
        );
        assert_eq!(session.transcript(), "buy milk");

        assert_eq!(session.handle_event(RecognitionEvent::End), SessionUpdate::Completed);
        assert_eq!(session.take_transcript().as_deref(), Some("buy milk"));
        assert_eq!(session.take_transcript(), None);
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.transcript(), "");
    }

    #[test]
    fn blank_transcript_ends_without_handoff() {
        let (mut session, _rx, _) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        session.handle_event(result("   "));
        assert_eq!(session.handle_event(RecognitionEvent::End), SessionUpdate::Ended);
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.take_transcript(), None);
    }

    #[test]
    fn errors_do_not_change_state() {
        let (mut session, _rx, _) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        assert_eq!(
            session.handle_event(RecognitionEvent::Error("no-speech".into())),
            SessionUpdate::Error("no-speech".into())
        );
        assert!(session.is_recognizing());
    }

    #[test]
    fn events_outside_a_session_are_ignored() {
        let (mut session, _rx, _) = session_with(PermissionStatus::GRANTED);
        assert_eq!(session.handle_event(result("stray")), SessionUpdate::Ignored);
        assert_eq!(session.handle_event(RecognitionEvent::End), SessionUpdate::Ignored);
        assert_eq!(session.transcript(), "");
    }

    #[test]
    fn restart_from_complete_discards_untaken_transcript() {
        let (mut session, _rx, calls) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        session.handle_event(result("old words"));
        session.handle_event(RecognitionEvent::End);
        assert!(matches!(session.state(), SessionState::Complete { .. }));

        session.start().unwrap();
        assert!(session.is_recognizing());
        assert_eq!(calls.borrow().starts, 2);
        assert_eq!(session.take_transcript(), None);

        session.handle_event(result("new words"));
        session.handle_event(RecognitionEvent::End);
        assert_eq!(session.take_transcript().as_deref(), Some("new words"));
    }

    #[test]
    fn start_while_recognizing_is_a_noop() {
        let (mut session, _rx, calls) = session_with(PermissionStatus::GRANTED);
        session.start().unwrap();
        session.handle_event(result("keep me"));

        session.start().unwrap();
        assert_eq!(calls.borrow().starts, 1);
        assert!(session.is_recognizing());
        assert_eq!(session.transcript(), "keep me");
    }

    #[test]
    fn end_releases_the_engine() {
        for text in ["buy milk", ""] {
            let (mut session, _rx, calls) = session_with(PermissionStatus::GRANTED);
            session.start().unwrap();
            session.handle_event(result(text));
            session.handle_event(RecognitionEvent::End);
            assert_eq!(calls.borrow().stops, 1, "transcript {text:?}");
        }
    }

    #[test]
    fn stop_only_reaches_engine_while_recognizing() {
        let (mut session, _rx, calls) = session_with(PermissionStatus::GRANTED);
        session.stop();
        assert_eq!(calls.borrow().stops, 0);

        session.start().unwrap();
        session.stop();
        assert_eq!(calls.borrow().stops, 1);
        assert!(session.is_recognizing());
    }
}
