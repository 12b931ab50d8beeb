use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used when the configuration does not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";

const TEMPERATURE: f32 = 1.0;
const TOP_P: f32 = 0.95;
const TOP_K: u32 = 40;
const MAX_OUTPUT_TOKENS: u32 = 8192;
const RESPONSE_MIME_TYPE: &str = "text/plain";

const INSTRUCTION_PROMPT: &str = r#"You are a virtual assistant. Treat the following speech input as if the user is talking to you and create the tasks it asks for. Respond with the tasks in a structured JSON format exactly like this:
{
  "message": "Added two tasks",
  "addTasks": [
    {
      "task": "<task text>"
    },
    {
      "task": "<task text>"
    }
  ]
}
Use "message" to briefly say what you did, or that no tasks were found.
When the user asks to split a task or make tasks separate, create n tasks and number them numerically.
Only include tasks that are clear and actionable. If there are no clear tasks, return an empty "addTasks" list with a message explaining that no tasks were found. Do not include any other fields or information. Here is the speech:
"#;

/// Pipeline failures. None of these are fatal; the user may simply retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("input is empty")]
    EmptyInput,
    #[error("language model unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("malformed language model response: {0}")]
    MalformedResponse(String),
}

impl ExtractError {
    /// Short text suitable for an alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Please enter a message to process.",
            Self::ServiceUnavailable(_) => "Failed to connect to the server. Please try again.",
            Self::MalformedResponse(_) => "Failed to process the response. Please try again.",
        }
    }

    /// Alert heading matching `user_message`.
    pub fn title(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Input Required",
            Self::ServiceUnavailable(_) | Self::MalformedResponse(_) => "Error",
        }
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::ServiceUnavailable(e.to_string())
        }
    }
}

/// One task proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedTask {
    pub task: String,
}

/// Parsed model reply: a status line plus the tasks to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionResult {
    pub message: String,
    #[serde(rename = "addTasks")]
    pub add_tasks: Vec<ExtractedTask>,
}

/// A hosted text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one prompt and return the model's raw text reply.
    async fn generate(&self, prompt: &str) -> Result<String, ExtractError>;
}

/// Gemini request types
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: RESPONSE_MIME_TYPE,
        }
    }
}

/// Gemini response types
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// `generateContent` client for the Gemini REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host, e.g. a local proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ExtractError> {
        let body = GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ExtractError::ServiceUnavailable(format!(
                "Gemini API error {status}: {text}"
            )));
        }

        let gemini_resp: GeminiResponse = resp.json().await?;

        gemini_resp
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ExtractError::MalformedResponse("response has no candidates".into()))
    }
}

/// Turns free-form text into tasks through a language model.
#[derive(Clone)]
pub struct TaskExtractor {
    model: Arc<dyn LanguageModel>,
}

impl TaskExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Ask the model for tasks contained in `raw_text`.
    ///
    /// Blank input fails with `EmptyInput` without contacting the model.
    pub async fn extract(&self, raw_text: &str) -> Result<ExtractionResult, ExtractError> {
        if raw_text.trim().is_empty() {
            return Err(ExtractError::EmptyInput);
        }

        let prompt = build_prompt(raw_text);
        let reply = self.model.generate(&prompt).await?;
        log::debug!("Model reply: {reply}");

        let result = parse_reply(&reply)?;
        log::info!(
            "Extracted {} task(s): {}",
            result.add_tasks.len(),
            result.message
        );
        Ok(result)
    }
}

/// Instruction template followed by the user's text.
pub fn build_prompt(raw_text: &str) -> String {
    format!("{INSTRUCTION_PROMPT}{raw_text}")
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        text = rest[tag_len..].trim();
    }
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse and validate a raw model reply.
pub fn parse_reply(reply: &str) -> Result<ExtractionResult, ExtractError> {
    let cleaned = strip_code_fences(reply);
    let result: ExtractionResult = serde_json::from_str(cleaned)
        .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;

    if let Some(index) = result.add_tasks.iter().position(|t| t.task.trim().is_empty()) {
        return Err(ExtractError::MalformedResponse(format!(
            "addTasks[{index}] has blank task text"
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{"message":"Added two tasks","addTasks":[{"task":"Buy milk"},{"task":"Call mom"}]}"#;

    #[test]
    fn fenced_and_plain_replies_parse_identically() {
        let plain = parse_reply(REPLY).unwrap();
        for fenced in [
            format!("```json\n{REPLY}\n```"),
            format!("```\n{REPLY}\n```"),
            format!("  ```JSON\n{REPLY}```  \n"),
            format!("```{REPLY}```"),
        ] {
            assert_eq!(parse_reply(&fenced).unwrap(), plain, "reply: {fenced}");
        }
        assert_eq!(plain.add_tasks.len(), 2);
    }

    #[test]
    fn strip_leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn empty_task_list_is_valid() {
        let result =
            parse_reply(r#"{"message":"No tasks were found","addTasks":[]}"#).unwrap();
        assert!(result.add_tasks.is_empty());
    }

    #[test]
    fn schema_violations_are_malformed() {
        for bad in [
            "Sure! Here are your tasks.",
            r#"{"addTasks":[]}"#,
            r#"{"message":"ok"}"#,
            r#"{"message":"ok","addTasks":[{"text":"x"}]}"#,
            r#"{"message":"ok","addTasks":[{"task":"x","due":"today"}]}"#,
            r#"{"message":"ok","addTasks":[{"task":"   "}]}"#,
            r#"[{"task":"x"}]"#,
        ] {
            assert!(
                matches!(parse_reply(bad), Err(ExtractError::MalformedResponse(_))),
                "reply: {bad}"
            );
        }
    }

    #[test]
    fn prompt_ends_with_user_text() {
        let prompt = build_prompt("buy milk");
        assert!(prompt.starts_with("You are a virtual assistant."));
        assert!(prompt.ends_with("Here is the speech:\nbuy milk"));
    }

    #[test]
    fn generation_config_is_fixed() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["top_k"], 40);
        assert_eq!(json["max_output_tokens"], 8192);
        assert_eq!(json["response_mime_type"], "text/plain");
    }

    #[test]
    fn user_messages_distinguish_failures() {
        assert_ne!(
            ExtractError::ServiceUnavailable(String::new()).user_message(),
            ExtractError::MalformedResponse(String::new()).user_message()
        );
        assert_eq!(ExtractError::EmptyInput.title(), "Input Required");
    }

    #[test]
    fn endpoint_includes_model_and_key() {
        let client = GeminiClient::new("k", "m").with_base_url("http://localhost:1/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:1/m:generateContent?key=k"
        );
    }
}
