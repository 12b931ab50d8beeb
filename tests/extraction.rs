use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use voice_tasks::{
    CorruptStorePolicy, ExtractError, GeminiClient, LanguageModel, MemoryStorage, TaskExtractor,
    TaskHub, TaskStore,
};

/// Canned model that records the prompts it receives.
struct StubModel {
    reply: Result<String, ExtractError>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StubModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(error: ExtractError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn generate(&self, prompt: &str) -> Result<String, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

const TWO_TASKS: &str = "```json\n{\n  \"message\": \"Added two tasks\",\n  \"addTasks\": [\n    {\"task\": \"Buy milk\"},\n    {\"task\": \"Call mom\"}\n  ]\n}\n```";

#[tokio::test]
async fn speech_to_persisted_tasks() {
    let model = StubModel::replying(TWO_TASKS);
    let extractor = TaskExtractor::new(model.clone());

    let storage = Arc::new(MemoryStorage::new());
    let store = TaskStore::new(storage, "tasks");
    let hub = TaskHub::open(store.clone(), CorruptStorePolicy::Reset).unwrap();
    hub.add_task("existing").unwrap();

    let result = extractor.extract("buy milk and call mom").await.unwrap();
    assert_eq!(result.add_tasks.len(), 2);
    assert_eq!(result.message, "Added two tasks");

    let ids = hub.append_extracted(&result).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(hub.snapshot().len(), 3);

    let persisted = store.load().unwrap();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted[1].text, "Buy milk");
    assert_eq!(persisted[2].text, "Call mom");
    assert!(persisted[1..].iter().all(|t| !t.completed));

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].ends_with("buy milk and call mom"));
    assert!(prompts[0].contains("\"addTasks\""));
}

#[tokio::test]
async fn blank_input_never_reaches_the_model() {
    let model = StubModel::replying(TWO_TASKS);
    let extractor = TaskExtractor::new(model.clone());

    for text in ["", "   ", "\n"] {
        assert!(matches!(
            extractor.extract(text).await,
            Err(ExtractError::EmptyInput)
        ));
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prose_reply_is_malformed() {
    let extractor = TaskExtractor::new(StubModel::replying("I couldn't find any tasks."));
    let err = extractor.extract("hello there").await.unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse(_)));
    assert_eq!(
        err.user_message(),
        "Failed to process the response. Please try again."
    );
}

#[tokio::test]
async fn service_errors_pass_through() {
    let extractor = TaskExtractor::new(StubModel::failing(ExtractError::ServiceUnavailable(
        "timeout".into(),
    )));
    let err = extractor.extract("buy milk").await.unwrap_err();
    assert!(matches!(err, ExtractError::ServiceUnavailable(_)));
    assert_eq!(
        err.user_message(),
        "Failed to connect to the server. Please try again."
    );
}

/// Serve exactly one HTTP response; resolves to the raw request body.
async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while request.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        String::from_utf8_lossy(&request[header_end..]).to_string()
    });

    (base_url, handle)
}

#[tokio::test]
async fn gemini_client_sends_fixed_config_and_reads_candidates() {
    let reply = serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": TWO_TASKS }] },
            "finishReason": "STOP"
        }]
    })
    .to_string();
    let (base_url, server) = serve_once("200 OK", reply).await;

    let client = GeminiClient::new("test-key", "gemini-test").with_base_url(base_url);
    let extractor = TaskExtractor::new(Arc::new(client));
    let result = extractor.extract("buy milk and call mom").await.unwrap();
    assert_eq!(result.add_tasks.len(), 2);

    let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    let config = &request["generation_config"];
    assert_eq!(config["top_p"].as_f64().map(|v| (v * 100.0).round()), Some(95.0));
    assert_eq!(config["top_k"], 40);
    assert_eq!(config["max_output_tokens"], 8192);
    assert_eq!(config["temperature"], 1.0);
    assert_eq!(config["response_mime_type"], "text/plain");
    let text = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(text.ends_with("buy milk and call mom"));
}

#[tokio::test]
async fn http_failure_is_service_unavailable() {
    let (base_url, server) =
        serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#.to_string()).await;

    let client = GeminiClient::new("k", "m").with_base_url(base_url);
    let err = client.generate("prompt").await.unwrap_err();
    assert!(matches!(err, ExtractError::ServiceUnavailable(ref m) if m.contains("503")));
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_service_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::new("k", "m").with_base_url(format!("http://{addr}"));
    assert!(matches!(
        client.generate("prompt").await,
        Err(ExtractError::ServiceUnavailable(_))
    ));
}

#[tokio::test]
async fn empty_candidates_are_malformed() {
    let (base_url, server) = serve_once("200 OK", r#"{"candidates":[]}"#.to_string()).await;

    let client = GeminiClient::new("k", "m").with_base_url(base_url);
    assert!(matches!(
        client.generate("prompt").await,
        Err(ExtractError::MalformedResponse(_))
    ));
    server.await.unwrap();
}
