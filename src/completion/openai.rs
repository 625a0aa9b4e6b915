use super::{ChatMessage, CompletionError, CompletionService, FragmentMode, FragmentStream};
use crate::config::LeanCanvasConfig;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 512;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OpenAiCompatibleService {
    client: reqwest::Client,
    base_url: String,
    model_id: String,
    api_key: Option<String>,
    response_timeout: Duration,
    idle_timeout: Duration,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseLine {
    Content(String),
    Done,
    Failed(String),
    Ignored,
}

impl OpenAiCompatibleService {
    pub fn new(
        base_url: impl Into<String>,
        model_id: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| CompletionError::Request(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_id: model_id.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            response_timeout: RESPONSE_TIMEOUT,
            idle_timeout: STREAM_IDLE_TIMEOUT,
        })
    }

    pub fn from_config(config: &LeanCanvasConfig) -> Result<Self, CompletionError> {
        Self::new(
            config.base_url.clone(),
            config.model_id.clone(),
            Some(config.api_key.clone()),
        )
    }

    #[cfg(test)]
    fn with_timeouts(mut self, response_timeout: Duration, idle_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self.idle_timeout = idle_timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleService {
    fn fragment_mode(&self) -> FragmentMode {
        FragmentMode::Delta
    }

    async fn complete(&self, history: Vec<ChatMessage>) -> Result<FragmentStream, CompletionError> {
        let body = ChatCompletionRequest {
            model: self.model_id.as_str(),
            messages: history.as_slice(),
            stream: true,
        };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = tokio::time::timeout(self.response_timeout, request.send())
            .await
            .map_err(|_| {
                CompletionError::Request(format!("no response within {:?}", self.response_timeout))
            })?
            .map_err(|err| CompletionError::Request(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = tokio::time::timeout(self.idle_timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(CompletionError::Status {
                status,
                body: sanitize_error_body(&text),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(sse_fragments(body, self.idle_timeout))
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    line_buffer: Vec<u8>,
    ready: VecDeque<Result<String, CompletionError>>,
    finished: bool,
    idle_timeout: Duration,
}

impl SseState {
    fn consume_line(&mut self, line: &[u8]) {
        match parse_sse_line(line) {
            SseLine::Content(text) => self.ready.push_back(Ok(text)),
            SseLine::Failed(message) => {
                self.ready.push_back(Err(CompletionError::Service(message)));
                self.finished = true;
            }
            SseLine::Done => self.finished = true,
            SseLine::Ignored => {}
        }
    }

    fn drain_complete_lines(&mut self) {
        while !self.finished {
            let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n')
            else {
                break;
            };
            let line: Vec<u8> = self.line_buffer.drain(..=newline_index).collect();
            self.consume_line(&line);
        }
    }
}

fn sse_fragments(
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    idle_timeout: Duration,
) -> FragmentStream {
    let state = SseState {
        body,
        line_buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
        idle_timeout,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            let idle_timeout = state.idle_timeout;
            match tokio::time::timeout(idle_timeout, state.body.next()).await {
                Err(_) => {
                    state.finished = true;
                    let message = format!("no data received for {idle_timeout:?}");
                    return Some((Err(CompletionError::Stream(message)), state));
                }
                Ok(Some(Ok(chunk))) => {
                    state.line_buffer.extend_from_slice(&chunk);
                    state.drain_complete_lines();
                }
                Ok(Some(Err(err))) => {
                    state.finished = true;
                    return Some((Err(CompletionError::Stream(err.to_string())), state));
                }
                Ok(None) => {
                    let rest = std::mem::take(&mut state.line_buffer);
                    if !rest.is_empty() {
                        state.consume_line(&rest);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn parse_sse_line(raw: &[u8]) -> SseLine {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return SseLine::Failed(error.message);
            }
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if content.is_empty() {
                SseLine::Ignored
            } else {
                SseLine::Content(content)
            }
        }
        Err(err) => SseLine::Failed(
            CompletionError::Decode(format!("{err}: {}", sanitize_error_body(payload))).to_string(),
        ),
    }
}

fn sanitize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ChatRole;

    fn body_of(chunks: &[&str]) -> BoxStream<'static, reqwest::Result<Vec<u8>>> {
        let owned: Vec<reqwest::Result<Vec<u8>>> = chunks
            .iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        stream::iter(owned).boxed()
    }

    #[test]
    fn parse_sse_line_extracts_delta_content() {
        let line = br#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Content("Hel".to_string()));
    }

    #[test]
    fn parse_sse_line_handles_done_and_noise() {
        assert_eq!(parse_sse_line(b"data: [DONE]\r\n"), SseLine::Done);
        assert_eq!(parse_sse_line(b": keep-alive"), SseLine::Ignored);
        assert_eq!(parse_sse_line(b""), SseLine::Ignored);
        assert_eq!(
            parse_sse_line(br#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Ignored
        );
    }

    #[test]
    fn parse_sse_line_surfaces_service_errors() {
        let line = br#"data: {"error":{"message":"model not found"}}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Failed("model not found".to_string())
        );
        assert!(matches!(parse_sse_line(b"data: {not json"), SseLine::Failed(_)));
    }

    #[tokio::test]
    async fn sse_fragments_reassembles_lines_split_across_chunks() {
        let body = body_of(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ]);

        let fragments: Vec<String> = sse_fragments(body, STREAM_IDLE_TIMEOUT)
            .map(|fragment| fragment.expect("fragment should decode"))
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn sse_fragments_flushes_trailing_line_without_newline() {
        let body = body_of(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]);
        let fragments: Vec<Result<String, CompletionError>> =
            sse_fragments(body, STREAM_IDLE_TIMEOUT).collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().expect("tail fragment"), "tail");
    }

    #[test]
    fn request_body_uses_protocol_roles() {
        let history = vec![
            ChatMessage::new(ChatRole::System, "be brief"),
            ChatMessage::new(ChatRole::Assistant, "ok"),
        ];
        let body = ChatCompletionRequest {
            model: "llama3.2",
            messages: &history,
            stream: true,
        };
        let value = serde_json::to_value(&body).expect("request should encode");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["stream"], true);
    }

    #[tokio::test]
    async fn sse_fragments_fails_when_body_stalls() {
        let body: BoxStream<'static, reqwest::Result<Vec<u8>>> = stream::iter(vec![Ok(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n".to_vec(),
        )])
        .chain(stream::pending())
        .boxed();

        let fragments: Vec<Result<String, CompletionError>> =
            sse_fragments(body, Duration::from_millis(20)).collect().await;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].as_ref().expect("first fragment"), "Hel");
        assert!(matches!(fragments[1], Err(CompletionError::Stream(_))));
    }

    #[tokio::test]
    async fn complete_fails_when_server_never_responds() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("listener addr");
        let server = tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });

        let service = OpenAiCompatibleService::new(format!("http://{addr}/v1"), "m", None)
            .expect("client should build")
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
        let result = service
            .complete(vec![ChatMessage::new(ChatRole::User, "hi")])
            .await;

        assert!(matches!(result, Err(CompletionError::Request(_))));
        server.abort();
    }

    #[test]
    fn new_trims_trailing_slash_and_blank_key() {
        let service =
            OpenAiCompatibleService::new("http://localhost:11434/v1/", "m", Some(" ".into()))
                .expect("client should build");
        assert_eq!(service.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert!(service.api_key.is_none());
    }

    #[test]
    fn from_config_forwards_key_for_any_service_kind() {
        let config = LeanCanvasConfig {
            api_key: "proxy-key".to_string(),
            ..LeanCanvasConfig::default()
        };
        let service = OpenAiCompatibleService::from_config(&config).expect("client should build");
        assert_eq!(service.api_key.as_deref(), Some("proxy-key"));

        let keyless = OpenAiCompatibleService::from_config(&LeanCanvasConfig::default())
            .expect("client should build");
        assert!(keyless.api_key.is_none());
    }
}
