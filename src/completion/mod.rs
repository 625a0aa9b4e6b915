use crate::chat::transcript::ExchangeId;
use crate::event::AppEvent;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc};
use thiserror::Error;
use tokio::runtime::Handle;

pub mod openai;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMode {
    Delta,
    // Each fragment repeats the full text so far.
    Cumulative,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion stream read failed: {0}")]
    Stream(String),
    #[error("failed to decode completion chunk: {0}")]
    Decode(String),
    #[error("completion service error: {0}")]
    Service(String),
}

pub type FragmentStream = BoxStream<'static, Result<String, CompletionError>>;

#[async_trait]
pub trait CompletionService: Send + Sync {
    fn fragment_mode(&self) -> FragmentMode;

    // The stream ends on completion, or after yielding one error.
    async fn complete(&self, history: Vec<ChatMessage>) -> Result<FragmentStream, CompletionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub id: ExchangeId,
    pub history: Vec<ChatMessage>,
}

#[derive(Clone)]
pub struct CompletionDriver {
    service: Arc<dyn CompletionService>,
    runtime_handle: Handle,
    tx: mpsc::Sender<AppEvent>,
}

impl CompletionDriver {
    pub fn new(
        service: Arc<dyn CompletionService>,
        runtime_handle: Handle,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            service,
            runtime_handle,
            tx,
        }
    }

    pub fn fragment_mode(&self) -> FragmentMode {
        self.service.fragment_mode()
    }

    pub fn dispatch(&self, request: ExchangeRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        self.runtime_handle.spawn(async move {
            run_exchange(service.as_ref(), request, &tx).await;
        });
    }
}

pub async fn run_exchange(
    service: &dyn CompletionService,
    request: ExchangeRequest,
    tx: &mpsc::Sender<AppEvent>,
) {
    let exchange = request.id;
    tracing::info!(exchange = %exchange, turns = request.history.len(), "exchange started");

    let mut fragments = match service.complete(request.history).await {
        Ok(fragments) => fragments,
        Err(err) => {
            tracing::warn!(exchange = %exchange, error = %err, "completion call failed");
            let _ = tx.send(AppEvent::StreamFailed {
                exchange,
                message: err.to_string(),
            });
            return;
        }
    };

    while let Some(fragment) = fragments.next().await {
        let event = match fragment {
            Ok(text) => AppEvent::StreamFragment { exchange, text },
            Err(err) => {
                tracing::warn!(exchange = %exchange, error = %err, "completion stream failed");
                let _ = tx.send(AppEvent::StreamFailed {
                    exchange,
                    message: err.to_string(),
                });
                return;
            }
        };
        if tx.send(event).is_err() {
            tracing::debug!(exchange = %exchange, "event receiver dropped, abandoning stream");
            return;
        }
    }

    tracing::info!(exchange = %exchange, "exchange completed");
    let _ = tx.send(AppEvent::StreamEnd { exchange });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures_util::stream;
    use std::sync::Mutex;

    pub struct ScriptedService {
        mode: FragmentMode,
        script: Vec<Result<String, String>>,
        reject: Option<String>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedService {
        pub fn streaming(mode: FragmentMode, fragments: &[&str]) -> Self {
            Self {
                mode,
                script: fragments.iter().map(|text| Ok(text.to_string())).collect(),
                reject: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_after(mode: FragmentMode, fragments: &[&str], error: &str) -> Self {
            let mut service = Self::streaming(mode, fragments);
            service.script.push(Err(error.to_string()));
            service
        }

        pub fn rejecting(error: &str) -> Self {
            Self {
                mode: FragmentMode::Delta,
                script: Vec::new(),
                reject: Some(error.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        fn fragment_mode(&self) -> FragmentMode {
            self.mode
        }

        async fn complete(
            &self,
            history: Vec<ChatMessage>,
        ) -> Result<FragmentStream, CompletionError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(history);
            }
            if let Some(error) = &self.reject {
                return Err(CompletionError::Request(error.clone()));
            }
            let items: Vec<Result<String, CompletionError>> = self
                .script
                .iter()
                .map(|step| step.clone().map_err(CompletionError::Service))
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }
}
