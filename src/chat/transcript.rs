use crate::completion::{ChatMessage, ChatRole, FragmentMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SERVICE_FAILURE_TEXT: &str =
    "Sorry, I couldn't reach the assistant service. Please check the connection settings and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn to_chat_role(self) -> ChatRole {
        match self {
            Self::User => ChatRole::User,
            Self::Bot => ChatRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp(),
        }
    }
}

fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default();
    clock_time(secs)
}

// UTC wall-clock time of day.
fn clock_time(secs_since_epoch: u64) -> String {
    let secs_of_day = secs_since_epoch % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs_of_day / 3_600,
        secs_of_day % 3_600 / 60,
        secs_of_day % 60
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    // Request issued, nothing received yet.
    Idle,
    Streaming {
        turn_index: usize,
        accumulator: String,
    },
    Sealed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    id: ExchangeId,
    mode: FragmentMode,
    state: ExchangeState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
    exchange: Option<Exchange>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, content));
    }

    pub fn is_exchange_active(&self) -> bool {
        self.exchange
            .as_ref()
            .is_some_and(|exchange| exchange.state != ExchangeState::Sealed)
    }

    pub fn open_turn_index(&self) -> Option<usize> {
        match &self.exchange {
            Some(Exchange {
                state: ExchangeState::Streaming { turn_index, .. },
                ..
            }) => Some(*turn_index),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn exchange_state(&self, id: ExchangeId) -> Option<&ExchangeState> {
        self.exchange
            .as_ref()
            .filter(|exchange| exchange.id == id)
            .map(|exchange| &exchange.state)
    }

    // A still-active previous exchange is dropped; its later events become orphans.
    pub fn begin_exchange(&mut self, id: ExchangeId, mode: FragmentMode) {
        if let Some(previous) = self.exchange.as_ref().filter(|_| self.is_exchange_active()) {
            tracing::warn!(previous = %previous.id, next = %id, "sealing exchange superseded before completion");
        }
        self.exchange = Some(Exchange {
            id,
            mode,
            state: ExchangeState::Idle,
        });
    }

    fn active_exchange_mut(&mut self, id: ExchangeId) -> Option<&mut Exchange> {
        self.exchange
            .as_mut()
            .filter(|exchange| exchange.id == id && exchange.state != ExchangeState::Sealed)
    }

    pub fn apply_fragment(&mut self, id: ExchangeId, fragment: &str) -> bool {
        let Some(exchange) = self.exchange.as_mut().filter(|exchange| exchange.id == id) else {
            tracing::debug!(exchange = %id, "orphaned fragment dropped");
            return false;
        };

        match &mut exchange.state {
            ExchangeState::Sealed => {
                tracing::debug!(exchange = %id, "fragment after seal dropped");
                return false;
            }
            ExchangeState::Streaming {
                turn_index,
                accumulator,
            } => {
                match exchange.mode {
                    FragmentMode::Cumulative => {
                        accumulator.clear();
                        accumulator.push_str(fragment);
                    }
                    FragmentMode::Delta => accumulator.push_str(fragment),
                }
                if let Some(turn) = self.turns.get_mut(*turn_index) {
                    turn.content = accumulator.clone();
                }
                return true;
            }
            ExchangeState::Idle => {}
        }

        if fragment.is_empty() {
            return true;
        }
        self.turns.push(Turn::new(Role::Bot, fragment));
        exchange.state = ExchangeState::Streaming {
            turn_index: self.turns.len() - 1,
            accumulator: fragment.to_string(),
        };
        true
    }

    pub fn seal(&mut self, id: ExchangeId) -> bool {
        let Some(exchange) = self.active_exchange_mut(id) else {
            return false;
        };
        if exchange.state == ExchangeState::Idle {
            tracing::debug!(exchange = %id, "exchange sealed without any fragments");
        }
        exchange.state = ExchangeState::Sealed;
        true
    }

    pub fn fail(&mut self, id: ExchangeId) -> bool {
        let Some(exchange) = self.active_exchange_mut(id) else {
            return false;
        };
        let open_turn = match &exchange.state {
            ExchangeState::Streaming { turn_index, .. } => Some(*turn_index),
            _ => None,
        };
        exchange.state = ExchangeState::Sealed;

        match open_turn.and_then(|index| self.turns.get_mut(index)) {
            Some(turn) => turn.content = SERVICE_FAILURE_TEXT.to_string(),
            None => self.turns.push(Turn::new(Role::Bot, SERVICE_FAILURE_TEXT)),
        }
        true
    }

    pub fn outbound_history(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut history = Vec::with_capacity(self.turns.len() + 1);
        history.push(ChatMessage::new(ChatRole::System, system_prompt));
        history.extend(
            self.turns
                .iter()
                .map(|turn| ChatMessage::new(turn.role.to_chat_role(), turn.content.clone())),
        );
        history
    }
}
