use crate::chat::transcript::ExchangeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    StreamFragment { exchange: ExchangeId, text: String },
    StreamEnd { exchange: ExchangeId },
    StreamFailed { exchange: ExchangeId, message: String },
}
