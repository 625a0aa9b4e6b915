use crate::completion::{ExchangeRequest, FragmentMode};

pub mod transcript;

use transcript::{ExchangeId, Transcript};

pub fn lean_canvas_system_message() -> &'static str {
    "You are the assistant inside a Lean Canvas editor.

The user fills a nine-section Lean Canvas: Customer Segments (with Early Adopter), Problem (with Existing Alternatives), Unique Value Proposition (with High Level Concept), Solution, Channels, Revenue Streams, Cost Structure, Key Metrics and Unfair Advantage. Each list holds at most three short items.

Every edit arrives as a user message of the form \"Added '<item>' to <section>. Now the list is: ...\" or \"Removed '<item>' from <section>. Now the list is: ...\". The user does not type these; they describe what just changed on the canvas.

Behavior requirements:
- React briefly to each change: one or two sentences of feedback or a pointed question.
- Refer to sections by their titles.
- Do not repeat the whole canvas back.
- When the user writes free text, answer it directly."
}

// One exchange streams at a time; turns submitted meanwhile share a single follow-up.
#[derive(Debug, Clone)]
pub struct ChatSession {
    transcript: Transcript,
    system_prompt: String,
    fragment_mode: FragmentMode,
    next_exchange: u64,
    follow_up_pending: bool,
}

impl ChatSession {
    pub fn new(system_prompt: impl Into<String>, fragment_mode: FragmentMode) -> Self {
        Self {
            transcript: Transcript::default(),
            system_prompt: system_prompt.into(),
            fragment_mode,
            next_exchange: 1,
            follow_up_pending: false,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_streaming(&self) -> bool {
        self.transcript.is_exchange_active()
    }

    pub fn has_follow_up_pending(&self) -> bool {
        self.follow_up_pending
    }

    pub fn submit_user_message(&mut self, content: impl Into<String>) -> Option<ExchangeRequest> {
        self.transcript.push_user(content);
        if self.transcript.is_exchange_active() {
            tracing::debug!("exchange in flight, queueing follow-up");
            self.follow_up_pending = true;
            return None;
        }
        Some(self.start_exchange())
    }

    pub fn on_fragment(&mut self, exchange: ExchangeId, text: &str) {
        self.transcript.apply_fragment(exchange, text);
    }

    pub fn on_stream_end(&mut self, exchange: ExchangeId) -> Option<ExchangeRequest> {
        if !self.transcript.seal(exchange) {
            return None;
        }
        self.take_follow_up()
    }

    pub fn on_stream_failed(&mut self, exchange: ExchangeId) -> Option<ExchangeRequest> {
        if !self.transcript.fail(exchange) {
            return None;
        }
        self.take_follow_up()
    }

    fn take_follow_up(&mut self) -> Option<ExchangeRequest> {
        if !std::mem::take(&mut self.follow_up_pending) {
            return None;
        }
        Some(self.start_exchange())
    }

    fn start_exchange(&mut self) -> ExchangeRequest {
        let id = ExchangeId::new(self.next_exchange);
        self.next_exchange += 1;
        self.transcript.begin_exchange(id, self.fragment_mode);
        ExchangeRequest {
            id,
            history: self.transcript.outbound_history(&self.system_prompt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::transcript::{Role, SERVICE_FAILURE_TEXT};
    use super::*;
    use crate::completion::testing::ScriptedService;
    use crate::completion::{run_exchange, ChatRole, CompletionService};
    use crate::event::AppEvent;
    use std::sync::mpsc;

    fn session(mode: FragmentMode) -> ChatSession {
        ChatSession::new(lean_canvas_system_message(), mode)
    }

    async fn drive(
        chat: &mut ChatSession,
        service: &dyn CompletionService,
        first: ExchangeRequest,
    ) {
        let (tx, rx) = mpsc::channel();
        let mut next = Some(first);
        while let Some(request) = next.take() {
            run_exchange(service, request, &tx).await;
            for event in rx.try_iter() {
                let follow_up = match event {
                    AppEvent::StreamFragment { exchange, text } => {
                        chat.on_fragment(exchange, &text);
                        None
                    }
                    AppEvent::StreamEnd { exchange } => chat.on_stream_end(exchange),
                    AppEvent::StreamFailed { exchange, .. } => chat.on_stream_failed(exchange),
                };
                if follow_up.is_some() {
                    next = follow_up;
                }
            }
        }
    }

    #[test]
    fn first_message_starts_exchange_with_system_prompt() {
        let mut chat = session(FragmentMode::Delta);
        let request = chat
            .submit_user_message("Added 'A' to Channels. Now the list is: 'A'")
            .expect("idle session should start an exchange");

        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[0].role, ChatRole::System);
        assert_eq!(request.history[1].role, ChatRole::User);
        assert!(chat.is_streaming());
    }

    #[test]
    fn message_during_stream_is_queued_as_single_follow_up() {
        let mut chat = session(FragmentMode::Delta);
        let first = chat.submit_user_message("one").expect("first exchange");
        chat.on_fragment(first.id, "reply");

        assert!(chat.submit_user_message("two").is_none());
        assert!(chat.submit_user_message("three").is_none());
        assert!(chat.has_follow_up_pending());

        let follow_up = chat
            .on_stream_end(first.id)
            .expect("settling should release the follow-up");
        let contents: Vec<&str> = follow_up
            .history
            .iter()
            .map(|message| message.content.as_str())
            .collect();
        assert_eq!(&contents[1..], &["one", "reply", "two", "three"]);
        assert_ne!(follow_up.id, first.id);
        assert!(!chat.has_follow_up_pending());
    }

    #[test]
    fn stale_end_does_not_release_follow_up() {
        let mut chat = session(FragmentMode::Delta);
        let first = chat.submit_user_message("one").expect("first exchange");
        chat.submit_user_message("two");

        assert!(chat.on_stream_end(ExchangeId::new(42)).is_none());
        assert!(chat.has_follow_up_pending());
        assert!(chat.on_stream_failed(first.id).is_some());
    }

    #[tokio::test]
    async fn cumulative_stream_folds_into_single_bot_turn() {
        let service =
            ScriptedService::streaming(FragmentMode::Cumulative, &["Hel", "Hello", "Hello!"]);
        let mut chat = session(service.fragment_mode());
        let request = chat
            .submit_user_message("Added 'Faster onboarding' to Solution. Now the list is: 'Faster onboarding'")
            .expect("first exchange");

        drive(&mut chat, &service, request).await;

        let turns = chat.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Bot);
        assert_eq!(turns[1].content, "Hello!");
        assert!(!chat.is_streaming());
    }

    #[tokio::test]
    async fn rejected_completion_appends_exactly_one_failure_turn() {
        let service = ScriptedService::rejecting("connection refused");
        let mut chat = session(service.fragment_mode());
        let request = chat.submit_user_message("hello").expect("first exchange");

        drive(&mut chat, &service, request).await;

        let bot_turns: Vec<&str> = chat
            .transcript()
            .turns()
            .iter()
            .filter(|turn| turn.role == Role::Bot)
            .map(|turn| turn.content.as_str())
            .collect();
        assert_eq!(bot_turns, vec![SERVICE_FAILURE_TEXT]);

        assert!(chat.submit_user_message("retry by hand").is_some());
    }

    #[tokio::test]
    async fn failed_stream_shows_no_partial_content() {
        let service =
            ScriptedService::failing_after(FragmentMode::Delta, &["Half an ", "answer"], "reset");
        let mut chat = session(service.fragment_mode());
        let request = chat.submit_user_message("hello").expect("first exchange");

        drive(&mut chat, &service, request).await;

        let turns = chat.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, SERVICE_FAILURE_TEXT);
    }
}
