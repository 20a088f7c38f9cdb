use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::sync::Arc;

use crate::client::{ChatBackend, ChatError};
use crate::highlight::Highlighter;
use crate::layout::Layout;
use crate::transcript::{Sender, Transcript};

/// Shown in place of a reply when the request fails for any reason.
pub const FALLBACK_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

pub type PendingReply = BoxFuture<'static, Result<String, ChatError>>;

/// Mediates between the input field, the chat backend and the transcript.
///
/// The controller owns the state behind the widgets (input text, transcript,
/// message list height) but no widgets itself, so the whole submit cycle can
/// be driven without a window.
pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    highlighter: Highlighter,
    layout: Layout,
    transcript: Transcript,
    input: String,
    max_height: Option<f32>,
    pending: usize,
}

impl ChatController {
    pub fn new(backend: Arc<dyn ChatBackend>, highlighter: Highlighter, layout: Layout) -> Self {
        ChatController {
            backend,
            highlighter,
            layout,
            transcript: Transcript::new(),
            input: String::new(),
            max_height: None,
            pending: 0,
        }
    }

    /// Seed the transcript with a bot message, e.g. a greeting.
    pub fn with_bot_message(mut self, content: impl Into<String>) -> Self {
        self.transcript.add_message(content, Sender::Bot);
        self
    }

    /// One pass over whatever the transcript already holds, done at startup.
    pub fn start(&mut self) {
        let count = self.transcript.highlight_all(&self.highlighter);
        log::debug!("highlighted {} code blocks at startup", count);
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: String) {
        self.input = value;
    }

    /// Put a suggested question in the input without sending it. The caller
    /// is responsible for moving focus to the input.
    pub fn set_question(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn take_scroll_request(&mut self) -> bool {
        self.transcript.take_scroll_request()
    }

    /// Whether the typing indicator is showing. With several requests in
    /// flight the first reply removes the indicator, so this turns false (and
    /// the spinner stops) while [`ChatController::pending_requests`] is
    /// still non-zero.
    pub fn is_waiting(&self) -> bool {
        self.transcript.has_typing_indicator()
    }

    /// Number of requests sent whose reply has not been handled yet.
    pub fn pending_requests(&self) -> usize {
        self.pending
    }

    /// Send the current input.
    ///
    /// Returns `None` for blank input. Otherwise the user bubble and typing
    /// indicator are already in the transcript and the returned future is the
    /// request; its output must be handed back to [`ChatController::complete`].
    /// Nothing stops a second submit while one is in flight, and replies are
    /// appended in the order they arrive.
    pub fn submit(&mut self) -> Option<PendingReply> {
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.transcript.add_message(message.clone(), Sender::User);
        self.input.clear();
        self.transcript.show_typing_indicator();
        self.pending += 1;

        log::debug!("submitting message ({} pending)", self.pending);
        Some(self.backend.send(message))
    }

    /// Enter in the input field. Shift+Enter never sends.
    pub fn enter_pressed(&mut self, shift: bool) -> Option<PendingReply> {
        if shift {
            return None;
        }
        self.submit()
    }

    /// Handle the outcome of a request started by [`ChatController::submit`].
    pub fn complete<E: Display>(&mut self, result: Result<String, E>) {
        self.pending = self.pending.saturating_sub(1);
        self.transcript.remove_typing_indicator();

        match result {
            Ok(response) => {
                self.transcript.add_message(response, Sender::Bot);
                if let Some(bubble) = self.transcript.last_bubble_mut() {
                    for block in bubble.rendered.code_blocks_mut() {
                        self.highlighter.highlight_block(block);
                    }
                }
                self.transcript.highlight_all(&self.highlighter);
            }
            Err(e) => {
                log::error!("Error: {}", e);
                self.transcript.add_message(FALLBACK_REPLY, Sender::Bot);
            }
        }
    }

    /// Recompute the message list height for a new viewport size.
    pub fn resize(&mut self, width: f32, height: f32) -> f32 {
        let max_height = self.layout.max_height(width, height);
        self.max_height = Some(max_height);
        max_height
    }

    pub fn max_height(&self) -> Option<f32> {
        self.max_height
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::DEFAULT_THEME;
    use crate::render::{Block, RenderMode};
    use crate::transcript::Node;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Reply {
        Text(String),
        Fail,
        Delayed(u64, String),
    }

    #[derive(Default)]
    struct FakeBackend {
        replies: Mutex<HashMap<String, Reply>>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn reply(self, message: &str, reply: Reply) -> Self {
            self.replies.lock().unwrap().insert(message.to_string(), reply);
            self
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ChatBackend for FakeBackend {
        fn send(&self, message: String) -> PendingReply {
            self.sent.lock().unwrap().push(message.clone());
            let reply = self.replies.lock().unwrap().remove(&message);
            Box::pin(async move {
                match reply {
                    Some(Reply::Text(text)) => Ok(text),
                    Some(Reply::Delayed(ms, text)) => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        Ok(text)
                    }
                    Some(Reply::Fail) | None => {
                        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
                        Err(ChatError::Decode(err))
                    }
                }
            })
        }
    }

    fn controller(backend: FakeBackend) -> (ChatController, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let controller = ChatController::new(
            backend.clone(),
            Highlighter::new(DEFAULT_THEME),
            Layout::default(),
        );
        (controller, backend)
    }

    fn contents(controller: &ChatController) -> Vec<(bool, String)> {
        controller
            .transcript()
            .bubbles()
            .map(|b| (b.is_user(), b.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let (mut controller, backend) =
            controller(FakeBackend::default().reply("Hello", Reply::Text("Hi there!".to_string())));

        controller.set_input("  Hello \n".to_string());
        let reply = controller.submit().expect("request issued");

        assert_eq!(controller.input(), "");
        assert!(controller.is_waiting());
        assert_eq!(controller.transcript().nodes().last(), Some(&Node::TypingIndicator));
        assert_eq!(backend.sent(), vec!["Hello".to_string()]);

        controller.complete(reply.await);

        assert!(!controller.is_waiting());
        assert_eq!(controller.pending_requests(), 0);
        assert_eq!(
            contents(&controller),
            vec![(true, "Hello".to_string()), (false, "Hi there!".to_string())]
        );
        let bot = controller.transcript().bubbles().last().unwrap();
        assert_eq!(bot.rendered.mode, RenderMode::Plain);
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let (mut controller, backend) = controller(FakeBackend::default());

        for input in ["", "   ", "\n\t"] {
            controller.set_input(input.to_string());
            assert!(controller.submit().is_none());
        }

        assert!(controller.transcript().nodes().is_empty());
        assert!(backend.sent().is_empty());
        assert!(!controller.take_scroll_request());
    }

    #[tokio::test]
    async fn test_failure_shows_fallback() {
        let (mut controller, _backend) = controller(FakeBackend::default().reply("Hello", Reply::Fail));

        controller.set_input("Hello".to_string());
        let reply = controller.submit().unwrap();
        controller.complete(reply.await);

        assert!(!controller.is_waiting());
        assert_eq!(
            contents(&controller),
            vec![(true, "Hello".to_string()), (false, FALLBACK_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn test_markdown_reply_is_highlighted() {
        let reply_text = "Steps:\n* one\n* two\n\n```python\nprint('hi')\n```";
        let (mut controller, _backend) = controller(
            FakeBackend::default().reply("List steps:\n* one\n* two", Reply::Text(reply_text.to_string())),
        );

        controller.set_input("List steps:\n* one\n* two".to_string());
        let reply = controller.submit().unwrap();
        controller.complete(reply.await);

        let bubbles: Vec<_> = controller.transcript().bubbles().collect();
        assert_eq!(bubbles[0].rendered.mode, RenderMode::Plain);
        assert_eq!(bubbles[1].rendered.mode, RenderMode::Markdown);
        assert!(bubbles[1].rendered.blocks.iter().any(|b| matches!(b, Block::List(_))));
        assert!(bubbles[1].rendered.code_blocks().all(|c| c.highlighted.is_some()));
    }

    #[tokio::test]
    async fn test_start_highlights_seeded_messages() {
        let (controller, _backend) = controller(FakeBackend::default());
        let mut controller = controller.with_bot_message("Try:\n```bash\ncurl localhost\n```");
        assert!(controller.take_scroll_request());

        controller.start();

        let greeting = controller.transcript().bubbles().next().unwrap();
        assert!(greeting.rendered.code_blocks().all(|c| c.highlighted.is_some()));
    }

    #[tokio::test]
    async fn test_replies_appended_in_arrival_order() {
        let (mut controller, _backend) = controller(
            FakeBackend::default()
                .reply("first", Reply::Delayed(50, "slow answer".to_string()))
                .reply("second", Reply::Text("fast answer".to_string())),
        );

        controller.set_input("first".to_string());
        let slow = controller.submit().unwrap();
        controller.set_input("second".to_string());
        let fast = controller.submit().unwrap();

        let indicators = controller
            .transcript()
            .nodes()
            .iter()
            .filter(|n| matches!(n, Node::TypingIndicator))
            .count();
        assert_eq!(indicators, 1);
        assert_eq!(controller.pending_requests(), 2);

        let fast_task = tokio::spawn(fast);
        let slow_task = tokio::spawn(slow);
        controller.complete(fast_task.await.unwrap());
        assert!(!controller.is_waiting());
        assert_eq!(controller.pending_requests(), 1);
        controller.complete(slow_task.await.unwrap());

        assert_eq!(
            contents(&controller),
            vec![
                (true, "first".to_string()),
                (true, "second".to_string()),
                (false, "fast answer".to_string()),
                (false, "slow answer".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_enter_submits_only_without_shift() {
        let (mut controller, backend) =
            controller(FakeBackend::default().reply("Hello", Reply::Text("Hi there!".to_string())));

        controller.set_input("Hello".to_string());
        assert!(controller.enter_pressed(true).is_none());
        assert_eq!(controller.input(), "Hello");
        assert!(controller.transcript().nodes().is_empty());
        assert!(backend.sent().is_empty());

        let reply = controller.enter_pressed(false).expect("request issued");
        assert_eq!(backend.sent(), vec!["Hello".to_string()]);
        controller.complete(reply.await);

        assert_eq!(
            contents(&controller),
            vec![(true, "Hello".to_string()), (false, "Hi there!".to_string())]
        );
    }

    #[tokio::test]
    async fn test_set_question_does_not_submit() {
        let (mut controller, backend) = controller(FakeBackend::default());

        controller.set_question("How do I set up a new source in Segment?");

        assert_eq!(controller.input(), "How do I set up a new source in Segment?");
        assert!(controller.transcript().nodes().is_empty());
        assert!(backend.sent().is_empty());
    }

    #[test]
    fn test_resize_updates_max_height() {
        let (mut controller, _backend) = controller(FakeBackend::default());
        assert_eq!(controller.max_height(), None);

        let wide = controller.resize(1024.0, 800.0);
        assert!((wide - 480.0).abs() < 0.01);
        let narrow = controller.resize(600.0, 800.0);
        assert!((narrow - 400.0).abs() < 0.01);
        assert_eq!(controller.max_height(), Some(narrow));
    }
}
