use crate::highlight::Highlighter;
use crate::render::{render_message, RenderedMessage};

/// Identifier of the singleton "awaiting response" node.
pub const TYPING_INDICATOR_ID: &str = "typing-indicator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub sender: Sender,
    pub content: String,
    pub rendered: RenderedMessage,
}

impl Bubble {
    pub fn new(content: impl Into<String>, sender: Sender) -> Self {
        let content = content.into();
        let rendered = render_message(&content, sender == Sender::User);
        Bubble {
            sender,
            content,
            rendered,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bubble(Bubble),
    TypingIndicator,
}

/// The message list shown in the scrollable area, top to bottom.
#[derive(Debug, Default)]
pub struct Transcript {
    nodes: Vec<Node>,
    scroll_requested: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Bubble(bubble) => Some(bubble),
            Node::TypingIndicator => None,
        })
    }

    pub fn add_message(&mut self, content: impl Into<String>, sender: Sender) {
        self.nodes.push(Node::Bubble(Bubble::new(content, sender)));
        self.scroll_requested = true;
    }

    pub fn last_bubble_mut(&mut self) -> Option<&mut Bubble> {
        self.nodes.iter_mut().rev().find_map(|node| match node {
            Node::Bubble(bubble) => Some(bubble),
            Node::TypingIndicator => None,
        })
    }

    pub fn has_typing_indicator(&self) -> bool {
        self.nodes.iter().any(|node| matches!(node, Node::TypingIndicator))
    }

    /// Show the indicator as the last node. An indicator that is already
    /// visible is moved to the end instead of duplicated.
    pub fn show_typing_indicator(&mut self) {
        self.nodes.retain(|node| !matches!(node, Node::TypingIndicator));
        self.nodes.push(Node::TypingIndicator);
        self.scroll_requested = true;
    }

    /// Returns whether an indicator was present.
    pub fn remove_typing_indicator(&mut self) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| !matches!(node, Node::TypingIndicator));
        self.nodes.len() != before
    }

    /// Run the highlighter over every code block in the transcript.
    /// Returns how many blocks were newly highlighted.
    pub fn highlight_all(&mut self, highlighter: &Highlighter) -> usize {
        let mut count = 0;
        for node in &mut self.nodes {
            if let Node::Bubble(bubble) = node {
                for block in bubble.rendered.code_blocks_mut() {
                    if highlighter.highlight_block(block) {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    /// True once after any append; the view snaps the scrollable to its end.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }
}
