use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

use crate::highlight::HighlightedLine;

/// How a bubble's content is turned into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Span {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    /// Nesting level, 0 for top-level items.
    pub depth: usize,
    /// Bullet or number shown before the item, e.g. "•" or "3.".
    pub marker: String,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub lang: String,
    pub code: String,
    /// Filled in by the highlighter after the bubble is rendered.
    pub highlighted: Option<Vec<HighlightedLine>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    Code(CodeBlock),
    List(Vec<ListItem>),
    Quote(Vec<Span>),
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub mode: RenderMode,
    pub blocks: Vec<Block>,
}

impl RenderedMessage {
    pub fn code_blocks_mut(&mut self) -> impl Iterator<Item = &mut CodeBlock> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Code(code) => Some(code),
            _ => None,
        })
    }
}

/// Decide between the plain and markdown paths.
///
/// User input is never interpreted as markdown. Bot replies go through the
/// markdown renderer only when they contain `*`, a code fence or `#`; this is
/// a cheap guess, not a syntax check.
pub fn render_mode(content: &str, is_user: bool) -> RenderMode {
    if !is_user && (content.contains('*') || content.contains("```") || content.contains('#')) {
        RenderMode::Markdown
    } else {
        RenderMode::Plain
    }
}

pub fn render_message(content: &str, is_user: bool) -> RenderedMessage {
    match render_mode(content, is_user) {
        RenderMode::Plain => RenderedMessage {
            mode: RenderMode::Plain,
            blocks: vec![Block::Paragraph(vec![Span::plain(content)])],
        },
        RenderMode::Markdown => RenderedMessage {
            mode: RenderMode::Markdown,
            blocks: markdown_to_blocks(content),
        },
    }
}

struct ListBuilder {
    next_number: Option<u64>,
    /// Marker of the open item, taken by the first run of text flushed from it.
    marker: Option<String>,
}

impl ListBuilder {
    fn next_marker(&mut self) -> String {
        match self.next_number.as_mut() {
            Some(n) => {
                let marker = format!("{}.", n);
                *n += 1;
                marker
            }
            None => "•".to_string(),
        }
    }
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    style: SpanStyle,
    lists: Vec<ListBuilder>,
    items: Vec<ListItem>,
    quote_depth: usize,
    code: Option<CodeBlock>,
}

impl BlockBuilder {
    fn push_text(&mut self, text: &str, code: bool) {
        if let Some(block) = self.code.as_mut() {
            block.code.push_str(text);
            return;
        }

        let mut style = self.style.clone();
        style.code = code;

        // Merge runs of identically styled text, pulldown splits on every
        // entity and soft break.
        if let Some(last) = self.spans.last_mut() {
            if last.style == style {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Span {
            text: text.to_string(),
            style,
        });
    }

    fn take_spans(&mut self) -> Vec<Span> {
        let mut spans = std::mem::take(&mut self.spans);
        if let Some(last) = spans.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
        spans.retain(|s| !s.text.is_empty());
        spans
    }

    fn flush_paragraph(&mut self) {
        let spans = self.take_spans();
        if spans.is_empty() {
            return;
        }
        if self.quote_depth > 0 {
            self.blocks.push(Block::Quote(spans));
        } else {
            self.blocks.push(Block::Paragraph(spans));
        }
    }

    fn flush_item(&mut self) {
        let spans = self.take_spans();
        if spans.is_empty() {
            return;
        }

        let depth = self.lists.len().saturating_sub(1);
        // Text continuing an item after a split (e.g. a code block) gets no marker.
        let marker = self
            .lists
            .last_mut()
            .and_then(|list| list.marker.take())
            .unwrap_or_default();

        self.items.push(ListItem { depth, marker, spans });
    }

    /// Close the list run built so far so a block can follow it in order.
    fn flush_list(&mut self) {
        self.flush_item();
        let items = std::mem::take(&mut self.items);
        if !items.is_empty() {
            self.blocks.push(Block::List(items));
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(Tag::Paragraph) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                } else if !self.spans.is_empty() {
                    // Loose list items wrap their text in paragraphs.
                    self.push_text(" ", false);
                }
            }

            // Headings and quotes nested in a list item become part of the
            // item's text so the list keeps its order and numbering.
            Event::Start(Tag::Heading(..)) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                } else {
                    self.style.bold = true;
                }
            }
            Event::End(Tag::Heading(level, ..)) => {
                if self.lists.is_empty() {
                    let spans = self.take_spans();
                    self.blocks.push(Block::Heading {
                        level: level as u8,
                        spans,
                    });
                } else {
                    self.style.bold = false;
                    self.push_text(" ", false);
                }
            }

            Event::Start(Tag::BlockQuote) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                }
                self.quote_depth += 1;
            }
            Event::End(Tag::BlockQuote) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                }
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                } else {
                    self.flush_item();
                }
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBlock {
                    lang,
                    code: String::new(),
                    highlighted: None,
                });
            }
            Event::End(Tag::CodeBlock(_)) => {
                if let Some(mut block) = self.code.take() {
                    if block.code.ends_with('\n') {
                        block.code.pop();
                    }
                    // Code inside a list item splits the list around it.
                    self.flush_list();
                    self.blocks.push(Block::Code(block));
                }
            }

            Event::Start(Tag::List(start)) => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                } else {
                    self.flush_item();
                }
                self.lists.push(ListBuilder {
                    next_number: start,
                    marker: None,
                });
            }
            Event::End(Tag::List(_)) => {
                self.flush_item();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.flush_list();
                }
            }
            Event::Start(Tag::Item) => {
                if let Some(list) = self.lists.last_mut() {
                    list.marker = Some(list.next_marker());
                }
            }
            Event::End(Tag::Item) => self.flush_item(),

            Event::Start(Tag::Strong) => self.style.bold = true,
            Event::End(Tag::Strong) => self.style.bold = false,
            Event::Start(Tag::Emphasis) => self.style.italic = true,
            Event::End(Tag::Emphasis) => self.style.italic = false,
            Event::Start(Tag::Strikethrough) => self.style.strikethrough = true,
            Event::End(Tag::Strikethrough) => self.style.strikethrough = false,
            Event::Start(Tag::Link(_, url, _)) => self.style.link = Some(url.to_string()),
            Event::End(Tag::Link(..)) => self.style.link = None,

            Event::Text(text) => self.push_text(&text, false),
            Event::Code(text) => self.push_text(&text, true),
            Event::Html(html) => self.push_text(&html, false),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_text("\n", false),
            Event::TaskListMarker(done) => self.push_text(if done { "[x] " } else { "[ ] " }, false),
            Event::Rule => {
                if self.lists.is_empty() {
                    self.flush_paragraph();
                } else {
                    self.flush_list();
                }
                self.blocks.push(Block::Rule);
            }

            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(block) = self.code.take() {
            self.blocks.push(Block::Code(block));
        }
        if !self.lists.is_empty() {
            self.flush_list();
        }
        self.flush_paragraph();
        self.blocks
    }
}

/// Convert markdown source into display blocks.
pub fn markdown_to_blocks(source: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut builder = BlockBuilder::default();

    for event in Parser::new_ext(source, options) {
        builder.handle(event);
    }

    builder.finish()
}
