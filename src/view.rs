use iced::{
    alignment,
    font::{self, Font},
    widget::{container, horizontal_rule, rich_text, row, span, text, Column, Row},
    Background, Border, Color, Element, Length, Padding, Theme,
};

use crate::highlight::{HighlightedLine, Highlighter, Rgb};
use crate::render::{Block, CodeBlock, ListItem, Span};
use crate::transcript::{Bubble, Node, Transcript, TYPING_INDICATOR_ID};
use crate::Message;

const BODY_SIZE: f32 = 15.0;
const CODE_SIZE: f32 = 13.0;
const BUBBLE_MAX_WIDTH: f32 = 640.0;

fn rgb(color: Rgb) -> Color {
    Color::from_rgb8(color.r, color.g, color.b)
}

pub fn transcript<'a>(
    transcript: &'a Transcript,
    highlighter: &Highlighter,
    frame: usize,
) -> Element<'a, Message> {
    let code_background = highlighter
        .background()
        .map(rgb)
        .unwrap_or(Color::from_rgb8(0x2b, 0x30, 0x3b));

    Column::with_children(transcript.nodes().iter().map(|node| match node {
        Node::Bubble(b) => bubble(b, code_background),
        Node::TypingIndicator => typing_indicator(frame),
    }))
    .spacing(12)
    .padding(10)
    .width(Length::Fill)
    .into()
}

fn bubble(bubble: &Bubble, code_background: Color) -> Element<'_, Message> {
    let is_user = bubble.is_user();

    let body = Column::with_children(
        bubble
            .rendered
            .blocks
            .iter()
            .map(|b| block(b, code_background)),
    )
    .spacing(8);

    let styled = container(body)
        .padding(12)
        .max_width(BUBBLE_MAX_WIDTH)
        .style(move |theme: &Theme| {
            let palette = theme.extended_palette();
            let pair = if is_user {
                palette.primary.strong
            } else {
                palette.background.weak
            };
            container::Style {
                background: Some(Background::Color(pair.color)),
                text_color: Some(pair.text),
                border: Border {
                    radius: 12.0.into(),
                    ..Border::default()
                },
                ..container::Style::default()
            }
        });

    container(styled)
        .width(Length::Fill)
        .align_x(if is_user {
            alignment::Horizontal::Right
        } else {
            alignment::Horizontal::Left
        })
        .into()
}

fn typing_indicator<'a>(frame: usize) -> Element<'a, Message> {
    let active = (frame / 4) % 3;
    let dots = Row::with_children((0..3).map(|i| {
        let alpha = if i == active { 1.0 } else { 0.35 };
        text("●")
            .size(12)
            .color(Color { a: alpha, ..Color::WHITE })
            .into()
    }))
    .spacing(6);

    container(
        container(dots)
            .padding(Padding::from([10, 14]))
            .style(|theme: &Theme| container::Style {
                background: Some(Background::Color(theme.extended_palette().background.weak.color)),
                border: Border {
                    radius: 12.0.into(),
                    ..Border::default()
                },
                ..container::Style::default()
            }),
    )
    .id(container::Id::new(TYPING_INDICATOR_ID))
    .width(Length::Fill)
    .align_x(alignment::Horizontal::Left)
    .into()
}

fn block(block: &Block, code_background: Color) -> Element<'_, Message> {
    match block {
        Block::Paragraph(spans) => inline(spans, BODY_SIZE),
        Block::Heading { level, spans } => {
            let size = match level {
                1 => 24.0,
                2 => 21.0,
                3 => 18.0,
                _ => 16.0,
            };
            let spans: Vec<_> = spans
                .iter()
                .map(|s| styled_span(s, size).font(Font {
                    weight: font::Weight::Bold,
                    ..Font::DEFAULT
                }))
                .collect();
            rich_text(spans).into()
        }
        Block::Code(code) => code_block(code, code_background),
        Block::List(items) => {
            Column::with_children(items.iter().map(list_item)).spacing(4).into()
        }
        Block::Quote(spans) => container(inline(spans, BODY_SIZE))
            .padding(Padding::from([4, 12]))
            .style(|theme: &Theme| container::Style {
                border: Border {
                    color: theme.extended_palette().secondary.base.color,
                    width: 1.0,
                    radius: 4.0.into(),
                },
                ..container::Style::default()
            })
            .into(),
        Block::Rule => horizontal_rule(1).into(),
    }
}

fn list_item(item: &ListItem) -> Element<'_, Message> {
    row![
        text(item.marker.as_str()).size(BODY_SIZE),
        inline(&item.spans, BODY_SIZE),
    ]
    .spacing(8)
    .padding(Padding {
        left: item.depth as f32 * 18.0,
        ..Padding::ZERO
    })
    .into()
}

fn inline(spans: &[Span], size: f32) -> Element<'_, Message> {
    let spans: Vec<_> = spans.iter().map(|s| styled_span(s, size)).collect();
    rich_text(spans).into()
}

fn styled_span(s: &Span, size: f32) -> iced::widget::text::Span<'_, Message, Font> {
    let style = &s.style;
    let mut font = if style.code { Font::MONOSPACE } else { Font::DEFAULT };
    if style.bold {
        font.weight = font::Weight::Bold;
    }
    if style.italic {
        font.style = font::Style::Italic;
    }

    let mut out = span(s.text.as_str())
        .size(if style.code { CODE_SIZE } else { size })
        .font(font)
        .strikethrough(style.strikethrough);

    if let Some(url) = &style.link {
        out = out
            .underline(true)
            .color(Color::from_rgb8(0x7a, 0xa2, 0xf7))
            .link(Message::LinkClicked(url.clone()));
    }

    out
}

fn code_block(code: &CodeBlock, background: Color) -> Element<'_, Message> {
    let body: Element<'_, Message> = match &code.highlighted {
        Some(lines) => Column::with_children(lines.iter().map(highlighted_line)).into(),
        None => text(code.code.as_str())
            .font(Font::MONOSPACE)
            .size(CODE_SIZE)
            .into(),
    };

    container(body)
        .padding(10)
        .width(Length::Fill)
        .style(move |_theme: &Theme| container::Style {
            background: Some(Background::Color(background)),
            border: Border {
                radius: 6.0.into(),
                ..Border::default()
            },
            ..container::Style::default()
        })
        .into()
}

fn highlighted_line(line: &HighlightedLine) -> Element<'_, Message> {
    if line.is_empty() {
        // Keep blank lines from collapsing.
        return text(" ").font(Font::MONOSPACE).size(CODE_SIZE).into();
    }

    let spans: Vec<_> = line
        .iter()
        .map(|s| {
            let mut font = Font::MONOSPACE;
            if s.bold {
                font.weight = font::Weight::Bold;
            }
            if s.italic {
                font.style = font::Style::Italic;
            }
            span(s.text.as_str())
                .font(font)
                .size(CODE_SIZE)
                .color(rgb(s.color))
        })
        .collect();

    rich_text(spans).into()
}
