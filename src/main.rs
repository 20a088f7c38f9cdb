mod client;
mod config;
mod controller;
mod highlight;
mod layout;
mod render;
mod transcript;
mod view;

use anyhow::Context;
use iced::{
    alignment, clipboard,
    event::{self, Event as IcedEvent},
    keyboard::{self, Modifiers},
    time,
    widget::{button, column, container, row, scrollable, text, text_input, Column},
    window, Element, Length, Size, Subscription, Task, Theme,
};
use std::sync::Arc;
use std::time::Duration;

use client::{ChatError, HttpChatBackend};
use config::Config;
use controller::{ChatController, PendingReply};
use highlight::Highlighter;
use layout::Layout;

const INPUT_ID: &str = "user-input";
const MESSAGES_ID: &str = "chat-messages";

fn init_logging() {
    // CDP_CHAT_DEBUG turns on debug output, RUST_LOG wins over both.
    let default_level = if std::env::var("CDP_CHAT_DEBUG").is_ok() {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::load();
    let backend = HttpChatBackend::with_config(&config.backend)
        .context("Failed to build HTTP client for the chat endpoint")?;
    log::info!("Chat endpoint: {}", backend.chat_url());

    let window_size = Size::new(config.window.width as f32, config.window.height as f32);

    iced::application(App::title, App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: window_size,
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(move || App::new(config, backend))?;

    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    InputChanged(String),
    /// Enter in the input field.
    EnterPressed,
    /// The Send button.
    Submit,
    ChatCompleted(Result<String, Arc<ChatError>>),
    ExampleSelected(String),
    LinkClicked(String),
    ModifiersChanged(Modifiers),
    WindowResized(Size),
    Tick,
}

struct App {
    title: String,
    controller: ChatController,
    example_questions: Vec<String>,
    modifiers: Modifiers,
    loading_frame: usize,
    input_id: text_input::Id,
    messages_id: scrollable::Id,
}

impl App {
    fn new(config: Config, backend: HttpChatBackend) -> (Self, Task<Message>) {
        let highlighter = Highlighter::new(&config.chat.highlight_theme);
        let mut controller =
            ChatController::new(Arc::new(backend), highlighter, Layout::new(&config.layout));

        if let Some(greeting) = &config.chat.greeting {
            controller = controller.with_bot_message(greeting.clone());
        }
        controller.start();
        controller.resize(config.window.width as f32, config.window.height as f32);

        let app = App {
            title: config.window.title,
            controller,
            example_questions: config.chat.example_questions,
            modifiers: Modifiers::default(),
            loading_frame: 0,
            input_id: text_input::Id::new(INPUT_ID),
            messages_id: scrollable::Id::new(MESSAGES_ID),
        };

        let focus_task = text_input::focus(app.input_id.clone());
        let size_task = window::get_latest()
            .and_then(window::get_size)
            .map(Message::WindowResized);

        (app, Task::batch([focus_task, size_task]))
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.controller.set_input(value);
                Task::none()
            }
            Message::EnterPressed => {
                let reply = self.controller.enter_pressed(self.modifiers.shift());
                self.send(reply)
            }
            Message::Submit => {
                let reply = self.controller.submit();
                self.send(reply)
            }
            Message::ChatCompleted(result) => {
                self.controller.complete(result);
                log::debug!("{} chat requests still pending", self.controller.pending_requests());
                self.scroll_to_bottom()
            }
            Message::ExampleSelected(question) => {
                self.controller.set_question(question);
                text_input::focus(self.input_id.clone())
            }
            Message::LinkClicked(url) => {
                log::debug!("Copied link {}", url);
                clipboard::write(url)
            }
            Message::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers;
                Task::none()
            }
            Message::WindowResized(size) => {
                let max_height = self.controller.resize(size.width, size.height);
                log::debug!("Viewport {}x{}, message list max height {}", size.width, size.height, max_height);
                Task::none()
            }
            Message::Tick => {
                if self.controller.is_waiting() {
                    self.loading_frame = self.loading_frame.wrapping_add(1);
                }
                Task::none()
            }
        }
    }

    fn send(&mut self, reply: Option<PendingReply>) -> Task<Message> {
        let Some(reply) = reply else {
            return Task::none();
        };

        let request = Task::perform(reply, |result| Message::ChatCompleted(result.map_err(Arc::new)));
        Task::batch([self.scroll_to_bottom(), request])
    }

    fn scroll_to_bottom(&mut self) -> Task<Message> {
        if self.controller.take_scroll_request() {
            scrollable::snap_to(self.messages_id.clone(), scrollable::RelativeOffset::END)
        } else {
            Task::none()
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.controller.is_waiting() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) = event {
                Some(Message::ModifiersChanged(modifiers))
            } else {
                None
            }
        });

        let resizes = window::resize_events().map(|(_id, size)| Message::WindowResized(size));

        Subscription::batch([timer, events, resizes])
    }

    fn view(&self) -> Element<Message> {
        let messages = scrollable(view::transcript(
            self.controller.transcript(),
            self.controller.highlighter(),
            self.loading_frame,
        ))
        .id(self.messages_id.clone())
        .width(Length::Fill);

        let mut messages = container(messages).width(Length::Fill);
        if let Some(max_height) = self.controller.max_height() {
            messages = messages.max_height(max_height);
        }

        let input = text_input("Ask a question about Segment, mParticle, Lytics or Zeotap...", self.controller.input())
            .on_input(Message::InputChanged)
            .on_submit(Message::EnterPressed)
            .padding(15)
            .size(16)
            .id(self.input_id.clone());

        let form = row![
            input,
            button(text("Send").size(16))
                .on_press(Message::Submit)
                .padding(15),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        let examples = Column::with_children(self.example_questions.iter().map(|question| {
            button(text(question.as_str()).size(13))
                .on_press(Message::ExampleSelected(question.clone()))
                .style(button::secondary)
                .padding(8)
                .into()
        }))
        .spacing(6);

        let content = column![
            messages,
            form,
            text("Example questions").size(14),
            examples,
        ]
        .spacing(12)
        .padding(16);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
