use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::highlight::DEFAULT_THEME;

fn default_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_chat_path() -> String {
    "/chat".to_string()
}

fn default_title() -> String {
    "CDP Support Chat".to_string()
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

fn default_breakpoint() -> f32 {
    768.0
}

fn default_narrow_fraction() -> f32 {
    0.5
}

fn default_wide_fraction() -> f32 {
    0.6
}

fn default_highlight_theme() -> String {
    DEFAULT_THEME.to_string()
}

fn default_greeting() -> Option<String> {
    Some(
        "Hi! I'm your CDP support agent. Ask me anything about **Segment**, \
         **mParticle**, **Lytics** or **Zeotap**."
            .to_string(),
    )
}

fn default_example_questions() -> Vec<String> {
    vec![
        "How do I set up a new source in Segment?".to_string(),
        "How can I create a user profile in mParticle?".to_string(),
        "How do I build an audience segment in Lytics?".to_string(),
        "How can I integrate my data with Zeotap?".to_string(),
        "How does Segment's audience creation compare to Lytics'?".to_string(),
    ]
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// Unset means the request may wait forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Widths at or below this many logical pixels use the narrow fraction.
    #[serde(default = "default_breakpoint")]
    pub breakpoint: f32,
    #[serde(default = "default_narrow_fraction")]
    pub narrow_fraction: f32,
    #[serde(default = "default_wide_fraction")]
    pub wide_fraction: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,
    #[serde(default = "default_example_questions")]
    pub example_questions: Vec<String>,
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: default_url(),
            chat_path: default_chat_path(),
            timeout_secs: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            breakpoint: default_breakpoint(),
            narrow_fraction: default_narrow_fraction(),
            wide_fraction: default_wide_fraction(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            greeting: default_greeting(),
            example_questions: default_example_questions(),
            highlight_theme: default_highlight_theme(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::get_config_path());

        if let Ok(url) = std::env::var("CDP_CHAT_URL") {
            if !url.trim().is_empty() {
                config.backend.url = url;
            }
        }

        config
    }

    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Error parsing {}: {}. Using defaults.", config_path.display(), e),
                },
                Err(e) => log::warn!("Error reading {}: {}. Using defaults.", config_path.display(), e),
            }
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/cdp-chat/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}

impl BackendConfig {
    /// Full URL of the chat endpoint.
    pub fn chat_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let path = self.chat_path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}
