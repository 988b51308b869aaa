use serde::{Deserialize, Serialize};

pub type Timestamp = i64;

pub type StickerId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowBounds {
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

/// A persisted note. The window presenting it is labelled with `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Sticker {
    #[serde(alias = "uuid")]
    pub id: StickerId,
    #[serde(default)]
    pub markdown: String,
    /// Empty means the renderer's default background.
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub bounds: Option<WindowBounds>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Sticker {
    pub fn new(id: impl Into<StickerId>, color: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            markdown: String::new(),
            color: color.into(),
            pinned: false,
            archived: false,
            bounds: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default)]
    pub random_color: bool,
    #[serde(default = "default_window_width")]
    pub window_width: f64,
    #[serde(default = "default_window_height")]
    pub window_height: f64,
    #[serde(default = "default_backup_on_delete")]
    pub backup_on_delete: bool,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            random_color: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            backup_on_delete: default_backup_on_delete(),
            language: default_language(),
        }
    }
}

fn default_window_width() -> f64 {
    500.0
}

fn default_window_height() -> f64 {
    400.0
}

fn default_backup_on_delete() -> bool {
    true
}

fn default_language() -> String {
    "auto".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StickersFile {
    pub schema_version: u32,
    pub stickers: Vec<Sticker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsFile {
    pub schema_version: u32,
    pub settings: Settings,
}
