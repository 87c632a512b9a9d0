use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT: &str = "Arial";
pub const DEFAULT_COLOR: &str = "#ffffff";
pub const PLACEHOLDER_TEXT: &str = "Click to Add Text";
pub const PLACEHOLDER_SIZE: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    #[default]
    Bold,
}

impl FontWeight {
    pub fn for_size(size: u32) -> Self {
        if size > 40 {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// An editable piece of overlay text. `position.y` is the text baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextElement {
    pub id: u32,
    pub text: String,
    pub position: Position,
    pub font: String,
    pub size: u32,
    pub color: String,
    pub weight: FontWeight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(rename = "isPlaceholder", skip_serializing_if = "std::ops::Not::not")]
    pub is_placeholder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<DetectedBox>,
}

impl Default for TextElement {
    fn default() -> Self {
        Self {
            id: 0,
            text: String::new(),
            position: Position { x: 50, y: 50 },
            font: DEFAULT_FONT.to_string(),
            size: 48,
            color: DEFAULT_COLOR.to_string(),
            weight: FontWeight::Bold,
            confidence: None,
            is_placeholder: false,
            bbox: None,
        }
    }
}

/// The single editable element offered when nothing usable was detected.
pub fn placeholder_element(width: u32, height: u32) -> TextElement {
    TextElement {
        id: 1,
        text: PLACEHOLDER_TEXT.to_string(),
        position: Position {
            x: (width as f64 * 0.5) as i32,
            y: (height as f64 * 0.5) as i32,
        },
        font: DEFAULT_FONT.to_string(),
        size: PLACEHOLDER_SIZE,
        color: DEFAULT_COLOR.to_string(),
        weight: FontWeight::Bold,
        confidence: None,
        is_placeholder: true,
        bbox: None,
    }
}
