// Rendering seam between the panel logic and whatever draws it
//
// The panel never touches widgets directly; it reports state changes,
// images and notifications through `PanelRenderer`. The binary uses the
// console implementation below, tests record the calls.

use crate::quality::QualityBand;
use crate::slots::SlotId;
use crate::types::HandDetection;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Placeholder shown when the backend reported no hand detection
pub const HAND_PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient, dismissible message; never blocks further commands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NoticeLevel,
    pub text: String,
    /// Auto-dismiss interval
    pub ttl: Duration,
}

impl Notification {
    pub fn new(level: NoticeLevel, text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            level,
            text: text.into(),
            ttl,
        }
    }

    pub fn info(text: impl Into<String>, ttl: Duration) -> Self {
        Self::new(NoticeLevel::Info, text, ttl)
    }

    pub fn success(text: impl Into<String>, ttl: Duration) -> Self {
        Self::new(NoticeLevel::Success, text, ttl)
    }

    pub fn error(text: impl Into<String>, ttl: Duration) -> Self {
        Self::new(NoticeLevel::Error, text, ttl)
    }
}

/// One preview frame ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewView {
    pub image: String,
    pub quality: i32,
    /// Formatted label shown next to the preview
    pub quality_label: String,
}

impl PreviewView {
    pub fn new(image: String, quality: i32) -> Self {
        Self {
            quality_label: format!("Quality: {}", quality),
            image,
            quality,
        }
    }
}

/// A captured finger image with its classified quality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerView {
    pub image: String,
    pub quality: i32,
    pub band: QualityBand,
}

impl FingerView {
    pub fn new(image: String, quality: i32) -> Self {
        Self {
            image,
            quality,
            band: QualityBand::classify(quality),
        }
    }
}

/// Hand-confidence display value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HandDisplay {
    Detected { description: String, confidence: i32 },
    Unknown,
}

impl From<Option<&HandDetection>> for HandDisplay {
    fn from(detection: Option<&HandDetection>) -> Self {
        match detection {
            Some(hand) => HandDisplay::Detected {
                description: hand.hand_description.clone(),
                confidence: hand.confidence,
            },
            None => HandDisplay::Unknown,
        }
    }
}

impl HandDisplay {
    pub fn description(&self) -> &str {
        match self {
            HandDisplay::Detected { description, .. } => description,
            HandDisplay::Unknown => HAND_PLACEHOLDER,
        }
    }
}

impl fmt::Display for HandDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandDisplay::Detected {
                description,
                confidence,
            } => write!(f, "{} ({}%)", description, confidence),
            HandDisplay::Unknown => f.write_str(HAND_PLACEHOLDER),
        }
    }
}

/// Display surface of the control panel
pub trait PanelRenderer: Send + Sync {
    /// Connection indicator and enablement of capture-dependent controls
    fn set_connected(&self, connected: bool);

    fn render_preview(&self, frame: &PreviewView);

    fn render_single(&self, finger: &FingerView);

    fn render_slot(&self, slot: SlotId, finger: &FingerView);

    fn render_hand(&self, hand: &HandDisplay);

    fn notify(&self, notification: Notification);
}

/// Renderer writing a line per event to stdout
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// Keeps console lines readable; images are data-URIs of several hundred KB
fn abbreviate(image: &str) -> String {
    const SHOWN: usize = 32;
    match image.char_indices().nth(SHOWN) {
        Some((cut, _)) => format!("{}... ({} bytes)", &image[..cut], image.len()),
        None => image.to_string(),
    }
}

impl PanelRenderer for ConsoleRenderer {
    fn set_connected(&self, connected: bool) {
        if connected {
            println!("[status] Connected - capture controls enabled");
        } else {
            println!("[status] Disconnected - capture controls disabled");
        }
    }

    fn render_preview(&self, frame: &PreviewView) {
        println!("[preview] {} {}", frame.quality_label, abbreviate(&frame.image));
    }

    fn render_single(&self, finger: &FingerView) {
        println!(
            "[capture] quality {} ({}) {}",
            finger.quality,
            finger.band,
            abbreviate(&finger.image)
        );
    }

    fn render_slot(&self, slot: SlotId, finger: &FingerView) {
        println!(
            "[slot {}] quality {} ({}) {}",
            slot,
            finger.quality,
            finger.band,
            abbreviate(&finger.image)
        );
    }

    fn render_hand(&self, hand: &HandDisplay) {
        println!("[hand] {}", hand);
    }

    fn notify(&self, notification: Notification) {
        let tag = match notification.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", tag, notification.text);
    }
}
