// Wire types of the capture service REST API and push channel
//
// Every REST answer shares `{success, message?}`; the operation-specific
// fields sit next to them in the same object.

use crate::error::{PanelError, PanelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Finger condition filter understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerType {
    Dry,
    #[default]
    Normal,
    Wet,
}

impl FingerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerType::Dry => "dry",
            FingerType::Normal => "normal",
            FingerType::Wet => "wet",
        }
    }
}

impl fmt::Display for FingerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FingerType {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dry" => Ok(FingerType::Dry),
            "normal" => Ok(FingerType::Normal),
            "wet" => Ok(FingerType::Wet),
            other => Err(PanelError::InvalidRequest(format!(
                "unknown finger type '{}' (expected dry, normal or wet)",
                other
            ))),
        }
    }
}

/// Common part of every REST answer
#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    /// The status endpoint answers without a `success` field
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Decode a REST answer: `success:false` becomes `Rejected`, anything that
/// does not fit the expected shape is a transport failure.
pub fn decode_response<T: DeserializeOwned>(value: serde_json::Value) -> PanelResult<T> {
    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| PanelError::Transport(format!("Malformed response: {}", e)))?;

    if !envelope.success {
        let message = envelope
            .message
            .unwrap_or_else(|| "Operation failed".to_string());
        return Err(PanelError::Rejected(message));
    }

    serde_json::from_value(value)
        .map_err(|e| PanelError::Transport(format!("Unexpected response shape: {}", e)))
}

/// Answer that carries nothing but the optional message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub is_open: bool,
    #[serde(default)]
    pub is_capturing: Option<bool>,
}

/// One image plus its quality score (single capture, preview start)
#[derive(Debug, Clone, Deserialize)]
pub struct ImageCapture {
    pub image: String,
    pub quality: i32,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One finger cut out of a multi-finger or thumb capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerCapture {
    pub image: String,
    pub quality: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

/// Backend inference of which hand was presented
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandDetection {
    pub hand_description: String,
    pub confidence: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of a four-finger or two-thumb capture
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiCapture {
    /// `fingers` for hand captures, `thumbs` for thumb captures
    #[serde(alias = "thumbs")]
    pub fingers: Vec<FingerCapture>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub hand_detection: Option<HandDetection>,
    /// Quality of the whole plate image
    #[serde(default)]
    pub quality: Option<i32>,
}

impl MultiCapture {
    /// Reported count, falling back to the number of fingers returned
    pub fn count(&self) -> usize {
        self.count.unwrap_or(self.fingers.len())
    }
}

/// Opaque biometric template, base64 on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateBlob(pub String);

impl TemplateBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateBatch {
    pub templates: Vec<TemplateBlob>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl TemplateBatch {
    pub fn count(&self) -> usize {
        self.count.unwrap_or(self.templates.len())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareRequest<'a> {
    pub template1: &'a str,
    pub template2: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateMatch {
    pub score: i32,
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessReport {
    pub score: i32,
    pub is_live: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerTypeRequest {
    #[serde(rename = "type")]
    pub kind: FingerType,
}

/// Frame pushed on the preview topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewFrame {
    pub image: String,
    pub quality: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Answer to a preview start. The service only acknowledges; some
/// deployments also return the first frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewStart {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub quality: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PreviewStart {
    /// First frame, when the answer carries both image and quality
    pub fn frame(&self) -> Option<PreviewFrame> {
        match (&self.image, self.quality) {
            (Some(image), Some(quality)) => Some(PreviewFrame {
                image: image.clone(),
                quality,
                width: None,
                height: None,
                timestamp: None,
            }),
            _ => None,
        }
    }
}
