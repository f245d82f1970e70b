pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod orchestrator;
pub mod persistence;
pub mod preview;
pub mod quality;
pub mod render;
pub mod session;
pub mod slots;
pub mod stomp;
pub mod types;

pub use backend::{CaptureBackend, HttpBackend};
pub use config::{ConfigError, PanelConfig};
pub use error::{PanelError, PanelResult};
pub use orchestrator::{CapturePanel, CaptureReport, SingleCapture, SlotReport};
pub use persistence::{JsonTemplateStore, MemoryTemplateStore, TemplateStore};
pub use preview::{
    FrameStream, PreviewChannel, PreviewConnector, PreviewStats, StompPreviewConnector,
};
pub use quality::QualityBand;
pub use render::{
    ConsoleRenderer, FingerView, HandDisplay, NoticeLevel, Notification, PanelRenderer,
    PreviewView,
};
pub use session::{DeviceSession, SessionState, SessionStateMachine};
pub use slots::{assign_slots, slot_for, CaptureMode, Hand, SlotId};
pub use types::*;
