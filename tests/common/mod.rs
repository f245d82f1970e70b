#![allow(dead_code)]

use async_trait::async_trait;
use fingerprint_panel::{
    decode_response, Ack, CaptureBackend, CapturePanel, DeviceStatus, FingerType, FingerView,
    FrameStream, HandDisplay, ImageCapture, LivenessReport, MemoryTemplateStore, MultiCapture,
    Notification, PanelConfig, PanelError, PanelRenderer, PanelResult, PreviewConnector,
    PreviewFrame, PreviewStart, PreviewView, SlotId, TemplateBatch, TemplateMatch, TemplateStore,
};
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub const IMAGE: &str = "data:image/bmp;base64,Qk0=";

/// What a scripted backend operation answers
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Unreachable,
}

/// Capture service stand-in answering from a script
pub struct FakeBackend {
    replies: Mutex<HashMap<&'static str, Reply>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let mut replies = HashMap::new();
        replies.insert(
            "open_device",
            Reply::Json(json!({"success": true, "message": "Device opened successfully"})),
        );
        replies.insert(
            "close_device",
            Reply::Json(json!({"success": true, "message": "Device closed successfully"})),
        );
        replies.insert("device_status", Reply::Json(json!({"isOpen": true, "isCapturing": false})));
        replies.insert("set_finger_type", Reply::Json(json!({"success": true})));
        replies.insert(
            "capture_single",
            Reply::Json(json!({"success": true, "image": IMAGE, "quality": 72})),
        );
        replies.insert(
            "start_preview",
            Reply::Json(json!({"success": true, "image": IMAGE, "quality": 10})),
        );
        replies.insert("stop_preview", Reply::Json(json!({"success": true})));
        replies.insert(
            "capture_multiple",
            Reply::Json(json!({"success": true, "fingers": [], "count": 0})),
        );
        replies.insert(
            "capture_thumbs",
            Reply::Json(json!({"success": true, "thumbs": [], "count": 0})),
        );
        replies.insert(
            "create_templates",
            Reply::Json(json!({"success": true, "templates": ["AAA=", "BBB="], "count": 2})),
        );
        replies.insert(
            "compare_templates",
            Reply::Json(json!({"success": true, "score": 87, "match": true})),
        );
        replies.insert(
            "check_liveness",
            Reply::Json(json!({"success": true, "score": 95, "isLive": true})),
        );
        replies.insert("beep", Reply::Json(json!({"success": true})));

        Self {
            replies: Mutex::new(replies),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, operation: &'static str, body: Value) {
        self.replies.lock().insert(operation, Reply::Json(body));
    }

    pub fn unreachable(&self, operation: &'static str) {
        self.replies.lock().insert(operation, Reply::Unreachable);
    }

    /// Make `operation` wait until the returned handle is notified
    pub fn hold(&self, operation: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(operation, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.split(':').next() == Some(operation))
            .count()
    }

    async fn answer<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        call: String,
    ) -> PanelResult<T> {
        self.calls.lock().push(call);

        let gate = self.gates.lock().get(operation).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().get(operation).cloned();
        match reply {
            Some(Reply::Json(body)) => decode_response(body),
            Some(Reply::Unreachable) => {
                Err(PanelError::Transport("connection refused".to_string()))
            }
            None => Err(PanelError::Transport(format!("no reply scripted for {}", operation))),
        }
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn open_device(&self) -> PanelResult<Ack> {
        self.answer("open_device", "open_device".into()).await
    }

    async fn close_device(&self) -> PanelResult<Ack> {
        self.answer("close_device", "close_device".into()).await
    }

    async fn device_status(&self) -> PanelResult<DeviceStatus> {
        self.answer("device_status", "device_status".into()).await
    }

    async fn set_finger_type(&self, kind: FingerType) -> PanelResult<Ack> {
        self.answer("set_finger_type", format!("set_finger_type:{}", kind))
            .await
    }

    async fn capture_single(&self) -> PanelResult<ImageCapture> {
        self.answer("capture_single", "capture_single".into()).await
    }

    async fn start_preview(&self) -> PanelResult<PreviewStart> {
        self.answer("start_preview", "start_preview".into()).await
    }

    async fn stop_preview(&self) -> PanelResult<Ack> {
        self.answer("stop_preview", "stop_preview".into()).await
    }

    async fn capture_multiple(&self, expected_fingers: u8) -> PanelResult<MultiCapture> {
        self.answer(
            "capture_multiple",
            format!("capture_multiple:{}", expected_fingers),
        )
        .await
    }

    async fn capture_thumbs(&self) -> PanelResult<MultiCapture> {
        self.answer("capture_thumbs", "capture_thumbs".into()).await
    }

    async fn create_templates(&self) -> PanelResult<TemplateBatch> {
        self.answer("create_templates", "create_templates".into()).await
    }

    async fn compare_templates(&self, first: &str, second: &str) -> PanelResult<TemplateMatch> {
        self.answer(
            "compare_templates",
            format!("compare_templates:{}:{}", first, second),
        )
        .await
    }

    async fn check_liveness(&self) -> PanelResult<LivenessReport> {
        self.answer("check_liveness", "check_liveness".into()).await
    }

    async fn beep(&self, times: u8) -> PanelResult<Ack> {
        self.answer("beep", format!("beep:{}", times)).await
    }
}

/// Everything the panel asked to display, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected(bool),
    Preview(PreviewView),
    Single(FingerView),
    Slot(SlotId, FingerView),
    Hand(HandDisplay),
    Notice(Notification),
}

#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<Event>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Notice(n) => Some(n.text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_notification(&self) -> Option<Notification> {
        self.events.lock().iter().rev().find_map(|e| match e {
            Event::Notice(n) => Some(n.clone()),
            _ => None,
        })
    }

    pub fn slots(&self) -> Vec<(String, i32)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Slot(slot, view) => Some((slot.to_string(), view.quality)),
                _ => None,
            })
            .collect()
    }

    pub fn preview_labels(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Preview(view) => Some(view.quality_label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connected(&self) -> Option<bool> {
        self.events.lock().iter().rev().find_map(|e| match e {
            Event::Connected(flag) => Some(*flag),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl PanelRenderer for RecordingRenderer {
    fn set_connected(&self, connected: bool) {
        self.events.lock().push(Event::Connected(connected));
    }

    fn render_preview(&self, frame: &PreviewView) {
        self.events.lock().push(Event::Preview(frame.clone()));
    }

    fn render_single(&self, finger: &FingerView) {
        self.events.lock().push(Event::Single(finger.clone()));
    }

    fn render_slot(&self, slot: SlotId, finger: &FingerView) {
        self.events.lock().push(Event::Slot(slot, finger.clone()));
    }

    fn render_hand(&self, hand: &HandDisplay) {
        self.events.lock().push(Event::Hand(hand.clone()));
    }

    fn notify(&self, notification: Notification) {
        self.events.lock().push(Event::Notice(notification));
    }
}

pub type FrameSender = mpsc::UnboundedSender<PanelResult<PreviewFrame>>;

/// Preview connector fed from the test through channels; one feed per connect
#[derive(Default)]
pub struct ChannelConnector {
    feeds: Mutex<VecDeque<mpsc::UnboundedReceiver<PanelResult<PreviewFrame>>>>,
    connects: AtomicUsize,
}

impl ChannelConnector {
    /// Queue a feed for the next connect
    pub fn feed(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().push_back(rx);
        tx
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreviewConnector for ChannelConnector {
    async fn connect(&self) -> PanelResult<FrameStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let feed = self.feeds.lock().pop_front();
        match feed {
            Some(rx) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            // No feed queued: a channel that never delivers
            None => Ok(futures_util::stream::pending::<PanelResult<PreviewFrame>>().boxed()),
        }
    }
}

pub struct Harness {
    pub panel: Arc<CapturePanel>,
    pub backend: Arc<FakeBackend>,
    pub renderer: Arc<RecordingRenderer>,
    pub connector: Arc<ChannelConnector>,
    pub templates: Arc<MemoryTemplateStore>,
}

pub fn test_config() -> PanelConfig {
    PanelConfig {
        // Long enough that the poller never fires unless a test asks for it
        status_poll_interval: Duration::from_secs(3600),
        notification_ttl: Duration::from_secs(5),
        ..PanelConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: PanelConfig) -> Harness {
    let backend = Arc::new(FakeBackend::new());
    let renderer = Arc::new(RecordingRenderer::default());
    let connector = Arc::new(ChannelConnector::default());
    let templates = Arc::new(MemoryTemplateStore::new());

    let panel = Arc::new(CapturePanel::new(
        config,
        backend.clone(),
        connector.clone(),
        renderer.clone(),
        templates.clone() as Arc<dyn TemplateStore>,
    ));

    Harness {
        panel,
        backend,
        renderer,
        connector,
        templates,
    }
}

pub fn frame(quality: i32) -> PreviewFrame {
    PreviewFrame {
        image: IMAGE.to_string(),
        quality,
        width: None,
        height: None,
        timestamp: None,
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// A small real PNG as a data-URI
pub fn png_data_uri() -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};

    let img = image::GrayImage::from_fn(8, 8, |x, y| image::Luma([((x + y) * 16) as u8]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
}
