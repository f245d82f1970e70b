// Capture orchestration
//
// `CapturePanel` is the single entry point callers drive. Every device
// command is gated on the session, serialized against other captures and
// raced against the session token, so a teardown fails in-flight work fast.
// Results are slot-mapped and classified before anything is rendered.

use crate::backend::{CaptureBackend, HttpBackend};
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::imaging;
use crate::persistence::{JsonTemplateStore, TemplateStore};
use crate::preview::{PreviewConnector, PreviewStats, StompPreviewConnector};
use crate::quality::QualityBand;
use crate::render::{
    ConsoleRenderer, FingerView, HandDisplay, NoticeLevel, Notification, PanelRenderer,
};
use crate::session::{SessionState, SessionStateMachine};
use crate::slots::{assign_slots, CaptureMode, Hand, SlotId, FINGERS_PER_HAND};
use crate::types::{
    FingerType, HandDetection, LivenessReport, MultiCapture, TemplateBlob, TemplateMatch,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of a single-finger capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleCapture {
    pub image: String,
    pub quality: i32,
    pub band: QualityBand,
}

/// One finger of a multi-finger result, placed in its slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub slot: SlotId,
    pub image: String,
    pub quality: i32,
    pub band: QualityBand,
}

/// Outcome of a hand or thumbs capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    pub mode: CaptureMode,
    pub fingers: Vec<SlotReport>,
    pub count: usize,
    pub hand: Option<HandDetection>,
}

pub struct CapturePanel {
    config: PanelConfig,
    backend: Arc<dyn CaptureBackend>,
    renderer: Arc<dyn PanelRenderer>,
    templates: Arc<dyn TemplateStore>,
    session: Arc<SessionStateMachine>,
    /// Held for the duration of one capture-like command
    capture_lock: tokio::sync::Mutex<()>,
    /// Image of the last single capture, until it is saved
    last_capture: Mutex<Option<String>>,
}

impl CapturePanel {
    pub fn new(
        config: PanelConfig,
        backend: Arc<dyn CaptureBackend>,
        connector: Arc<dyn PreviewConnector>,
        renderer: Arc<dyn PanelRenderer>,
        templates: Arc<dyn TemplateStore>,
    ) -> Self {
        let session = Arc::new(SessionStateMachine::new(
            config.clone(),
            Arc::clone(&backend),
            connector,
            Arc::clone(&renderer),
        ));

        Self {
            config,
            backend,
            renderer,
            templates,
            session,
            capture_lock: tokio::sync::Mutex::new(()),
            last_capture: Mutex::new(None),
        }
    }

    /// Production wiring: HTTP backend, STOMP preview, console output and
    /// templates in a JSON file.
    pub fn from_config(config: PanelConfig) -> PanelResult<Self> {
        let backend = Arc::new(HttpBackend::new(&config)?);
        let connector = Arc::new(StompPreviewConnector::from_config(&config));
        let templates = Arc::new(JsonTemplateStore::new(config.template_store_path.clone()));

        info!(
            "Capture service at {}, preview at {} ({})",
            backend.base_url(),
            config.preview_url,
            config.preview_topic
        );

        Ok(Self::new(
            config,
            backend,
            connector,
            Arc::new(ConsoleRenderer::new()),
            templates,
        ))
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStateMachine> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn preview_stats(&self) -> Option<PreviewStats> {
        self.session.preview_stats()
    }

    pub fn last_capture(&self) -> Option<String> {
        self.last_capture.lock().clone()
    }

    /// Templates persisted by the last `create_template`
    pub fn stored_templates(&self) -> PanelResult<Vec<TemplateBlob>> {
        self.templates.load()
    }

    pub async fn open(&self) -> PanelResult<()> {
        self.session.open().await
    }

    pub async fn close(&self) -> PanelResult<()> {
        self.session.close().await
    }

    pub async fn poll_status(&self) -> PanelResult<SessionState> {
        self.session.poll_status().await
    }

    pub async fn capture_single(&self) -> PanelResult<SingleCapture> {
        self.attempt("Single capture", async {
            let (token, _permit) = self.begin()?;

            let capture = run(&token, self.backend.capture_single()).await?;

            let finger = FingerView::new(capture.image, capture.quality);
            self.renderer.render_single(&finger);
            *self.last_capture.lock() = Some(finger.image.clone());

            self.notify(
                NoticeLevel::Success,
                format!("Capture complete! Quality: {}", finger.quality),
            );

            Ok(SingleCapture {
                image: finger.image,
                quality: finger.quality,
                band: finger.band,
            })
        })
        .await
    }

    /// Four-finger capture of one hand
    pub async fn capture_multiple(
        &self,
        hand: Hand,
        expected_fingers: u8,
    ) -> PanelResult<CaptureReport> {
        self.attempt("Multi-finger capture", async {
            if !(1..=FINGERS_PER_HAND as u8).contains(&expected_fingers) {
                return Err(PanelError::InvalidRequest(format!(
                    "expected fingers must be between 1 and {}, got {}",
                    FINGERS_PER_HAND, expected_fingers
                )));
            }

            let (token, _permit) = self.begin()?;

            self.notify(
                NoticeLevel::Info,
                format!("Place {} fingers on the scanner...", expected_fingers),
            );

            let result = run(&token, self.backend.capture_multiple(expected_fingers)).await?;
            self.render_result(CaptureMode::from(hand), result, &token)
        })
        .await
    }

    pub async fn capture_thumbs(&self) -> PanelResult<CaptureReport> {
        self.attempt("Thumb capture", async {
            let (token, _permit) = self.begin()?;

            self.notify(NoticeLevel::Info, "Place both thumbs on the scanner...");

            let result = run(&token, self.backend.capture_thumbs()).await?;

            let expected = CaptureMode::Thumbs.capacity();
            if result.fingers.len() < expected {
                warn!(
                    "Thumb capture returned {} of {} thumbs",
                    result.fingers.len(),
                    expected
                );
                self.notify(
                    NoticeLevel::Info,
                    format!("Only {} of {} thumbs captured", result.fingers.len(), expected),
                );
            }

            self.render_result(CaptureMode::Thumbs, result, &token)
        })
        .await
    }

    /// Generate templates and hand them to the template store
    pub async fn create_template(&self) -> PanelResult<Vec<TemplateBlob>> {
        self.attempt("Template creation", async {
            let (token, _permit) = self.begin()?;

            self.notify(NoticeLevel::Info, "Generating biometric templates...");

            let batch = run(&token, self.backend.create_templates()).await?;
            let count = batch.count();

            self.templates.store(&batch.templates)?;

            self.notify(NoticeLevel::Success, format!("{} template(s) created", count));
            Ok(batch.templates)
        })
        .await
    }

    /// Fire-and-forget; failures are logged, never surfaced.
    pub fn set_finger_type(&self, kind: FingerType) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        let renderer = Arc::clone(&self.renderer);
        let ttl = self.config.notification_ttl;

        tokio::spawn(async move {
            match backend.set_finger_type(kind).await {
                Ok(_) => {
                    info!("Finger type set to {}", kind);
                    renderer.notify(Notification::info(format!("Finger type: {}", kind), ttl));
                }
                Err(e) => warn!("Failed to set finger type to {}: {}", kind, e),
            }
        })
    }

    /// Write the last single capture as a bitmap into `dir`
    pub fn save_last_capture(&self, dir: &Path) -> PanelResult<PathBuf> {
        let Some(image) = self.last_capture.lock().take() else {
            return Err(self.fail(
                "Save",
                PanelError::NothingToSave("no capture since the last save".to_string()),
            ));
        };

        match imaging::export_bitmap(&image, dir) {
            Ok(path) => {
                self.notify(
                    NoticeLevel::Success,
                    format!("Image saved to {}", path.display()),
                );
                Ok(path)
            }
            Err(e) => {
                // Keep it for another attempt
                *self.last_capture.lock() = Some(image);
                Err(self.fail("Save", e))
            }
        }
    }

    /// Save into the configured export directory
    pub fn save_capture(&self) -> PanelResult<PathBuf> {
        let dir = self.config.capture_export_dir.clone();
        self.save_last_capture(&dir)
    }

    pub async fn compare_templates(&self, first: &str, second: &str) -> PanelResult<TemplateMatch> {
        self.attempt("Template comparison", async {
            let token = self.session.guard()?;

            let result = run(&token, self.backend.compare_templates(first, second)).await?;

            let verdict = if result.is_match { "Match" } else { "No match" };
            self.notify(
                NoticeLevel::Success,
                format!("{} (score {})", verdict, result.score),
            );
            Ok(result)
        })
        .await
    }

    /// Liveness detection captures an image, so it is serialized like one
    pub async fn check_liveness(&self) -> PanelResult<LivenessReport> {
        self.attempt("Liveness check", async {
            let (token, _permit) = self.begin()?;

            let report = run(&token, self.backend.check_liveness()).await?;

            let verdict = if report.is_live {
                "Live finger"
            } else {
                "Possible fake finger"
            };
            self.notify(
                NoticeLevel::Success,
                format!("{} (score {})", verdict, report.score),
            );
            Ok(report)
        })
        .await
    }

    pub async fn beep(&self, times: u8) -> PanelResult<()> {
        self.attempt("Beep", async {
            if times == 0 {
                return Err(PanelError::InvalidRequest(
                    "beep count must be positive".to_string(),
                ));
            }
            let token = self.session.guard()?;
            run(&token, self.backend.beep(times)).await?;
            Ok(())
        })
        .await
    }

    /// Pause the device stream without closing the session
    pub async fn stop_preview(&self) -> PanelResult<()> {
        self.attempt("Preview stop", async {
            let token = self.session.guard()?;
            let ack = run(&token, self.backend.stop_preview()).await?;
            self.notify(
                NoticeLevel::Info,
                ack.message.unwrap_or_else(|| "Preview stopped".to_string()),
            );
            Ok(())
        })
        .await
    }

    /// Gate on the session and take the capture permit
    fn begin(&self) -> PanelResult<(CancellationToken, tokio::sync::MutexGuard<'_, ()>)> {
        let token = self.session.guard()?;
        let permit = self
            .capture_lock
            .try_lock()
            .map_err(|_| PanelError::CaptureInProgress)?;
        Ok((token, permit))
    }

    /// Map every finger to its slot first; an overflow aborts before any
    /// slot is touched.
    fn render_result(
        &self,
        mode: CaptureMode,
        result: MultiCapture,
        token: &CancellationToken,
    ) -> PanelResult<CaptureReport> {
        let slots = assign_slots(mode, result.fingers.len())?;

        if token.is_cancelled() {
            return Err(PanelError::Disconnected);
        }

        let count = result.count();
        let mut fingers = Vec::with_capacity(slots.len());

        for (slot, finger) in slots.into_iter().zip(result.fingers) {
            let view = FingerView::new(finger.image, finger.quality);
            self.renderer.render_slot(slot, &view);
            fingers.push(SlotReport {
                slot,
                image: view.image,
                quality: view.quality,
                band: view.band,
            });
        }

        self.renderer
            .render_hand(&HandDisplay::from(result.hand_detection.as_ref()));

        self.notify(NoticeLevel::Success, format!("{} finger(s) captured", count));

        Ok(CaptureReport {
            mode,
            fingers,
            count,
            hand: result.hand_detection,
        })
    }

    async fn attempt<T, F>(&self, operation: &str, work: F) -> PanelResult<T>
    where
        F: Future<Output = PanelResult<T>>,
    {
        work.await.map_err(|e| self.fail(operation, e))
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.renderer.notify(Notification::new(
            level,
            text,
            self.config.notification_ttl,
        ));
    }

    fn fail(&self, operation: &str, err: PanelError) -> PanelError {
        if matches!(err, PanelError::SlotOverflow { .. }) {
            error!("{} returned more results than slots: {}", operation, err);
        } else {
            error!("{} failed: {}", operation, err);
        }
        self.renderer.notify(Notification::error(
            err.user_message(),
            self.config.notification_ttl,
        ));
        err
    }
}

/// Race a backend call against the session token
async fn run<T, F>(token: &CancellationToken, call: F) -> PanelResult<T>
where
    F: Future<Output = PanelResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PanelError::Disconnected),
        result = call => result,
    }
}
