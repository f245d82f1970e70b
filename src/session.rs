// Device session lifecycle
//
// Disconnected <-> Connected. A `DeviceSession` exists exactly while
// connected and owns everything scoped to it: the cancellation token, the
// preview channel and the status poller. Explicit close and a
// backend-reported disconnect both go through `teardown`.

use crate::backend::CaptureBackend;
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::preview::{PreviewChannel, PreviewConnector, PreviewStats};
use crate::render::{Notification, PanelRenderer, PreviewView};
use crate::types::{FingerType, PreviewFrame};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shown when the status poll finds the device closed
pub const DEVICE_DISCONNECTED_MESSAGE: &str = "Device disconnected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// State of one open device, dropped on close or disconnect
pub struct DeviceSession {
    pub id: Uuid,
    /// Configured default filter. Never sent to the device, and
    /// `set_finger_type` does not update it.
    pub default_finger_type: FingerType,
    pub opened_at: DateTime<Utc>,
    token: CancellationToken,
    preview: PreviewChannel,
    poller: JoinHandle<()>,
}

impl DeviceSession {
    /// Cancels every task of the session; the poller exits on the token
    fn shutdown(&self) {
        self.token.cancel();
        self.preview.close();
    }
}

pub struct SessionStateMachine {
    backend: Arc<dyn CaptureBackend>,
    connector: Arc<dyn PreviewConnector>,
    renderer: Arc<dyn PanelRenderer>,
    config: PanelConfig,
    session: RwLock<Option<DeviceSession>>,
    /// Serializes open, close and poll-driven teardown
    transition: tokio::sync::Mutex<()>,
}

impl SessionStateMachine {
    pub fn new(
        config: PanelConfig,
        backend: Arc<dyn CaptureBackend>,
        connector: Arc<dyn PreviewConnector>,
        renderer: Arc<dyn PanelRenderer>,
    ) -> Self {
        Self {
            backend,
            connector,
            renderer,
            config,
            session: RwLock::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.session.read().is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.read().as_ref().map(|s| s.id)
    }

    pub fn default_finger_type(&self) -> Option<FingerType> {
        self.session.read().as_ref().map(|s| s.default_finger_type)
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.session.read().as_ref().map(|s| s.opened_at)
    }

    /// Token of the current session; device commands are gated on it.
    pub fn guard(&self) -> PanelResult<CancellationToken> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(PanelError::NotConnected)
    }

    pub fn preview_stats(&self) -> Option<PreviewStats> {
        self.session.read().as_ref().map(|s| s.preview.stats())
    }

    pub fn latest_preview(&self) -> Option<PreviewFrame> {
        self.session
            .read()
            .as_ref()
            .and_then(|s| s.preview.latest())
    }

    /// Open the device, start the preview channel and the status poller,
    /// then ask the device to start streaming.
    pub async fn open(self: &Arc<Self>) -> PanelResult<()> {
        let token = {
            let _transition = self.transition.lock().await;

            if self.session.read().is_some() {
                return Err(self.fail("Open", PanelError::AlreadyConnected));
            }

            let ack = match self.backend.open_device().await {
                Ok(ack) => ack,
                Err(e) => return Err(self.fail("Open", e)),
            };

            let token = CancellationToken::new();
            let preview = PreviewChannel::open(
                Arc::clone(&self.connector),
                Arc::clone(&self.renderer),
                self.config.notification_ttl,
                &token,
            );
            let id = Uuid::new_v4();
            let poller = self.spawn_poller(id, token.clone());

            *self.session.write() = Some(DeviceSession {
                id,
                default_finger_type: self.config.default_finger_type,
                opened_at: Utc::now(),
                token: token.clone(),
                preview,
                poller,
            });

            info!("Device session {} opened", id);
            self.renderer.set_connected(true);
            self.notify(Notification::success(
                ack.message.unwrap_or_else(|| "Device opened".to_string()),
                self.config.notification_ttl,
            ));

            token
        };

        self.start_preview(&token).await;
        Ok(())
    }

    /// A failed preview start leaves the session connected
    async fn start_preview(&self, token: &CancellationToken) {
        let started = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Session ended before preview start completed");
                return;
            }
            result = self.backend.start_preview() => result,
        };

        match started {
            Ok(start) => {
                // The service usually answers with an acknowledgement only
                if let Some(frame) = start.frame() {
                    self.renderer
                        .render_preview(&PreviewView::new(frame.image, frame.quality));
                }
                self.notify(Notification::success(
                    start.message.unwrap_or_else(|| "Preview started".to_string()),
                    self.config.notification_ttl,
                ));
            }
            Err(e) => {
                self.fail("Preview start", e);
            }
        }
    }

    /// Close the device. On backend failure the session stays connected.
    pub async fn close(&self) -> PanelResult<()> {
        let _transition = self.transition.lock().await;

        if self.session.read().is_none() {
            return Err(self.fail("Close", PanelError::NotConnected));
        }

        let ack = match self.backend.close_device().await {
            Ok(ack) => ack,
            Err(e) => return Err(self.fail("Close", e)),
        };

        self.teardown();
        self.notify(Notification::success(
            ack.message.unwrap_or_else(|| "Device closed".to_string()),
            self.config.notification_ttl,
        ));
        Ok(())
    }

    /// Ask the backend whether the device is still open. A closed device
    /// tears the session down exactly like `close()`, minus the backend call.
    pub async fn poll_status(&self) -> PanelResult<SessionState> {
        let Some(id) = self.session_id() else {
            return Ok(SessionState::Disconnected);
        };

        let status = match self.backend.device_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Status check for session {} failed: {}", id, e);
                return Err(e);
            }
        };

        if status.is_open {
            debug!("Device open (capturing: {:?})", status.is_capturing);
            return Ok(SessionState::Connected);
        }

        let _transition = self.transition.lock().await;

        // Closed or reopened while the request was in flight
        if self.session_id() != Some(id) {
            debug!("Ignoring status of stale session {}", id);
            return Ok(self.state());
        }

        warn!("Capture service reports the device closed, ending session {}", id);
        self.teardown();
        self.notify(Notification::error(
            DEVICE_DISCONNECTED_MESSAGE,
            self.config.notification_ttl,
        ));
        Ok(SessionState::Disconnected)
    }

    fn teardown(&self) {
        let Some(session) = self.session.write().take() else {
            return;
        };

        session.shutdown();
        self.renderer.set_connected(false);

        let lifetime = Utc::now().signed_duration_since(session.opened_at);
        info!(
            "Device session {} ended after {}s",
            session.id,
            lifetime.num_seconds()
        );
    }

    fn spawn_poller(self: &Arc<Self>, id: Uuid, token: CancellationToken) -> JoinHandle<()> {
        let machine: Weak<Self> = Arc::downgrade(self);
        let period = self.config.status_poll_interval;

        tokio::spawn(async move {
            debug!("Status poller for session {} started ({:?})", id, period);

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => break,

                    _ = ticker.tick() => {
                        let Some(machine) = machine.upgrade() else {
                            break;
                        };
                        if let Ok(SessionState::Disconnected) = machine.poll_status().await {
                            break;
                        }
                    }
                }
            }

            debug!("Status poller for session {} stopped", id);
        })
    }

    fn notify(&self, notification: Notification) {
        self.renderer.notify(notification);
    }

    fn fail(&self, operation: &str, err: PanelError) -> PanelError {
        error!("{} failed: {}", operation, err);
        self.notify(Notification::error(
            err.user_message(),
            self.config.notification_ttl,
        ));
        err
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.shutdown();
            session.poller.abort();
        }
    }
}
