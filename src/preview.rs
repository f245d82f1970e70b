// Live preview channel
//
// The capture service pushes preview frames on a STOMP topic over a
// WebSocket. A producer task moves frames from the socket into a single-slot
// mailbox (`watch`), a consumer task renders whatever is newest. Frames that
// arrive faster than they are rendered are superseded, never queued. A stream
// that ends without the channel being closed counts as a channel error.

use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::render::{Notification, PanelRenderer, PreviewView};
use crate::stomp::StompFrame;
use crate::types::PreviewFrame;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Message shown when the push channel fails
pub const PREVIEW_ERROR_MESSAGE: &str = "Preview connection error";

const SUBSCRIPTION_ID: &str = "sub-0";

/// Unbounded sequence of pushed preview frames
pub type FrameStream = BoxStream<'static, PanelResult<PreviewFrame>>;

/// Opens the push subscription carrying preview frames
#[async_trait]
pub trait PreviewConnector: Send + Sync {
    async fn connect(&self) -> PanelResult<FrameStream>;
}

/// STOMP-over-WebSocket subscription to the preview topic
pub struct StompPreviewConnector {
    url: String,
    topic: String,
}

impl StompPreviewConnector {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }

    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(config.preview_url.clone(), config.preview_topic.clone())
    }

    fn host(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

#[async_trait]
impl PreviewConnector for StompPreviewConnector {
    async fn connect(&self) -> PanelResult<FrameStream> {
        info!("Connecting to preview channel at {}", self.url);

        let (mut ws, _) = connect_async(self.url.as_str()).await?;

        ws.send(Message::Text(StompFrame::connect(&self.host()).encode().into()))
            .await?;

        // Wait for the broker to accept the session
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => match StompFrame::decode(&text)? {
                    Some(frame) if frame.command == "CONNECTED" => break,
                    Some(frame) if frame.command == "ERROR" => {
                        return Err(PanelError::Protocol(error_text(&frame)));
                    }
                    Some(frame) => debug!("Ignoring {} frame before CONNECTED", frame.command),
                    None => {}
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(PanelError::Transport(
                        "Preview socket closed during handshake".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }

        ws.send(Message::Text(
            StompFrame::subscribe(SUBSCRIPTION_ID, &self.topic)
                .encode()
                .into(),
        ))
        .await?;

        info!("Subscribed to preview topic {}", self.topic);

        let topic = self.topic.clone();
        let frames = async_stream::stream! {
            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Text(text)) => match StompFrame::decode(&text) {
                        Ok(Some(frame)) => match frame.command.as_str() {
                            "MESSAGE" => {
                                if frame.header("destination").is_some_and(|d| d != topic) {
                                    debug!("Ignoring message for {:?}", frame.header("destination"));
                                    continue;
                                }
                                match serde_json::from_str::<PreviewFrame>(&frame.body) {
                                    Ok(preview) => yield Ok(preview),
                                    Err(e) => warn!("Skipping unreadable preview frame: {}", e),
                                }
                            }
                            "ERROR" => {
                                yield Err(PanelError::Protocol(error_text(&frame)));
                                break;
                            }
                            other => debug!("Ignoring {} frame", other),
                        },
                        // heart-beat
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        warn!("Preview socket closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(PanelError::from(e));
                        break;
                    }
                }
            }
        };

        Ok(frames.boxed())
    }
}

fn error_text(frame: &StompFrame) -> String {
    frame
        .header("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.clone())
}

/// Counters of a preview channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub frames_received: u64,
    pub frames_rendered: u64,
}

/// A running preview subscription
pub struct PreviewChannel {
    cancel: CancellationToken,
    latest: watch::Receiver<Option<PreviewFrame>>,
    frames_received: Arc<AtomicU64>,
    frames_rendered: Arc<AtomicU64>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl PreviewChannel {
    /// Spawn producer and consumer. Both stop when `parent` or the channel
    /// itself is cancelled.
    pub fn open(
        connector: Arc<dyn PreviewConnector>,
        renderer: Arc<dyn PanelRenderer>,
        notification_ttl: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let (tx, rx) = watch::channel::<Option<PreviewFrame>>(None);
        let frames_received = Arc::new(AtomicU64::new(0));
        let frames_rendered = Arc::new(AtomicU64::new(0));

        let producer = {
            let cancel = cancel.clone();
            let renderer = Arc::clone(&renderer);
            let received = Arc::clone(&frames_received);

            tokio::spawn(async move {
                let connected = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    result = connector.connect() => result,
                };

                let mut frames = match connected {
                    Ok(frames) => frames,
                    Err(e) => {
                        error!("Failed to open preview channel: {}", e);
                        notify_channel_error(renderer.as_ref(), notification_ttl);
                        return;
                    }
                };

                info!("Preview channel established");

                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => {
                            debug!("Preview producer cancelled");
                            break;
                        }

                        item = frames.next() => match item {
                            Some(Ok(frame)) => {
                                received.fetch_add(1, Ordering::Relaxed);
                                tx.send_replace(Some(frame));
                            }
                            Some(Err(e)) => {
                                error!("Preview channel error: {}", e);
                                notify_channel_error(renderer.as_ref(), notification_ttl);
                                break;
                            }
                            None => {
                                // Only cancellation ends the channel quietly
                                if !cancel.is_cancelled() {
                                    error!("Preview stream ended unexpectedly");
                                    notify_channel_error(renderer.as_ref(), notification_ttl);
                                }
                                break;
                            }
                        }
                    }
                }
            })
        };

        let consumer = {
            let cancel = cancel.clone();
            let rendered = Arc::clone(&frames_rendered);
            let mut rx = rx.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => break,

                        changed = rx.changed() => {
                            if changed.is_err() {
                                // Producer finished and the last frame was rendered
                                break;
                            }
                            let frame = rx.borrow_and_update().clone();
                            if let Some(frame) = frame {
                                renderer.render_preview(&PreviewView::new(frame.image, frame.quality));
                                rendered.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
                debug!("Preview consumer stopped");
            })
        };

        Self {
            cancel,
            latest: rx,
            frames_received,
            frames_rendered,
            producer,
            consumer,
        }
    }

    /// Tear the subscription down
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("Closing preview channel");
            self.cancel.cancel();
        }
    }

    /// Whether frames can still arrive
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.producer.is_finished()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Most recent frame received, rendered or not
    pub fn latest(&self) -> Option<PreviewFrame> {
        self.latest.borrow().clone()
    }

    pub fn stats(&self) -> PreviewStats {
        PreviewStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
        }
    }

    /// Wait until both tasks have exited
    pub async fn join(mut self) {
        if let Err(e) = (&mut self.producer).await {
            warn!("Preview producer task failed: {}", e);
        }
        if let Err(e) = (&mut self.consumer).await {
            warn!("Preview consumer task failed: {}", e);
        }
    }
}

impl Drop for PreviewChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn notify_channel_error(renderer: &dyn PanelRenderer, ttl: Duration) {
    renderer.notify(Notification::error(PREVIEW_ERROR_MESSAGE, ttl));
}
