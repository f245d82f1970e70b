use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::types::{
    decode_response, Ack, CompareRequest, DeviceStatus, FingerType, FingerTypeRequest,
    ImageCapture, LivenessReport, MultiCapture, PreviewStart, TemplateBatch, TemplateMatch,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Request/response operations of the remote capture service
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open_device(&self) -> PanelResult<Ack>;

    async fn close_device(&self) -> PanelResult<Ack>;

    async fn device_status(&self) -> PanelResult<DeviceStatus>;

    async fn set_finger_type(&self, kind: FingerType) -> PanelResult<Ack>;

    async fn capture_single(&self) -> PanelResult<ImageCapture>;

    /// Start the device's continuous capture feeding the preview topic
    async fn start_preview(&self) -> PanelResult<PreviewStart>;

    async fn stop_preview(&self) -> PanelResult<Ack>;

    async fn capture_multiple(&self, expected_fingers: u8) -> PanelResult<MultiCapture>;

    async fn capture_thumbs(&self) -> PanelResult<MultiCapture>;

    async fn create_templates(&self) -> PanelResult<TemplateBatch>;

    async fn compare_templates(&self, first: &str, second: &str) -> PanelResult<TemplateMatch>;

    async fn check_liveness(&self) -> PanelResult<LivenessReport>;

    async fn beep(&self, times: u8) -> PanelResult<Ack>;
}

/// `CaptureBackend` speaking JSON over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &PanelConfig) -> PanelResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PanelError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    /// Send and decode. Error statuses still carry the JSON envelope, so the
    /// body is decoded regardless of the HTTP status.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> PanelResult<T> {
        let response = request.send().await?;
        let status = response.status();

        let body: serde_json::Value = response.json().await.map_err(|e| {
            PanelError::Transport(format!("Unreadable response (HTTP {}): {}", status, e))
        })?;

        if !status.is_success() {
            debug!("Capture service answered HTTP {}", status);
        }

        decode_response(body)
    }
}

#[async_trait]
impl CaptureBackend for HttpBackend {
    async fn open_device(&self) -> PanelResult<Ack> {
        self.call(self.request(Method::POST, "/device/open")).await
    }

    async fn close_device(&self) -> PanelResult<Ack> {
        self.call(self.request(Method::POST, "/device/close")).await
    }

    async fn device_status(&self) -> PanelResult<DeviceStatus> {
        self.call(self.request(Method::GET, "/device/status")).await
    }

    async fn set_finger_type(&self, kind: FingerType) -> PanelResult<Ack> {
        let body = FingerTypeRequest { kind };
        self.call(self.request(Method::POST, "/device/finger-type").json(&body))
            .await
    }

    async fn capture_single(&self) -> PanelResult<ImageCapture> {
        self.call(self.request(Method::POST, "/capture/single")).await
    }

    async fn start_preview(&self) -> PanelResult<PreviewStart> {
        self.call(self.request(Method::POST, "/capture/start")).await
    }

    async fn stop_preview(&self) -> PanelResult<Ack> {
        self.call(self.request(Method::POST, "/capture/stop")).await
    }

    async fn capture_multiple(&self, expected_fingers: u8) -> PanelResult<MultiCapture> {
        let request = self
            .request(Method::POST, "/capture/multiple")
            .query(&[("expectedFingers", expected_fingers)]);
        self.call(request).await
    }

    async fn capture_thumbs(&self) -> PanelResult<MultiCapture> {
        self.call(self.request(Method::POST, "/capture/thumbs")).await
    }

    async fn create_templates(&self) -> PanelResult<TemplateBatch> {
        self.call(self.request(Method::POST, "/template/create")).await
    }

    async fn compare_templates(&self, first: &str, second: &str) -> PanelResult<TemplateMatch> {
        let body = CompareRequest {
            template1: first,
            template2: second,
        };
        self.call(self.request(Method::POST, "/template/compare").json(&body))
            .await
    }

    async fn check_liveness(&self) -> PanelResult<LivenessReport> {
        self.call(self.request(Method::POST, "/liveness/check")).await
    }

    async fn beep(&self, times: u8) -> PanelResult<Ack> {
        let request = self
            .request(Method::POST, "/device/beep")
            .query(&[("times", times)]);
        self.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let backend = HttpBackend::new(&PanelConfig::default())
            .unwrap()
            .with_base_url("http://127.0.0.1:9/api/fingerprint/");
        assert_eq!(backend.base_url(), "http://127.0.0.1:9/api/fingerprint");
    }
}
