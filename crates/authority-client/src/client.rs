//! HTTP client for the remote authority.

use crate::error::{AuthorityError, AuthorityResult};
use crate::messages::{
    BlockDeviceRequest, ChallengeResponse, DeviceListResponse, EnableProtectionRequest,
    EventsResponse, IssueChallengeRequest, RealtimeResponse, SetBlockingRequest,
    StartMonitoringRequest, StatusResponse, VerifyRequest, VerifyResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// Authority client configuration.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Base URL of the authority (e.g., `http://127.0.0.1:5000`).
    pub base_url: String,
    /// Per-request timeout; a timeout is treated as a transport failure.
    pub request_timeout: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout: Duration::from_secs(3),
        }
    }
}

/// The set of remote capabilities the synchronization core consumes.
///
/// The gate and the orchestrator talk to the authority exclusively through
/// this trait so tests can substitute scripted implementations.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Liveness probe; success doubles as the connection check.
    async fn probe(&self) -> AuthorityResult<StatusResponse>;

    /// Full device list plus the server-side monitoring flag.
    async fn list_devices(&self) -> AuthorityResult<DeviceListResponse>;

    /// Fast change-detection variant of the device list.
    async fn realtime_devices(&self) -> AuthorityResult<RealtimeResponse>;

    /// Events the authority recorded since the last fetch.
    async fn list_new_events(&self) -> AuthorityResult<EventsResponse>;

    async fn start_monitoring(&self, block_auto_mount: bool) -> AuthorityResult<()>;

    async fn stop_monitoring(&self) -> AuthorityResult<()>;

    /// Ask the authority to enforce system-wide auto-mount blocking.
    async fn enable_protection(&self) -> AuthorityResult<()>;

    async fn issue_challenge(
        &self,
        request: IssueChallengeRequest,
    ) -> AuthorityResult<ChallengeResponse>;

    async fn verify_challenge(&self, request: VerifyRequest) -> AuthorityResult<VerifyResponse>;

    /// Flip the system-wide blocking mode.
    async fn set_blocking(&self, block_auto_mount: bool, system_wide: bool)
        -> AuthorityResult<()>;

    /// Block mounting for one specific device.
    async fn block_device_mount(&self, device_id: &str) -> AuthorityResult<()>;
}

/// REST client for the authority.
///
/// Thin by contract: one request per call, bounded timeout, no retries, no
/// state beyond the connection pool.
#[derive(Clone)]
pub struct AuthorityClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl AuthorityClient {
    /// Create a client with the given configuration.
    pub fn new(config: AuthorityConfig) -> AuthorityResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with default configuration.
    pub fn with_defaults() -> AuthorityResult<Self> {
        Self::new(AuthorityConfig::default())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AuthorityResult<T> {
        let response = self
            .http_client
            .get(self.api_url(path))
            .header("Cache-Control", "no-cache")
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> AuthorityResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.api_url(path))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AuthorityResult<()> {
        let response = self
            .http_client
            .post(self.api_url(path))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Authority for AuthorityClient {
    async fn probe(&self) -> AuthorityResult<StatusResponse> {
        self.get_json("/api/usb-status").await
    }

    async fn list_devices(&self) -> AuthorityResult<DeviceListResponse> {
        self.get_json("/api/usb-devices").await
    }

    async fn realtime_devices(&self) -> AuthorityResult<RealtimeResponse> {
        self.get_json("/api/usb-realtime-status").await
    }

    async fn list_new_events(&self) -> AuthorityResult<EventsResponse> {
        self.get_json("/api/usb-events").await
    }

    async fn start_monitoring(&self, block_auto_mount: bool) -> AuthorityResult<()> {
        debug!(block_auto_mount, "Requesting monitoring start");
        self.post_unit(
            "/api/start-monitoring",
            &StartMonitoringRequest { block_auto_mount },
        )
        .await
    }

    async fn stop_monitoring(&self) -> AuthorityResult<()> {
        debug!("Requesting monitoring stop");
        self.post_unit("/api/stop-monitoring", &serde_json::json!({})).await
    }

    async fn enable_protection(&self) -> AuthorityResult<()> {
        debug!("Requesting system-wide protection");
        self.post_unit(
            "/api/enable-protection",
            &EnableProtectionRequest {
                block_auto_mount: true,
                require_authentication: true,
            },
        )
        .await
    }

    async fn issue_challenge(
        &self,
        request: IssueChallengeRequest,
    ) -> AuthorityResult<ChallengeResponse> {
        debug!(security_level = %request.security_level, "Requesting challenge");
        self.post_json("/api/generate-secure-qr", &request).await
    }

    async fn verify_challenge(&self, request: VerifyRequest) -> AuthorityResult<VerifyResponse> {
        debug!("Submitting challenge verification");
        self.post_json("/api/verify-otp-and-mount", &request).await
    }

    async fn set_blocking(
        &self,
        block_auto_mount: bool,
        system_wide: bool,
    ) -> AuthorityResult<()> {
        let path = if block_auto_mount {
            "/api/block-usb-system"
        } else {
            "/api/unblock-usb-system"
        };
        debug!(block_auto_mount, system_wide, "Setting blocking mode");
        self.post_unit(
            path,
            &SetBlockingRequest {
                block_auto_mount,
                system_wide,
            },
        )
        .await
    }

    async fn block_device_mount(&self, device_id: &str) -> AuthorityResult<()> {
        debug!(device_id, "Blocking device mount");
        self.post_unit(
            "/api/block-device-mount",
            &BlockDeviceRequest {
                device_id: device_id.to_string(),
            },
        )
        .await
    }
}

/// Map a non-success HTTP response to an [`AuthorityError::Status`].
async fn check_response(response: reqwest::Response) -> AuthorityResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        error!(status, "Authority request failed: {}", message);
        return Err(AuthorityError::Status { status, message });
    }
    Ok(response)
}

impl std::fmt::Debug for AuthorityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_points_at_local_authority() {
        let config = AuthorityConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn api_url_joins_path() {
        let client = AuthorityClient::new(AuthorityConfig::default()).unwrap();
        assert_eq!(
            client.api_url("/api/usb-status"),
            "http://127.0.0.1:5000/api/usb-status"
        );
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let client = AuthorityClient::new(AuthorityConfig {
            base_url: "http://127.0.0.1:5000/".to_string(),
            ..AuthorityConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.api_url("/api/usb-events"),
            "http://127.0.0.1:5000/api/usb-events"
        );
    }

    #[test]
    fn debug_does_not_leak_internals() {
        let client = AuthorityClient::with_defaults().unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("base_url"));
    }
}
