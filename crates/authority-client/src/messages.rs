//! Request and response shapes for the authority's REST surface.
//!
//! Field casing follows the wire format the authority actually speaks:
//! request bodies use the camelCase keys its handlers expect, responses are
//! deserialized leniently with defaults so a sparse answer still parses.

use guard_protocol_types::{SecurityEvent, UsbDevice};
use serde::{Deserialize, Serialize};

/// Response of the liveness/status probe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub usb_blocked: bool,
    #[serde(default)]
    pub auto_mount_blocked: bool,
}

/// Response of the device-list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceListResponse {
    #[serde(default)]
    pub devices: Vec<UsbDevice>,
    #[serde(default)]
    pub monitoring: bool,
}

/// Response of the fast change-detection endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimeResponse {
    #[serde(default)]
    pub devices: Vec<UsbDevice>,
}

/// Response of the event-list endpoint.
///
/// The authority answers with `new_events` (incremental variant) or
/// `events` (full variant); [`EventsResponse::into_events`] folds the two.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub new_events: Vec<SecurityEvent>,
    #[serde(default)]
    pub events: Vec<SecurityEvent>,
}

impl EventsResponse {
    /// The reported events, regardless of which variant answered.
    pub fn into_events(self) -> Vec<SecurityEvent> {
        if self.new_events.is_empty() {
            self.events
        } else {
            self.new_events
        }
    }
}

/// Body of the start-monitoring request.
#[derive(Debug, Clone, Serialize)]
pub struct StartMonitoringRequest {
    #[serde(rename = "blockAutoMount")]
    pub block_auto_mount: bool,
}

/// Body of the enable-protection request.
#[derive(Debug, Clone, Serialize)]
pub struct EnableProtectionRequest {
    #[serde(rename = "blockAutoMount")]
    pub block_auto_mount: bool,
    #[serde(rename = "requireAuthentication")]
    pub require_authentication: bool,
}

/// Body of the challenge-issue request.
#[derive(Debug, Clone, Serialize)]
pub struct IssueChallengeRequest {
    pub security_level: String,
    pub include_qr: bool,
}

impl Default for IssueChallengeRequest {
    fn default() -> Self {
        Self {
            security_level: "high".to_string(),
            include_qr: true,
        }
    }
}

/// Response of the challenge-issue endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeResponse {
    pub otp: String,
    #[serde(default)]
    pub qr_code_url: Option<String>,
}

/// Body of the challenge-verify request.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub otp: String,
    #[serde(rename = "enableAutoMount")]
    pub enable_auto_mount: bool,
    #[serde(rename = "deviceAccess")]
    pub device_access: bool,
}

/// Response of the challenge-verify endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of the set-blocking request.
#[derive(Debug, Clone, Serialize)]
pub struct SetBlockingRequest {
    #[serde(rename = "blockAutoMount")]
    pub block_auto_mount: bool,
    #[serde(rename = "systemWide")]
    pub system_wide: bool,
}

/// Body of the per-device mount-block request.
#[derive(Debug, Clone, Serialize)]
pub struct BlockDeviceRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_list_parses_full_response() {
        let json = r#"{
            "devices": [
                {"name": "Cruzer Blade", "vendor": "0781", "product": "5567", "serial": "A1"}
            ],
            "monitoring": true
        }"#;
        let resp: DeviceListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.devices.len(), 1);
        assert!(resp.monitoring);
    }

    #[test]
    fn device_list_parses_empty_response() {
        let resp: DeviceListResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.devices.is_empty());
        assert!(!resp.monitoring);
    }

    #[test]
    fn events_response_defaults_to_empty() {
        let resp: EventsResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.into_events().is_empty());
    }

    #[test]
    fn events_response_accepts_both_variants() {
        let incremental: EventsResponse = serde_json::from_str(
            r#"{"new_events":[{"timestamp":"2025-06-01T12:00:00Z","action":"Device Inserted","device":"A1","status":"mount_blocked"}]}"#,
        )
        .unwrap();
        assert_eq!(incremental.into_events().len(), 1);

        let full: EventsResponse = serde_json::from_str(
            r#"{"events":[{"timestamp":"2025-06-01T12:00:00Z","action":"Device Removed","device":"A1","status":"disconnected"}]}"#,
        )
        .unwrap();
        assert_eq!(full.into_events().len(), 1);
    }

    #[test]
    fn verify_request_uses_wire_casing() {
        let body = VerifyRequest {
            otp: "483920".to_string(),
            enable_auto_mount: true,
            device_access: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["otp"], "483920");
        assert_eq!(json["enableAutoMount"], true);
        assert_eq!(json["deviceAccess"], true);
    }

    #[test]
    fn set_blocking_request_uses_wire_casing() {
        let body = SetBlockingRequest {
            block_auto_mount: true,
            system_wide: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["blockAutoMount"], true);
        assert_eq!(json["systemWide"], true);
    }

    #[test]
    fn challenge_response_tolerates_missing_qr() {
        let resp: ChallengeResponse = serde_json::from_str(r#"{"otp":"123456"}"#).unwrap();
        assert_eq!(resp.otp, "123456");
        assert!(resp.qr_code_url.is_none());
    }

    #[test]
    fn issue_challenge_default_is_high_with_qr() {
        let req = IssueChallengeRequest::default();
        assert_eq!(req.security_level, "high");
        assert!(req.include_qr);
    }
}
