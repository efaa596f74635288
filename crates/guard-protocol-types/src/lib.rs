//! Pure domain and wire types for Mountguard.
//!
//! Everything the synchronization core passes between components lives here:
//! device snapshots, security events, challenges, and authorization state.
//! No I/O and no async: the types are plain values so every other crate can
//! depend on this one without dragging in a runtime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a challenge stays valid after issuance.
pub const CHALLENGE_TTL_SECS: i64 = 5 * 60;

/// Number of decimal digits in a manually entered OTP.
pub const OTP_DIGITS: usize = 6;

/// A USB device as reported by the authority.
///
/// Devices are immutable value snapshots: each poll replaces the whole set,
/// nothing is mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDevice {
    pub name: String,
    pub vendor: String,
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(rename = "mountPath", default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default)]
    pub blocked: bool,
}

impl UsbDevice {
    /// Stable identity for diffing: the serial when present, otherwise a
    /// composite of name, vendor, and product.
    pub fn identity(&self) -> DeviceIdentity {
        match self.serial.as_deref() {
            Some(serial) if !serial.is_empty() => DeviceIdentity(serial.to_string()),
            _ => DeviceIdentity(format!("{}:{}:{}", self.name, self.vendor, self.product)),
        }
    }

    /// Human-readable name for event and notification payloads.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown Device"
        } else {
            &self.name
        }
    }
}

/// Identity key derived from a [`UsbDevice`].
///
/// Within one snapshot an identity uniquely determines a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(pub String);

impl DeviceIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status carried by a [`SecurityEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Connected,
    Disconnected,
    Blocked,
    Allowed,
    MountBlocked,
}

/// A single entry in the merged security event log.
///
/// Events come from two sources: the authority's event endpoint and locally
/// synthesized arrival/departure/edge events. The dedup key when merging the
/// two is (timestamp, action, device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub status: EventStatus,
}

impl SecurityEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        action: impl Into<String>,
        device: Option<String>,
        status: EventStatus,
    ) -> Self {
        Self {
            timestamp,
            action: action.into(),
            device,
            status,
        }
    }
}

/// Payload embedded in the QR image handed to the operator's phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub otp: String,
    pub timestamp: DateTime<Utc>,
    pub security_level: String,
    pub device_id: String,
}

impl QrPayload {
    /// Serialize for embedding in a QR-render request.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A time-limited authorization challenge.
///
/// At most one challenge is active at a time; issuing a new one invalidates
/// the previous one. Expiry is checked against the caller-supplied clock so
/// the state machine stays testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub otp: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub qr_payload: QrPayload,
}

impl Challenge {
    /// Build a challenge issued at `now`, expiring after [`CHALLENGE_TTL_SECS`].
    pub fn new(otp: impl Into<String>, device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let otp = otp.into();
        Self {
            qr_payload: QrPayload {
                otp: otp.clone(),
                timestamp: now,
                security_level: "high".to_string(),
                device_id: device_id.into(),
            },
            otp,
            issued_at: now,
            expires_at: now + Duration::seconds(CHALLENGE_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Whether a manually entered code has the expected shape: exactly six
/// decimal digits.
pub fn is_valid_otp_format(code: &str) -> bool {
    code.len() == OTP_DIGITS && code.chars().all(|c| c.is_ascii_digit())
}

/// Locally mirrored blocking state, owned by the authorization gate.
///
/// Starts fully blocked; only gate transitions mutate it, and any
/// disconnect resets it to blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub usb_blocked: bool,
    pub auto_mount_blocked: bool,
}

impl AuthorizationState {
    pub fn blocked() -> Self {
        Self {
            usb_blocked: true,
            auto_mount_blocked: true,
        }
    }

    pub fn unlocked() -> Self {
        Self {
            usb_blocked: false,
            auto_mount_blocked: false,
        }
    }
}

impl Default for AuthorizationState {
    fn default() -> Self {
        Self::blocked()
    }
}

/// Connection state as seen by the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            connected: false,
            last_transition_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn device(name: &str, serial: Option<&str>) -> UsbDevice {
        UsbDevice {
            name: name.to_string(),
            vendor: "0781".to_string(),
            product: "5567".to_string(),
            serial: serial.map(|s| s.to_string()),
            mount_path: None,
            blocked: true,
        }
    }

    #[test]
    fn identity_prefers_serial() {
        let d = device("Cruzer Blade", Some("A1B2C3"));
        assert_eq!(d.identity().as_str(), "A1B2C3");
    }

    #[test]
    fn identity_falls_back_to_composite() {
        let d = device("Cruzer Blade", None);
        assert_eq!(d.identity().as_str(), "Cruzer Blade:0781:5567");
    }

    #[test]
    fn identity_ignores_empty_serial() {
        let d = device("Cruzer Blade", Some(""));
        assert_eq!(d.identity().as_str(), "Cruzer Blade:0781:5567");
    }

    #[test]
    fn display_name_falls_back_for_empty() {
        let d = device("", None);
        assert_eq!(d.display_name(), "Unknown Device");
        let d = device("Cruzer Blade", None);
        assert_eq!(d.display_name(), "Cruzer Blade");
    }

    #[test]
    fn device_deserializes_server_shape() {
        let json = r#"{
            "name": "Cruzer Blade",
            "vendor": "0781",
            "product": "5567",
            "serial": "A1",
            "mountPath": "/media/usb0",
            "blocked": true
        }"#;
        let d: UsbDevice = serde_json::from_str(json).unwrap();
        assert_eq!(d.mount_path.as_deref(), Some("/media/usb0"));
        assert!(d.blocked);
    }

    #[test]
    fn device_deserializes_minimal_shape() {
        let json = r#"{"name":"Disk","vendor":"abcd","product":"0001"}"#;
        let d: UsbDevice = serde_json::from_str(json).unwrap();
        assert!(d.serial.is_none());
        assert!(d.mount_path.is_none());
        assert!(!d.blocked);
    }

    #[test]
    fn event_status_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventStatus::MountBlocked).unwrap(),
            "\"mount_blocked\""
        );
        let s: EventStatus = serde_json::from_str("\"disconnected\"").unwrap();
        assert_eq!(s, EventStatus::Disconnected);
    }

    #[test]
    fn challenge_expires_after_ttl() {
        let issued = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let challenge = Challenge::new("483920", "system", issued);

        assert_eq!(challenge.expires_at - challenge.issued_at, Duration::seconds(300));
        assert!(!challenge.is_expired(issued));
        assert!(!challenge.is_expired(issued + Duration::seconds(300)));
        assert!(challenge.is_expired(issued + Duration::seconds(301)));
    }

    #[test]
    fn qr_payload_serializes_contract_fields() {
        let issued = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let challenge = Challenge::new("483920", "A1B2C3", issued);
        let json = challenge.qr_payload.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["otp"], "483920");
        assert_eq!(value["security_level"], "high");
        assert_eq!(value["device_id"], "A1B2C3");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn otp_format_requires_six_digits() {
        assert!(is_valid_otp_format("483920"));
        assert!(!is_valid_otp_format("48392"));
        assert!(!is_valid_otp_format("4839201"));
        assert!(!is_valid_otp_format("48392a"));
        assert!(!is_valid_otp_format(""));
    }

    #[test]
    fn authorization_state_defaults_to_blocked() {
        let state = AuthorizationState::default();
        assert!(state.usb_blocked);
        assert!(state.auto_mount_blocked);
    }

    #[test]
    fn connection_status_defaults_to_disconnected() {
        let status = ConnectionStatus::default();
        assert!(!status.connected);
        assert!(status.last_transition_at.is_none());
    }
}
