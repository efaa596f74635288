//! Domain events published by the orchestrator.
//!
//! Every user-visible notification is modeled as an event on a broadcast
//! channel. The presentation layer subscribes and renders; transition logic
//! never calls into it directly.

use chrono::{DateTime, Utc};

/// A notification-worthy occurrence inside the session.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardEvent {
    /// The authority became reachable.
    ServerConnected,
    /// The authority stopped answering; protection may be compromised.
    ServerDisconnected,
    /// Monitoring was started (explicitly or by auto-policy).
    MonitoringStarted,
    MonitoringStopped,
    /// The authority confirmed system-wide auto-mount blocking.
    ProtectionEnabled,
    /// A device entered the snapshot; mounting is blocked pending
    /// authorization.
    DeviceArrived { name: String },
    DeviceRemoved { name: String },
    /// A challenge was issued; scan the QR or enter the code before expiry.
    ChallengeIssued { expires_at: DateTime<Utc> },
    ChallengeIssueFailed { message: String },
    /// Verification succeeded; USB access unlocked.
    AccessGranted,
    /// Verification was rejected; access stays blocked.
    AccessDenied { message: String },
    /// The gate was re-locked without operator involvement.
    ForcedLock,
    /// Operator override flipped the system-wide blocking mode.
    BlockingChanged { blocked: bool },
}
