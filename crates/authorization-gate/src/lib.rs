//! Challenge/response authorization state machine.
//!
//! The gate is the only component allowed to mutate [`AuthorizationState`]
//! and the active [`Challenge`]. It starts locked, issues time-limited OTP
//! challenges through the authority, and unlocks only on a successful
//! verification of a live challenge (or an explicit operator override).
//! A disconnect force-locks it from any state.
//!
//! Known hardening gap, kept deliberately: a live challenge survives wrong
//! verification attempts, so an operator can retry without limit until the
//! challenge expires or is re-issued.

use authority_client::{
    Authority, AuthorityError, IssueChallengeRequest, VerifyRequest,
};
use chrono::{DateTime, Utc};
use guard_protocol_types::{
    is_valid_otp_format, AuthorizationState, Challenge, DeviceIdentity,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Generic operator-facing rejection message. Deliberately does not say
/// whether the code was wrong, expired, or missing.
const VERIFICATION_REJECTED: &str = "Invalid authentication code";

/// Gate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Fully blocked; no challenge outstanding.
    Locked,
    /// A challenge has been issued and awaits verification.
    ChallengePending,
    /// Access granted; auto-mount enabled.
    Unlocked,
}

/// What triggered a challenge issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOrigin {
    /// A device arrival; only honored while the gate is locked.
    NewDevice(DeviceIdentity),
    /// An explicit operator command; honored while locked or pending
    /// (re-issuing invalidates the previous challenge).
    Operator,
}

/// Errors from gate transitions.
#[derive(Debug, Error)]
pub enum GateError {
    /// The authority refused or failed to issue a challenge; the gate
    /// stays in its previous state and the operator may retry.
    #[error("challenge issue failed")]
    ChallengeIssueFailed(#[source] AuthorityError),

    /// The submitted code was rejected; the gate stays pending.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// The requested transition is not allowed from the current state.
    #[error("operation not permitted in the current state")]
    NotPermitted,

    /// Transport failure talking to the authority; state unchanged.
    #[error("authority request failed")]
    Authority(#[from] AuthorityError),
}

/// The authorization gate.
pub struct AuthorizationGate {
    authority: Arc<dyn Authority>,
    state: GateState,
    authorization: AuthorizationState,
    challenge: Option<Challenge>,
    qr_code_url: Option<String>,
}

impl AuthorizationGate {
    /// Create a gate in the initial fully blocked state.
    pub fn new(authority: Arc<dyn Authority>) -> Self {
        Self {
            authority,
            state: GateState::Locked,
            authorization: AuthorizationState::blocked(),
            challenge: None,
            qr_code_url: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.authorization
    }

    /// The challenge awaiting verification, if any.
    pub fn active_challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// QR image URL returned by the authority for the active challenge.
    pub fn qr_code_url(&self) -> Option<&str> {
        self.qr_code_url.as_deref()
    }

    /// Issue a new challenge through the authority.
    ///
    /// On success the gate moves to [`GateState::ChallengePending`] and any
    /// previous challenge is invalidated. On failure the gate keeps its
    /// previous state and challenge untouched.
    pub async fn issue_challenge(
        &mut self,
        origin: ChallengeOrigin,
        now: DateTime<Utc>,
    ) -> Result<Challenge, GateError> {
        let permitted = match &origin {
            ChallengeOrigin::NewDevice(_) => self.state == GateState::Locked,
            ChallengeOrigin::Operator => self.state != GateState::Unlocked,
        };
        if !permitted {
            debug!(state = ?self.state, "Challenge request ignored");
            return Err(GateError::NotPermitted);
        }

        let response = self
            .authority
            .issue_challenge(IssueChallengeRequest::default())
            .await
            .map_err(|err| {
                warn!(error = %err, "Challenge issue failed");
                GateError::ChallengeIssueFailed(err)
            })?;

        let device_id = match origin {
            ChallengeOrigin::NewDevice(identity) => identity.0,
            ChallengeOrigin::Operator => "system".to_string(),
        };
        let challenge = Challenge::new(response.otp, device_id, now);

        info!(expires_at = %challenge.expires_at, "Challenge issued");
        self.challenge = Some(challenge.clone());
        self.qr_code_url = response.qr_code_url;
        self.state = GateState::ChallengePending;
        Ok(challenge)
    }

    /// Verify a submitted code against the active challenge.
    ///
    /// The code must match the live, unexpired challenge locally, and the
    /// authority must confirm it; only then does the gate unlock. A wrong
    /// code leaves the challenge live; an expired one is discarded.
    pub async fn verify(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), GateError> {
        if self.state != GateState::ChallengePending {
            return Err(GateError::VerificationFailed(
                VERIFICATION_REJECTED.to_string(),
            ));
        }
        let Some(challenge) = self.challenge.as_ref() else {
            return Err(GateError::VerificationFailed(
                VERIFICATION_REJECTED.to_string(),
            ));
        };

        if challenge.is_expired(now) {
            // Expiry invalidates the challenge; a wrong code does not.
            info!("Challenge expired before verification");
            self.challenge = None;
            self.qr_code_url = None;
            return Err(GateError::VerificationFailed(
                VERIFICATION_REJECTED.to_string(),
            ));
        }

        if !is_valid_otp_format(code) || code != challenge.otp {
            debug!("Verification attempt rejected locally");
            return Err(GateError::VerificationFailed(
                VERIFICATION_REJECTED.to_string(),
            ));
        }

        let response = self
            .authority
            .verify_challenge(VerifyRequest {
                otp: code.to_string(),
                enable_auto_mount: true,
                device_access: true,
            })
            .await?;

        if !response.success {
            warn!("Authority rejected verification");
            return Err(GateError::VerificationFailed(
                response
                    .message
                    .unwrap_or_else(|| VERIFICATION_REJECTED.to_string()),
            ));
        }

        info!("Access granted");
        self.state = GateState::Unlocked;
        self.authorization = AuthorizationState::unlocked();
        self.challenge = None;
        self.qr_code_url = None;
        Ok(())
    }

    /// Re-lock locally, from any state, discarding any active challenge.
    ///
    /// Used on disconnect edges where the authority cannot be consulted.
    pub fn force_lock(&mut self) {
        if self.state != GateState::Locked || self.challenge.is_some() {
            info!(previous = ?self.state, "Gate force-locked");
        }
        self.state = GateState::Locked;
        self.authorization = AuthorizationState::blocked();
        self.challenge = None;
        self.qr_code_url = None;
    }

    /// Operator override of the system-wide blocking mode.
    ///
    /// `true` is the explicit lock command; `false` unlocks without a
    /// challenge. Both are confirmed with the authority before the local
    /// state flips; a transport failure leaves the gate unchanged.
    pub async fn set_blocking(&mut self, blocked: bool) -> Result<(), GateError> {
        self.authority.set_blocking(blocked, true).await?;

        if blocked {
            self.force_lock();
        } else {
            info!("Gate unlocked by operator override");
            self.state = GateState::Unlocked;
            self.authorization = AuthorizationState::unlocked();
            self.challenge = None;
            self.qr_code_url = None;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("state", &self.state)
            .field("authorization", &self.authorization)
            .field("has_challenge", &self.challenge.is_some())
            .finish()
    }
}
