//! Request layer for the Mountguard remote authority.
//!
//! One async method per remote capability and no retries; retry policy
//! belongs to the polling loops that drive this client. Every failure (transport,
//! timeout, non-success status) surfaces as an [`AuthorityError`] so callers
//! can treat the authority as simply unavailable.

mod client;
mod error;
mod messages;

pub use client::{Authority, AuthorityClient, AuthorityConfig};
pub use error::{AuthorityError, AuthorityResult};
pub use messages::{
    ChallengeResponse, DeviceListResponse, EventsResponse, IssueChallengeRequest,
    RealtimeResponse, StatusResponse, VerifyRequest, VerifyResponse,
};
