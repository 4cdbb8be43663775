//! OTP lifecycle and credential recovery.
//!
//! The lifecycle manager ([`lifecycle::OtpLifecycle`]) generates, persists,
//! validates, and expires 6-digit codes across signup verification, resend,
//! and password reset. The recovery flow ([`recovery::RecoveryFlow`])
//! orchestrates the reset path end to end.
//!
//! Expiry is lazy: codes are only checked against the clock at validation
//! time, never swept in the background. Concurrent issuance for one user is
//! last-write-wins; both emails go out, only the later-persisted code
//! validates.

pub mod code;
pub mod lifecycle;
pub mod models;
pub mod recovery;

pub use lifecycle::{IssuedOtp, OtpLifecycle, OtpPurpose, Validation};
pub use models::{CredentialRecord, OtpError, Plan};
pub use recovery::{FlowResponse, RecoveryFlow};
