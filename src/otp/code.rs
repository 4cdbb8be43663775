//! OTP code generation and the shared validity check.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};

use super::models::{CredentialRecord, OtpError};

/// Number of digits in a generated code.
pub const CODE_LENGTH: usize = 6;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Generate a uniformly random 6-digit code.
///
/// The range starts at 100000 so the decimal encoding never carries a
/// leading zero and is always exactly six ASCII digits.
#[must_use]
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Check a submitted code against the stored OTP pair.
///
/// Read-only: callers apply the follow-up mutation themselves so signup
/// verification and password reset share one comparison algorithm.
///
/// A cleared pair fails closed as `InvalidCode`. The mismatch check runs
/// before the expiry check, and expiry is inclusive: `now == otp_expires`
/// is still valid.
///
/// # Errors
/// `InvalidCode` on a cleared pair or mismatch, `Expired` past the expiry.
pub fn check_code(
    record: &CredentialRecord,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    let (stored, expires) = match (&record.otp, record.otp_expires) {
        (Some(stored), Some(expires)) => (stored, expires),
        // A half-set pair means the atomicity invariant was broken upstream;
        // treat it the same as a cleared pair.
        _ => return Err(OtpError::InvalidCode),
    };

    if stored != submitted {
        return Err(OtpError::InvalidCode);
    }

    if now > expires {
        return Err(OtpError::Expired);
    }

    Ok(())
}
