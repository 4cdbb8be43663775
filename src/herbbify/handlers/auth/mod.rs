//! Account endpoints: signup, sign-in, verification, and password recovery.

pub mod recovery;
pub mod session;
pub mod state;
pub mod types;
pub mod verification;

mod utils;

pub use state::{AuthConfig, AuthState};
