//! Herbbify account service: signup, email verification with one-time codes,
//! sign-in, and password recovery over a hosted identity provider.

pub mod cli;
pub mod email;
pub mod herbbify;
pub mod identity;
pub mod otp;
pub mod store;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
