//! Route handlers for the Herbbify account API.

pub mod auth;
pub mod health;

pub use self::health::health;
