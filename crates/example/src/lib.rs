//! Example crate demonstrating callbackgen usage.
//!
//! `build.rs` scans `src/`, generates the callback methods for
//! [`user::User`] and [`feed::Feed`] into `OUT_DIR`, and each module
//! includes its file as a child module.

pub mod feed;
pub mod user;
