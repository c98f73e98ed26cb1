#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests: one-time tracing initialization
//! and environment loading.

use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads `.env` for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}
