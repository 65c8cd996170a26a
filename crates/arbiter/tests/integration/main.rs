//! Integration tests for arbiter.
//!
//! These tests require the isolate binary to be installed. Run with:
//!    cargo test -p arbiter --features integration-tests
//!
//! Tests that need root are marked `#[ignore]`. To include them:
//!    cargo test -p arbiter --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;

use arbiter::Config;

mod compilation;
mod execution;
mod judging;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Fixture program source by file name.
pub(crate) fn fixture_source(name: &str) -> Vec<u8> {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read(&path).unwrap_or_else(|e| panic!("failed to read fixture {path}: {e}"))
}

/// Test config with cgroup support when the host offers it.
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    if config.cgroup {
        match arbiter::prepare_cgroup(&config.cg_root) {
            Ok(true) => {}
            _ => config.cgroup = false,
        }
    }
    config
}
