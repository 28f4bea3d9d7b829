//! Integration test crate for the Tessera coordination layer.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end ceremony flows across multiple workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tessera-integration-tests
//! ```
