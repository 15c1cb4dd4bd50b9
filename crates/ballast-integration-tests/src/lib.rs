//! Integration test crate for Ballast.
//!
//! This crate has no library code. It only contains integration tests that
//! drive the oracle, parameter manager, controller and database together.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p ballast-integration-tests
//! ```
