//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Scenarios**: Resolution cases with known outcomes, stored as JSON
//! - **Generators**: Proptest strategies for group forests and operation paths
//! - **Fixtures**: The standard seeded engine and larger randomized ones
//!
//! ## Scenarios
//!
//! ```rust
//! use warden_testkit::scenarios::verify_all_scenarios;
//!
//! for (name, passed, _) in verify_all_scenarios() {
//!     assert!(passed, "{name}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::{forest_from_params, group_name, ForestParams};
//!
//! proptest! {
//!     #[test]
//!     fn member_reaches_its_own_groups(params: ForestParams) {
//!         let (auth, principal) = forest_from_params(&params);
//!         let groups = auth.associated_groups_for_principal(principal).unwrap();
//!         prop_assert_eq!(groups.len(), params.member_of.len());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden_testkit::fixtures::StandardFixture;
//!
//! let fixture = StandardFixture::new();
//! assert!(!fixture.auth.is_allowed(fixture.ayende, fixture.account, "/Account/Edit").unwrap());
//! ```

pub mod fixtures;
pub mod generators;
pub mod scenarios;

pub use fixtures::{seed_warden, wide_fixture, StandardFixture, WideFixture};
pub use generators::{forest_from_params, ForestParams};
pub use scenarios::{all_scenarios, run_scenario, verify_all_scenarios, GrantSpec, Scenario};
