//! Testing utilities
//!
//! Mock implementations used by unit and integration tests.

pub mod mocks;
