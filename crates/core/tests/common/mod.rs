//! Shared helpers for the integration tests.


/// `mockall` doubles for the injected capabilities.
pub mod mocks;
