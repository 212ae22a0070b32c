//! Testing utilities and mock implementations
//!
//! This module provides mock implementations of the transport capability
//! traits so lifecycle, dispatch, codec, and producer paths can be tested
//! without a broker.

pub mod mocks;

pub use mocks::*;
