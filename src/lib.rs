//! Hedge Analysis Library
//!
//! Exposes the analysis core for the `hedge_analysis` binary and tests.

pub mod analysis;
