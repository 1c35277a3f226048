//! # Architecture Abstraction Layer
//!
//! Register-level implementations of the feeder's hardware capabilities.
//! Currently implements the TM4C123GH6PM port; other boards add sibling
//! modules implementing the same traits.

pub mod tm4c123;
