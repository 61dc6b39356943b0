//! Shared helpers.

pub mod atomic;
