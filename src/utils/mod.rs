//! # Utility Functions (`utils`)
//!
//! Provides helper functions for CPU parallelism.

pub mod parallel;
