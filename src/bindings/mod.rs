//! # Bindings
//!
//! Foreign-language entry points. Compiled only with the `python` feature.

pub mod python;
