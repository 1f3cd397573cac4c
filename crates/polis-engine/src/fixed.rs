//! Fixed-point numeric types, re-exported from the content crate so the
//! whole workspace agrees on one representation.

pub use polis_content::fixed::{Fixed64, Ticks, f64_to_fixed64, fixed64_to_f64};
