//! Audio capture and spectrum analysis.
//!
//! `capture` owns the cpal input stream and its retry loop; `bands` turns
//! one captured frame into banded, normalized, smoothed levels.

pub mod bands;
pub mod capture;
