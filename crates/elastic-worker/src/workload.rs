//! Synthetic CPU-bound request work.

use rand::Rng;
use serde::Serialize;

/// Reply to one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkResult {
    /// Epoch nanoseconds at which the request was received.
    pub ts: u64,
    pub result: f64,
    pub duration_micros: u64,
}

/// Burn CPU for `load_factor` iterations of `r = x^sqrt(r)`.
pub fn synthetic_load<R: Rng + ?Sized>(rng: &mut R, load_factor: u32) -> f64 {
    let mut r: f64 = rng.gen_range(0.0..1.0);
    for _ in 0..load_factor {
        let x: f64 = rng.gen_range(0.0..1.0);
        r = x.powf(r.sqrt());
    }
    r
}
