//! Vendor transform backend.
//!
//! The engine never computes a DFT itself; it asks a backend for opaque line
//! plans and executes them over its own buffers. The backend in use is picked
//! at compile time through [`DefaultBackend`]; per-backend capability quirks
//! belong in the trait impl, not in the engine.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

pub type Complex64 = Complex<f64>;

/// Opaque handle to a vendor line transform of a fixed length and direction.
///
/// Handles are cheap to clone and destruction is idempotent (reference
/// counted); a handle stays valid for the engine's lifetime.
pub type PlanHandle = Arc<dyn Fft<f64>>;

/// Capability surface a vendor backend must provide.
pub trait TransformBackend {
    /// Plan an unscaled complex line transform of length `n`.
    fn plan_line(&mut self, n: usize, direction: FftDirection) -> PlanHandle;

    /// Scratch length required to execute `handle` in place.
    fn scratch_len(handle: &PlanHandle) -> usize {
        handle.get_inplace_scratch_len()
    }
}

/// rustfft-backed planner. Planning the same length twice returns the same
/// underlying algorithm, so per-box plans over equal extents share work.
pub struct RustFftBackend {
    planner: FftPlanner<f64>,
}

impl RustFftBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Default for RustFftBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformBackend for RustFftBackend {
    fn plan_line(&mut self, n: usize, direction: FftDirection) -> PlanHandle {
        self.planner.plan_fft(n, direction)
    }
}

/// Backend selected for this build.
pub type DefaultBackend = RustFftBackend;
