//! Structured stage traces.
//!
//! The engine does not log through a facade; it records one trace per
//! transform or transpose stage into a process-wide buffer that callers and
//! tests drain with [`take_stage_traces`]. Each record serializes to a single
//! JSON line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// One executed stage of a forward or backward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTrace {
    pub operation_id: String,
    pub stage: &'static str,
    pub direction: &'static str,
    pub boxes: usize,
    pub points: u64,
    pub timing_ns: u128,
}

impl StageTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        format!(
            "{{\"operation_id\":\"{}\",\"stage\":\"{}\",\"direction\":\"{}\",\"boxes\":{},\"points\":{},\"timing_ns\":{}}}",
            self.operation_id, self.stage, self.direction, self.boxes, self.points, self.timing_ns,
        )
    }
}

static TRACE_LOG: OnceLock<Mutex<Vec<StageTrace>>> = OnceLock::new();
static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn trace_log() -> &'static Mutex<Vec<StageTrace>> {
    TRACE_LOG.get_or_init(|| Mutex::new(Vec::new()))
}

pub(crate) fn next_operation_id() -> String {
    let next = OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("r2c-op-{next:016x}")
}

pub(crate) fn record(trace: StageTrace) {
    if let Ok(mut log) = trace_log().lock() {
        log.push(trace);
    }
}

/// Drain all recorded traces.
#[must_use]
pub fn take_stage_traces() -> Vec<StageTrace> {
    if let Ok(mut log) = trace_log().lock() {
        let mut out = Vec::with_capacity(log.len());
        std::mem::swap(&mut *log, &mut out);
        return out;
    }
    Vec::new()
}
