//! Background traffic for demo runs.
//!
//! [`SimTicker`] periodically nudges every `Float64` scalar process variable
//! of a [`SimContext`], so monitors keep firing without an external client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pvgate_types::{Field, RemoteValue};
use tracing::{debug, warn};

use crate::SimContext;

/// Amplitude of one drift step.
const STEP: f64 = 0.25;
/// Ticks before the drift direction flips.
const HALF_PERIOD: u64 = 8;

/// Handle to the drift thread; stops it on drop.
pub struct SimTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimTicker {
    /// Spawn the drift thread, ticking every `period`.
    pub fn spawn(ctx: Arc<SimContext>, period: Duration) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("pvgate-sim-ticker".to_string())
            .spawn(move || {
                let mut tick: u64 = 0;
                while !flag.load(Ordering::Relaxed) {
                    thread::sleep(period);
                    drift(&ctx, tick);
                    tick = tick.wrapping_add(1);
                }
                debug!(ticks = tick, "sim ticker stopped");
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sim ticker thread panicked");
            }
        }
    }
}

impl Drop for SimTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drift(ctx: &SimContext, tick: u64) {
    let delta = if (tick / HALF_PERIOD) % 2 == 0 { STEP } else { -STEP };
    for name in ctx.names() {
        let Some(Field::Float64(v)) = ctx.current(&name).and_then(|r| r.lookup("value").cloned()) else {
            continue;
        };
        // The record may have been removed since `names()`.
        let _ = ctx.post(&name, RemoteValue::scalar(Field::Float64(v + delta)));
    }
}
