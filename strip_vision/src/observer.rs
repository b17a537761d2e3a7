// THEORY:
// Timing and progress reporting are not part of the filter. They hang off the run as
// an observer: the pipeline and the participants announce milestones as `RunEvent`s
// and whoever is listening decides what to do with them. Nothing in the convolution
// path holds clocks or counters.

use log::{debug, info};
use std::sync::Mutex;
use std::time::Instant;

/// Milestones announced during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    RunStarted {
        worker_count: usize,
        kernel_size: usize,
        image_height: usize,
    },
    KernelBroadcast {
        size: usize,
    },
    StripSent {
        rank: usize,
        start_row: usize,
        rows: usize,
    },
    PartialReceived {
        rank: usize,
        start_row: usize,
        rows: usize,
    },
    RunFinished {
        packets_sent: usize,
    },
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Ignores everything.
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn on_event(&self, _event: &RunEvent) {}
}

/// Logs milestones and the wall-clock time of the whole run.
#[derive(Default)]
pub struct LogObserver {
    started_at: Mutex<Option<Instant>>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunObserver for LogObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                worker_count,
                kernel_size,
                image_height,
            } => {
                if let Ok(mut started_at) = self.started_at.lock() {
                    *started_at = Some(Instant::now());
                }
                info!(
                    "filtering {image_height} rows with a {kernel_size}x{kernel_size} kernel \
                     across {worker_count} participant(s)"
                );
            }
            RunEvent::KernelBroadcast { size } => debug!("kernel of size {size} broadcast"),
            RunEvent::StripSent {
                rank,
                start_row,
                rows,
            } => debug!("rank {rank} sent rows {start_row}..{}", start_row + rows),
            RunEvent::PartialReceived {
                rank,
                start_row,
                rows,
            } => debug!("received rows {start_row}..{} from rank {rank}", start_row + rows),
            RunEvent::RunFinished { packets_sent } => {
                let elapsed = self
                    .started_at
                    .lock()
                    .ok()
                    .and_then(|started_at| (*started_at).map(|t| t.elapsed()));
                match elapsed {
                    Some(elapsed) => info!(
                        "run finished in {} ms ({packets_sent} packet(s) exchanged)",
                        elapsed.as_millis()
                    ),
                    None => info!("run finished ({packets_sent} packet(s) exchanged)"),
                }
            }
        }
    }
}
