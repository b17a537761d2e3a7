// THEORY:
// Every rank in the group is a `Participant`. The role is chosen once, from the rank,
// when the group is launched: rank 0 becomes the `Coordinator`, everyone else a
// `Worker`. After that no shared code ever asks "am I rank 0?" again; each role has
// its own `run`.
//
// Both roles lean on the same stateless collaborators (`Kernel`, the convolution
// engine, `StripPlanner`) and talk only through the `Transport`. The protocol is:
// 1.  The coordinator builds the kernel and broadcasts it, or broadcasts `Abort` if the
//     kernel size is invalid so no worker computes anything.
// 2.  Each worker plans its own strips, convolves them in plan order (regular strip
//     first, then its remainder row) and sends one frame per strip.
// 3.  The coordinator receives in `StripPlanner::receive_schedule` order, which is the
//     same order the workers send in, and stitches every frame into the output.

use crate::core_modules::assembly::OutputAssembly;
use crate::core_modules::convolution::{Narrowing, convolve, convolve_raster};
use crate::core_modules::error::{FilterError, Result};
use crate::core_modules::kernel::Kernel;
use crate::core_modules::partial_result::PartialResult;
use crate::core_modules::raster::Raster;
use crate::core_modules::strip_planner::StripPlanner;
use crate::core_modules::transport::{Packet, ROOT, Transport};
use crate::observer::{RunEvent, RunObserver};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;

/// What a participant hands back once its `run` completes.
#[derive(Debug)]
pub enum ParticipantOutcome {
    /// The coordinator's finished output image.
    Assembled(Raster),
    /// A worker's contribution.
    Contributed { strips_sent: usize },
    /// The coordinator called the run off before any work was done.
    Aborted,
}

/// Everything every rank knows before the run starts.
#[derive(Clone)]
pub struct RunContext {
    /// Each rank's read-only copy of the input image.
    pub image: Arc<Raster>,
    pub kernel_size: usize,
    pub worker_count: usize,
    pub narrowing: Narrowing,
    pub observer: Arc<dyn RunObserver>,
}

pub trait Participant {
    fn rank(&self) -> usize;

    fn run<T: Transport>(
        self,
        transport: T,
    ) -> impl Future<Output = Result<ParticipantOutcome>> + Send;
}

pub struct Coordinator {
    context: RunContext,
}

pub struct Worker {
    rank: usize,
    context: RunContext,
}

/// A participant with its role already decided.
pub enum Role {
    Coordinator(Coordinator),
    Worker(Worker),
}

impl Role {
    pub fn for_rank(rank: usize, context: RunContext) -> Self {
        if rank == ROOT {
            Role::Coordinator(Coordinator::new(context))
        } else {
            Role::Worker(Worker::new(rank, context))
        }
    }
}

impl Participant for Role {
    fn rank(&self) -> usize {
        match self {
            Role::Coordinator(coordinator) => coordinator.rank(),
            Role::Worker(worker) => worker.rank(),
        }
    }

    fn run<T: Transport>(
        self,
        transport: T,
    ) -> impl Future<Output = Result<ParticipantOutcome>> + Send {
        async move {
            match self {
                Role::Coordinator(coordinator) => coordinator.run(transport).await,
                Role::Worker(worker) => worker.run(transport).await,
            }
        }
    }
}

/// Filters the whole image in one go. This is what a lone participant does.
pub async fn filter_single(context: &RunContext) -> Result<Raster> {
    let kernel = Kernel::high_pass(context.kernel_size)?;
    info!("single participant, filtering directly with kernel:\n{kernel}");
    let image = Arc::clone(&context.image);
    let narrowing = context.narrowing;
    tokio::task::spawn_blocking(move || convolve_raster(&image, &kernel, narrowing))
        .await
        .map_err(|err| FilterError::TaskFailed {
            reason: format!("whole-image convolution: {err}"),
        })
}

impl Coordinator {
    pub fn new(context: RunContext) -> Self {
        Self { context }
    }

    async fn gather<T: Transport>(&self, transport: &mut T) -> Result<Raster> {
        let image = &self.context.image;
        let mut assembly = OutputAssembly::new(image.width(), image.height(), image.channels())?;

        let schedule = StripPlanner::receive_schedule(image.height(), self.context.worker_count);
        for (rank, expected) in schedule {
            let frame = match transport.recv_from(rank).await? {
                Packet::Partial(frame) => frame,
                other => {
                    return Err(FilterError::transport(format!(
                        "expected a partial result from rank {rank}, got a {}",
                        other.describe()
                    )));
                }
            };
            let partial = PartialResult::decode(rank, &frame)?;
            if partial.start_row != expected.start_row {
                debug!(
                    "rank {rank} sent row {} where row {} was scheduled",
                    partial.start_row, expected.start_row
                );
            }
            assembly.stitch(rank, &partial)?;
            self.context.observer.on_event(&RunEvent::PartialReceived {
                rank,
                start_row: partial.start_row,
                rows: partial.height,
            });
        }

        assembly.finish()
    }
}

impl Participant for Coordinator {
    fn rank(&self) -> usize {
        ROOT
    }

    fn run<T: Transport>(
        self,
        mut transport: T,
    ) -> impl Future<Output = Result<ParticipantOutcome>> + Send {
        async move {
            if self.context.worker_count <= 1 {
                return filter_single(&self.context).await.map(ParticipantOutcome::Assembled);
            }

            let kernel = match Kernel::high_pass(self.context.kernel_size) {
                Ok(kernel) => kernel,
                Err(err) => {
                    warn!("coordinator aborting run: {err}");
                    transport
                        .broadcast(ROOT, Some(Packet::Abort { reason: err.to_string() }))
                        .await?;
                    return Err(err);
                }
            };
            info!("coordinator built kernel:\n{kernel}");

            transport
                .broadcast(
                    ROOT,
                    Some(Packet::Kernel {
                        size: kernel.size(),
                        weights: kernel.weights().to_vec(),
                    }),
                )
                .await?;
            self.context
                .observer
                .on_event(&RunEvent::KernelBroadcast { size: kernel.size() });

            let output = self.gather(&mut transport).await?;
            info!(
                "coordinator assembled {}x{} output from {} worker(s)",
                output.width(),
                output.height(),
                StripPlanner::participants(output.height(), self.context.worker_count)
            );
            Ok(ParticipantOutcome::Assembled(output))
        }
    }
}

impl Worker {
    pub fn new(rank: usize, context: RunContext) -> Self {
        Self { rank, context }
    }

    async fn receive_kernel<T: Transport>(&self, transport: &mut T) -> Result<Option<Kernel>> {
        match transport.broadcast(ROOT, None).await? {
            Packet::Kernel { size, weights } => Kernel::from_weights(size, weights).map(Some),
            Packet::Abort { reason } => {
                warn!("rank {} stopping, coordinator aborted: {reason}", self.rank);
                Ok(None)
            }
            other => Err(FilterError::transport(format!(
                "rank {} expected a kernel broadcast, got a {}",
                self.rank,
                other.describe()
            ))),
        }
    }
}

impl Participant for Worker {
    fn rank(&self) -> usize {
        self.rank
    }

    fn run<T: Transport>(
        self,
        mut transport: T,
    ) -> impl Future<Output = Result<ParticipantOutcome>> + Send {
        async move {
            let kernel = match self.receive_kernel(&mut transport).await? {
                Some(kernel) => Arc::new(kernel),
                None => return Ok(ParticipantOutcome::Aborted),
            };

            let rank = self.rank;
            let height = self.context.image.height();
            let plan = StripPlanner::plan_for(rank, height, self.context.worker_count);
            if plan.is_empty() {
                debug!("rank {rank} has no rows to filter");
                return Ok(ParticipantOutcome::Contributed { strips_sent: 0 });
            }

            for strip in &plan {
                let strip = *strip;
                let image = Arc::clone(&self.context.image);
                let kernel = Arc::clone(&kernel);
                let narrowing = self.context.narrowing;

                let filtered = tokio::task::spawn_blocking(move || {
                    image
                        .rows(strip.rows())
                        .map(|view| convolve(view, &kernel, narrowing))
                })
                .await
                .map_err(|err| FilterError::TaskFailed {
                    reason: format!("rank {rank} strip at row {}: {err}", strip.start_row),
                })??;

                let frame = PartialResult::from_strip(strip.start_row, filtered).encode()?;
                transport.send(ROOT, Packet::Partial(frame)).await?;
                self.context.observer.on_event(&RunEvent::StripSent {
                    rank,
                    start_row: strip.start_row,
                    rows: strip.row_count,
                });
            }

            debug!("rank {rank} sent {} strip(s)", plan.len());
            Ok(ParticipantOutcome::Contributed {
                strips_sent: plan.len(),
            })
        }
    }
}
