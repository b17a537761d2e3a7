// THEORY:
// `ParticipantGroup` is the launcher for a distributed run. It wires `worker_count`
// endpoints into a `ChannelBus`, decides each endpoint's role from its rank, spawns
// one tokio task per participant and waits for all of them. The coordinator's outcome
// carries the output image; any participant's error fails the whole run. A failing
// participant makes its peers see a hung-up link, so a transport failure is only
// reported when no participant failed for any other reason.

use crate::core_modules::error::{FilterError, Result};
use crate::core_modules::participant::{Participant, ParticipantOutcome, Role, RunContext};
use crate::core_modules::raster::Raster;
use crate::core_modules::transport::ChannelBus;
use futures::future::try_join_all;
use log::debug;

/// The result of a multi-participant run.
#[derive(Debug)]
pub struct GroupReport {
    pub output: Raster,
    pub packets_sent: usize,
}

pub struct ParticipantGroup {
    context: RunContext,
}

impl ParticipantGroup {
    pub fn new(context: RunContext) -> Self {
        Self { context }
    }

    pub async fn run(self) -> Result<GroupReport> {
        let height = self.context.image.height();
        let (endpoints, stats) = ChannelBus::group(self.context.worker_count);

        let handles: Vec<_> = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, endpoint)| {
                let participant = Role::for_rank(rank, self.context.clone());
                tokio::spawn(participant.run(endpoint))
            })
            .collect();

        let outcomes = try_join_all(handles)
            .await
            .map_err(|err| FilterError::TaskFailed {
                reason: format!("participant task: {err}"),
            })?;

        let mut output = None;
        let mut errors = Vec::new();
        for (rank, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(ParticipantOutcome::Assembled(raster)) => output = Some(raster),
                Ok(ParticipantOutcome::Contributed { strips_sent }) => {
                    debug!("rank {rank} finished after sending {strips_sent} strip(s)");
                }
                Ok(ParticipantOutcome::Aborted) => debug!("rank {rank} aborted"),
                Err(err) => {
                    debug!("rank {rank} failed: {err}");
                    errors.push(err);
                }
            }
        }

        if let Some(err) = root_cause(errors) {
            return Err(err);
        }
        let output = output.ok_or(FilterError::IncompleteAssembly { missing_rows: height })?;
        Ok(GroupReport {
            output,
            packets_sent: stats.packets_sent(),
        })
    }
}

/// Picks the error to report from every participant's failure, in rank order.
fn root_cause(errors: Vec<FilterError>) -> Option<FilterError> {
    let position = errors
        .iter()
        .position(|err| !matches!(err, FilterError::TransportFailure { .. }))
        .unwrap_or(0);
    errors.into_iter().nth(position)
}
