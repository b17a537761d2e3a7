// THEORY:
// The `pipeline` module is the top-level API for the whole filter. A caller hands it
// a `FilterConfig` and a decoded image and gets back the filtered image; everything
// in between (kernel construction, strip planning, the gather protocol) stays hidden
// behind `DistributedFilter`.
//
// A single participant filters the image directly with no transport at all. Anything
// larger launches a `ParticipantGroup`.

use crate::core_modules::error::{FilterError, Result};
use crate::core_modules::kernel::Kernel;
use crate::core_modules::participant::{RunContext, filter_single};
use crate::observer::{NullObserver, RunEvent, RunObserver};
use crate::parallel_pipeline::ParticipantGroup;
use std::sync::Arc;

// Re-export key data structures for the public API.
pub use crate::core_modules::convolution::Narrowing;
pub use crate::core_modules::raster::Raster;
pub use crate::core_modules::strip_planner::{StripAssignment, StripKind, StripPlanner};

/// Configuration for a filtering run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Side length of the high-pass kernel. Must be odd and at least 3.
    pub kernel_size: usize,
    /// Total participants including the coordinator. `1` means no distribution.
    pub worker_count: usize,
    pub narrowing: Narrowing,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kernel_size: 3,
            // One coordinator plus a worker per core.
            worker_count: num_cpus::get() + 1,
            narrowing: Narrowing::default(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(FilterError::InvalidConfig {
                reason: "worker_count must be at least 1".to_string(),
            });
        }
        Kernel::check_size(self.kernel_size)
    }
}

/// The outcome of a successful run.
#[derive(Debug)]
pub struct FilterReport {
    pub output: Raster,
    /// Messages that crossed the transport. Always zero for a single participant.
    pub packets_sent: usize,
}

/// The main entry point for the filter.
pub struct DistributedFilter {
    config: FilterConfig,
    observer: Arc<dyn RunObserver>,
}

impl DistributedFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filters `image` and returns only the output image.
    pub async fn apply(&self, image: Raster) -> Result<Raster> {
        self.run(image).await.map(|report| report.output)
    }

    pub async fn run(&self, image: Raster) -> Result<FilterReport> {
        self.config.validate()?;
        if image.width() == 0 || image.height() == 0 {
            return Err(FilterError::InvalidConfig {
                reason: format!(
                    "cannot filter an empty {}x{} image",
                    image.width(),
                    image.height()
                ),
            });
        }

        self.observer.on_event(&RunEvent::RunStarted {
            worker_count: self.config.worker_count,
            kernel_size: self.config.kernel_size,
            image_height: image.height(),
        });

        let context = RunContext {
            image: Arc::new(image),
            kernel_size: self.config.kernel_size,
            worker_count: self.config.worker_count,
            narrowing: self.config.narrowing,
            observer: Arc::clone(&self.observer),
        };

        let report = if self.config.worker_count == 1 {
            FilterReport {
                output: filter_single(&context).await?,
                packets_sent: 0,
            }
        } else {
            let group = ParticipantGroup::new(context).run().await?;
            FilterReport {
                output: group.output,
                packets_sent: group.packets_sent,
            }
        };

        self.observer.on_event(&RunEvent::RunFinished {
            packets_sent: report.packets_sent,
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::convolution::{convolve, convolve_raster};
    use std::sync::Mutex;

    fn textured(width: usize, height: usize) -> Raster {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x * 31 + y * 17) % 256) as u8);
                data.push(((x * y + 3) % 256) as u8);
                data.push(if (x / 3 + y / 2) % 2 == 0 { 240 } else { 10 });
            }
        }
        Raster::new(width, height, 3, data).unwrap()
    }

    fn config(kernel_size: usize, worker_count: usize) -> FilterConfig {
        FilterConfig {
            kernel_size,
            worker_count,
            narrowing: Narrowing::Wrap,
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RunEvent>>,
    }

    impl RunObserver for Recorder {
        fn on_event(&self, event: &RunEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn distributed_output_matches_whole_image_convolution() {
        for (width, height) in [(13, 10), (8, 1), (5, 23), (16, 3)] {
            let image = textured(width, height);
            for kernel_size in [3, 5, 7] {
                let kernel = Kernel::high_pass(kernel_size).unwrap();
                let expected = convolve_raster(&image, &kernel, Narrowing::Wrap);
                for worker_count in [2, 3, 4, 7, 30] {
                    let filter = DistributedFilter::new(config(kernel_size, worker_count));
                    let output = filter.apply(image.clone()).await.unwrap();
                    assert_eq!(
                        output, expected,
                        "{width}x{height}, kernel {kernel_size}, {worker_count} participants"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn single_participant_sends_nothing_and_matches_distributed_run() {
        let image = textured(11, 9);
        let alone = DistributedFilter::new(config(5, 1)).run(image.clone()).await.unwrap();
        assert_eq!(alone.packets_sent, 0);

        let distributed = DistributedFilter::new(config(5, 4)).run(image).await.unwrap();
        assert_eq!(alone.output, distributed.output);
        assert!(distributed.packets_sent > 0);
    }

    #[test]
    fn strips_planned_independently_recombine_to_the_whole_image() {
        let image = textured(12, 17);
        let kernel = Kernel::high_pass(3).unwrap();
        let worker_count = 6;

        let mut canvas = Raster::blank(12, 17, 3).unwrap();
        for (_, strip) in StripPlanner::receive_schedule(17, worker_count) {
            let part = convolve(image.rows(strip.rows()).unwrap(), &kernel, Narrowing::Saturate);
            canvas.write_rows(strip.start_row, part.as_bytes()).unwrap();
        }
        assert_eq!(canvas, convolve_raster(&image, &kernel, Narrowing::Saturate));
    }

    #[tokio::test]
    async fn invalid_kernel_size_fails_before_any_participant_starts() {
        let recorder = Arc::new(Recorder::default());
        let filter = DistributedFilter::new(config(4, 3)).with_observer(recorder.clone());
        assert_eq!(
            filter.apply(textured(4, 4)).await,
            Err(FilterError::InvalidKernelSize { size: 4 })
        );
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_zero_workers_and_empty_images() {
        assert!(matches!(
            DistributedFilter::new(config(3, 0)).apply(textured(2, 2)).await,
            Err(FilterError::InvalidConfig { .. })
        ));
        assert!(matches!(
            DistributedFilter::new(config(3, 2)).apply(Raster::blank(0, 4, 3).unwrap()).await,
            Err(FilterError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn observer_sees_every_strip_arrive() {
        let recorder = Arc::new(Recorder::default());
        let filter = DistributedFilter::new(config(3, 4)).with_observer(recorder.clone());
        filter.apply(textured(6, 10)).await.unwrap();

        let events = recorder.events.lock().unwrap();
        let received: Vec<(usize, usize)> = events
            .iter()
            .filter_map(|event| match event {
                RunEvent::PartialReceived { rank, start_row, .. } => Some((*rank, *start_row)),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![(1, 0), (2, 3), (3, 6), (1, 9)]);
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(events.last(), Some(RunEvent::RunFinished { packets_sent: 7 })));
    }

    #[test]
    fn validation_checks_the_kernel_size_without_building_a_kernel() {
        for size in 0..12 {
            assert_eq!(
                config(size, 2).validate().is_ok(),
                Kernel::high_pass(size).is_ok(),
                "size {size}"
            );
        }
        assert_eq!(
            config(2, 2).validate(),
            Err(FilterError::InvalidKernelSize { size: 2 })
        );
    }

    #[test]
    fn default_config_reserves_a_coordinator() {
        let config = FilterConfig::default();
        assert_eq!(config.worker_count, num_cpus::get() + 1);
        assert_eq!(config.kernel_size, 3);
        assert!(config.validate().is_ok());
    }
}
