use crate::error::{RenderError, SceneError};

/// Counters of one rendered frame.
///
/// Returned by [`Renderer::render_frame`](super::Renderer::render_frame) for a
/// single window and by [`RenderContext::tick`](super::RenderContext::tick)
/// summed over every window.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Windows rendered in this frame.
    pub windows: usize,
    /// Scene commands applied before traversal.
    pub commands_applied: usize,
    pub command_errors: Vec<SceneError>,
    pub traversed_items: usize,
    /// Items whose world-space vertices were computed this frame.
    pub processed_items: usize,
    /// Items drawn from vertices cached by an earlier frame.
    pub reused_items: usize,
    /// Buckets produced by batching, drawn or skipped.
    pub buckets: usize,
    pub draw_submissions: usize,
    /// Buckets not drawn because their pipeline is unavailable.
    pub skipped_buckets: usize,
    pub pipeline_hits: u64,
    pub pipeline_misses: u64,
    pub pipeline_failures: u64,
    /// Bucket pool blocks, live or free, after the frame.
    pub pool_capacity: usize,
    pub composited_scenes: usize,
    /// Scenes skipped because their target could not be set up or drawn.
    pub skipped_scenes: usize,
    pub errors: Vec<RenderError>,
}

impl FrameReport {
    /// Adds the counters of `other` into `self`.
    pub fn merge(&mut self, other: FrameReport) {
        self.windows += other.windows;
        self.commands_applied += other.commands_applied;
        self.command_errors.extend(other.command_errors);
        self.traversed_items += other.traversed_items;
        self.processed_items += other.processed_items;
        self.reused_items += other.reused_items;
        self.buckets += other.buckets;
        self.draw_submissions += other.draw_submissions;
        self.skipped_buckets += other.skipped_buckets;
        self.pipeline_hits += other.pipeline_hits;
        self.pipeline_misses += other.pipeline_misses;
        self.pipeline_failures += other.pipeline_failures;
        self.pool_capacity += other.pool_capacity;
        self.composited_scenes += other.composited_scenes;
        self.skipped_scenes += other.skipped_scenes;
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.command_errors.is_empty()
    }
}

#[cfg(feature = "render_metrics")]
pub use tracker::FrameTimeTracker;

#[cfg(feature = "render_metrics")]
mod tracker {
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    const ROLLING_WINDOW_DURATION: Duration = Duration::from_secs(1);
    const MAX_ROLLING_WINDOW_SAMPLE_COUNT: usize = 16_384;

    #[derive(Debug, Clone, Copy)]
    struct FrameSample {
        presented_at: Instant,
        frame_time: Duration,
    }

    /// Cumulative and rolling one-second frame statistics.
    #[derive(Debug)]
    pub struct FrameTimeTracker {
        frame_count: u64,
        total_frame_time: Duration,
        first_frame_started_at: Option<Instant>,
        last_presented_at: Option<Instant>,
        rolling_samples: VecDeque<FrameSample>,
        rolling_total_frame_time: Duration,
    }

    impl Default for FrameTimeTracker {
        fn default() -> Self {
            Self {
                frame_count: 0,
                total_frame_time: Duration::ZERO,
                first_frame_started_at: None,
                last_presented_at: None,
                rolling_samples: VecDeque::new(),
                rolling_total_frame_time: Duration::ZERO,
            }
        }
    }

    impl FrameTimeTracker {
        fn remove_oldest_sample(&mut self) {
            if let Some(oldest) = self.rolling_samples.pop_front() {
                self.rolling_total_frame_time = self
                    .rolling_total_frame_time
                    .saturating_sub(oldest.frame_time);
            }
        }

        fn prune_rolling_window(&mut self, now: Instant) {
            while let Some(oldest) = self.rolling_samples.front() {
                if now.saturating_duration_since(oldest.presented_at) <= ROLLING_WINDOW_DURATION {
                    break;
                }
                self.remove_oldest_sample();
            }
        }

        /// Records a frame that took `frame_time` and finished at `presented_at`.
        pub fn record_frame(&mut self, presented_at: Instant, frame_time: Duration) {
            let started_at = presented_at.checked_sub(frame_time).unwrap_or(presented_at);
            if self.first_frame_started_at.is_none() {
                self.first_frame_started_at = Some(started_at);
            }
            self.last_presented_at = Some(presented_at);
            self.frame_count += 1;
            self.total_frame_time += frame_time;

            if self.rolling_samples.len() == MAX_ROLLING_WINDOW_SAMPLE_COUNT {
                self.remove_oldest_sample();
            }
            self.rolling_samples.push_back(FrameSample {
                presented_at,
                frame_time,
            });
            self.rolling_total_frame_time += frame_time;
            self.prune_rolling_window(presented_at);
        }

        /// Frames per second between the start of the first recorded frame and
        /// the end of the last one.
        pub fn average_frames_per_second(&self) -> f64 {
            let (Some(first), Some(last)) = (self.first_frame_started_at, self.last_presented_at)
            else {
                return 0.0;
            };
            let elapsed = last.saturating_duration_since(first).as_secs_f64();
            if elapsed == 0.0 {
                return 0.0;
            }
            self.frame_count as f64 / elapsed
        }

        pub fn average_frame_time(&self) -> Duration {
            if self.frame_count == 0 {
                return Duration::ZERO;
            }
            Duration::from_secs_f64(self.total_frame_time.as_secs_f64() / self.frame_count as f64)
        }

        pub fn rolling_frames_per_second(&self) -> f64 {
            self.rolling_samples.len() as f64
        }

        pub fn rolling_average_frame_time(&self) -> Duration {
            if self.rolling_samples.is_empty() {
                return Duration::ZERO;
            }
            Duration::from_secs_f64(
                self.rolling_total_frame_time.as_secs_f64() / self.rolling_samples.len() as f64,
            )
        }

        pub fn frame_count(&self) -> u64 {
            self.frame_count
        }

        pub fn reset(&mut self) {
            *self = Self::default();
        }
    }

}
