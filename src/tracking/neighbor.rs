use std::collections::VecDeque;

use itertools::Itertools;
use tracing::{debug, info};

use crate::tracking::{BlobEvent, EventSink, NeighborConfig, ObjectId, Pair, Timestamp};
use crate::utils::{push_bounded, Point};

/// What one blob needs to know about another blob during neighbor analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborSnapshot {
    pub position: Point,
    pub moving_mean: bool,
    pub on_stage: bool,
}

/// One blob's view of its distance to another blob over time.
///
/// Statistics are population statistics over the samples currently in the
/// window. They return `None` while the window is empty.
#[derive(Debug, Clone)]
pub struct Neighbor {
    other_id: ObjectId,
    updated: bool,
    distance_window: VecDeque<f32>,
    capacity: usize,
    steady: bool,
    steady_start: Timestamp,
    steady_timer: Timestamp,
    steady_rewarded: bool,
    moving_mean: bool,
    on_stage: bool,
}

impl Neighbor {
    pub fn new(other_id: ObjectId, capacity: usize) -> Self {
        Neighbor {
            other_id,
            updated: false,
            distance_window: VecDeque::with_capacity(capacity),
            capacity,
            steady: false,
            steady_start: 0,
            steady_timer: 0,
            steady_rewarded: false,
            moving_mean: false,
            on_stage: false,
        }
    }
    pub fn get_other_id(&self) -> ObjectId {
        self.other_id
    }
    pub fn is_updated(&self) -> bool {
        self.updated
    }
    pub fn is_steady(&self) -> bool {
        self.steady
    }
    pub fn is_rewarded(&self) -> bool {
        self.steady_rewarded
    }
    pub fn get_steady_timer(&self) -> Timestamp {
        self.steady_timer
    }
    pub fn is_moving_mean(&self) -> bool {
        self.moving_mean
    }
    pub fn is_on_stage(&self) -> bool {
        self.on_stage
    }
    pub fn get_distances(&self) -> &VecDeque<f32> {
        &self.distance_window
    }
    pub fn is_window_full(&self) -> bool {
        self.distance_window.len() >= self.capacity
    }
    pub(crate) fn mark_stale(&mut self) {
        self.updated = false
    }
    /// Records this cycle's distance and mirrors the other blob's flags
    pub fn observe(&mut self, distance: f32, snapshot: &NeighborSnapshot) {
        push_bounded(&mut self.distance_window, distance, self.capacity);
        self.moving_mean = snapshot.moving_mean;
        self.on_stage = snapshot.on_stage;
        self.updated = true;
    }
    pub fn get_mean(&self) -> Option<f32> {
        if self.distance_window.is_empty() {
            return None;
        }
        let sum: f32 = self.distance_window.iter().sum();
        Some(sum / self.distance_window.len() as f32)
    }
    pub fn get_variance(&self) -> Option<f32> {
        let mean = self.get_mean()?;
        let sum_sq: f32 = self
            .distance_window
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum();
        Some(sum_sq / self.distance_window.len() as f32)
    }
    pub fn get_std_dev(&self) -> Option<f32> {
        self.get_variance().map(f32::sqrt)
    }
    pub fn get_median(&self) -> Option<f32> {
        let sorted: Vec<f32> = self
            .distance_window
            .iter()
            .copied()
            .sorted_by(|a, b| a.total_cmp(b))
            .collect();
        let n = sorted.len();
        match n {
            0 => None,
            _ if n % 2 == 0 => Some((sorted[n / 2 - 1] + sorted[n / 2]) * 0.5),
            _ => Some(sorted[n / 2]),
        }
    }
    /// Runs the steadiness state machine for the relationship `owner -> other`.
    ///
    /// A relationship only becomes steady with a full window while neither
    /// side is moving and both are on stage. Once steady it is broken only by
    /// the distance statistics.
    pub fn analyze(
        &mut self,
        owner: ObjectId,
        owner_moving: bool,
        owner_on_stage: bool,
        cfg: &NeighborConfig,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) {
        let (mean, std_dev) = match (self.get_mean(), self.get_std_dev()) {
            (Some(mean), Some(std_dev)) => (mean, std_dev),
            _ => return,
        };
        let pair = Pair::new(owner, self.other_id);
        let stable = std_dev < cfg.distance_std_dev_threshold && mean >= cfg.min_steady_distance;

        if !self.steady {
            let quiet = !owner_moving && !self.moving_mean && owner_on_stage && self.on_stage;
            if stable && quiet && self.is_window_full() {
                self.steady = true;
                self.steady_start = now;
                self.steady_timer = 0;
                info!(%pair, mean, std_dev, "steady distance");
                sink.emit(BlobEvent::Steady { pair });
            }
        } else if !stable {
            self.steady = false;
            self.steady_rewarded = false;
            self.steady_timer = 0;
            debug!(%pair, mean, std_dev, "steady distance broken");
            sink.emit(BlobEvent::BreakSteady { pair });
        }

        if self.steady {
            self.steady_timer = now - self.steady_start;
            if self.steady_timer > cfg.reward_delay && !self.steady_rewarded {
                self.steady_rewarded = true;
                info!(%pair, timer = self.steady_timer, "steady distance rewarded");
                sink.emit(BlobEvent::SteadyReward { pair });
            }
        }
    }
}
