use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};
use uuid::Uuid;

use crate::tracking::{
    BlobEvent, EventSink, FreezeConfig, HistoryConfig, Neighbor, NeighborConfig, NeighborSnapshot,
    ObjectId, Pair, StageGeometry, TimedPoint, Timestamp,
};
use crate::utils::{euclidean_distance, push_bounded, PerspectiveTransform, Point};

/// Stationary classification of a blob, in escalating order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    Moving,
    Frozen,
    ProperlyFrozen,
    OverFrozen,
}

/// Tracking state of a single object on stage
#[derive(Debug, Clone)]
pub struct Blob {
    id: ObjectId,
    track_id: Uuid,
    raw_position: Point,
    position: Point,
    velocity: Point,
    vel: f32,
    velocity_history: VecDeque<f32>,
    size: f32,
    age: Timestamp,
    born: Timestamp,
    last_seen: Timestamp,
    lifetime: u64,
    max_lifetime: u64,
    seen_streak: u64,
    lost_duration: Timestamp,
    lost: bool,
    dying: bool,
    updated: bool,
    on_stage: bool,
    on_edge: bool,
    counted: bool,
    moving_mean: bool,
    frozen: bool,
    proper_freeze: bool,
    over_frozen: bool,
    frozen_start: Timestamp,
    frozen_timer: Timestamp,
    raw_history: VecDeque<TimedPoint>,
    history: VecDeque<TimedPoint>,
    neighbors: BTreeMap<ObjectId, Neighbor>,
    max_history: usize,
    neighbor_history: usize,
    velocity_capacity: usize,
}

impl Blob {
    /// Creates blob for a previously unseen id and announces it with `Created`
    pub fn new(
        id: ObjectId,
        now: Timestamp,
        cfg: &HistoryConfig,
        sink: &mut impl EventSink,
    ) -> Self {
        let blob = Blob {
            id,
            track_id: Uuid::new_v4(),
            raw_position: Point::default(),
            position: Point::default(),
            velocity: Point::default(),
            vel: 0.0,
            velocity_history: VecDeque::with_capacity(cfg.velocity_history),
            size: 0.0,
            age: 0,
            born: now,
            last_seen: now,
            lifetime: 0,
            max_lifetime: 0,
            seen_streak: 0,
            lost_duration: 0,
            lost: false,
            dying: false,
            updated: false,
            on_stage: false,
            on_edge: false,
            counted: false,
            moving_mean: false,
            frozen: false,
            proper_freeze: false,
            over_frozen: false,
            frozen_start: 0,
            frozen_timer: 0,
            raw_history: VecDeque::with_capacity(cfg.max_history),
            history: VecDeque::with_capacity(cfg.max_history),
            neighbors: BTreeMap::new(),
            max_history: cfg.max_history,
            neighbor_history: cfg.neighbor_history,
            velocity_capacity: cfg.velocity_history,
        };
        debug!(id, track_id = %blob.track_id, "blob created");
        sink.emit(BlobEvent::Created {
            id,
            track_id: blob.track_id,
        });
        blob
    }
    pub fn get_id(&self) -> ObjectId {
        self.id
    }
    pub fn get_track_id(&self) -> Uuid {
        self.track_id
    }
    pub fn get_raw_position(&self) -> Point {
        self.raw_position
    }
    pub fn get_position(&self) -> Point {
        self.position
    }
    pub fn get_velocity(&self) -> Point {
        self.velocity
    }
    /// Smoothed speed, mean of the recent speed samples
    pub fn get_speed(&self) -> f32 {
        self.vel
    }
    pub fn get_size(&self) -> f32 {
        self.size
    }
    pub fn set_size(&mut self, size: f32) {
        self.size = size
    }
    pub fn get_age(&self) -> Timestamp {
        self.age
    }
    pub fn get_lifetime(&self) -> u64 {
        self.lifetime
    }
    /// Longest run of consecutive ticks with a report
    pub fn get_max_lifetime(&self) -> u64 {
        self.max_lifetime
    }
    pub fn get_lost_duration(&self) -> Timestamp {
        self.lost_duration
    }
    pub fn is_lost(&self) -> bool {
        self.lost
    }
    pub fn is_updated(&self) -> bool {
        self.updated
    }
    /// False once `PrepareToDie` has been raised
    pub fn is_alive(&self) -> bool {
        !self.dying
    }
    pub fn is_on_stage(&self) -> bool {
        self.on_stage
    }
    pub fn is_on_edge(&self) -> bool {
        self.on_edge
    }
    pub fn is_counted(&self) -> bool {
        self.counted
    }
    pub fn is_moving_mean(&self) -> bool {
        self.moving_mean
    }
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
    pub fn is_proper_freeze(&self) -> bool {
        self.proper_freeze
    }
    pub fn is_over_frozen(&self) -> bool {
        self.over_frozen
    }
    pub fn get_frozen_timer(&self) -> Timestamp {
        self.frozen_timer
    }
    pub fn freeze_state(&self) -> FreezeState {
        if !self.frozen {
            FreezeState::Moving
        } else if self.over_frozen {
            FreezeState::OverFrozen
        } else if self.proper_freeze {
            FreezeState::ProperlyFrozen
        } else {
            FreezeState::Frozen
        }
    }
    pub fn get_raw_history(&self) -> &VecDeque<TimedPoint> {
        &self.raw_history
    }
    pub fn get_history(&self) -> &VecDeque<TimedPoint> {
        &self.history
    }
    pub fn get_velocity_history(&self) -> &VecDeque<f32> {
        &self.velocity_history
    }
    pub fn get_neighbors(&self) -> &BTreeMap<ObjectId, Neighbor> {
        &self.neighbors
    }
    pub fn get_neighbor(&self, other: ObjectId) -> Option<&Neighbor> {
        self.neighbors.get(&other)
    }
    /// What other blobs see of this one during neighbor analysis
    pub fn snapshot(&self) -> NeighborSnapshot {
        NeighborSnapshot {
            position: self.position,
            moving_mean: self.moving_mean,
            on_stage: self.on_stage,
        }
    }

    pub fn set_raw_position(&mut self, x: f32, y: f32, now: Timestamp) {
        self.raw_position = Point::new(x, y);
        push_bounded(&mut self.raw_history, TimedPoint::new(x, y, now), self.max_history);
        self.updated = true;
    }
    /// Turns recent raw samples into the smoothed stage position.
    ///
    /// The last `smoothing_window` raw points are projected onto the stage and
    /// averaged. A short history is averaged as is.
    pub fn process_raw_position(
        &mut self,
        stage: &StageGeometry,
        transform: &PerspectiveTransform,
        smoothing_window: usize,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) {
        let window = usize::min(smoothing_window.max(1), self.raw_history.len());
        if window == 0 {
            return;
        }
        let (sum_x, sum_y) = self
            .raw_history
            .iter()
            .rev()
            .take(window)
            .map(|sample| transform.apply(&sample.point))
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        self.position = Point::new(sum_x / window as f32, sum_y / window as f32);
        push_bounded(
            &mut self.history,
            TimedPoint::new(self.position.x, self.position.y, now),
            self.max_history,
        );
        sink.emit(BlobEvent::UpdatePosition {
            id: self.id,
            position: self.position,
        });

        let center = Point::new(stage.frame_width * 0.5, stage.frame_height * 0.5);
        let on_stage = euclidean_distance(&self.position, &center) <= stage.stage_radius;
        self.on_edge = self.position.x < stage.edge_margin
            || self.position.y < stage.edge_margin
            || self.position.x > stage.frame_width - stage.edge_margin
            || self.position.y > stage.frame_height - stage.edge_margin;
        if on_stage != self.on_stage {
            self.on_stage = on_stage;
            if on_stage {
                self.counted = true;
                sink.emit(BlobEvent::EnterStage { id: self.id });
            } else {
                sink.emit(BlobEvent::LeaveStage { id: self.id });
            }
        }
    }
    /// Movement between the two most recent smoothed positions
    pub fn displacement(&self) -> Point {
        let n = self.history.len();
        if n < 2 {
            return Point::default();
        }
        let last = self.history[n - 1].point;
        let prev = self.history[n - 2].point;
        Point::new(last.x - prev.x, last.y - prev.y)
    }
    pub fn set_velocity(&mut self, dx: f32, dy: f32) {
        self.velocity = Point::new(dx, dy);
        push_bounded(&mut self.velocity_history, self.velocity.norm(), self.velocity_capacity);
        let sum: f32 = self.velocity_history.iter().sum();
        self.vel = sum / self.velocity_history.len() as f32;
    }
    /// Freeze state machine, run once per tick after the velocity is known
    pub fn analyze(&mut self, cfg: &FreezeConfig, now: Timestamp, sink: &mut impl EventSink) {
        self.moving_mean = self.vel > cfg.moving_threshold;
        if self.vel < cfg.min_vel {
            if !self.frozen {
                self.frozen = true;
                self.frozen_start = now;
                debug!(id = self.id, vel = self.vel, "blob froze");
                sink.emit(BlobEvent::Freeze { id: self.id });
            }
            self.frozen_timer = now - self.frozen_start;
            if self.frozen_timer >= cfg.min_time && !self.proper_freeze {
                self.proper_freeze = true;
            }
            if self.frozen_timer >= cfg.max_time && !self.over_frozen {
                self.over_frozen = true;
                info!(id = self.id, timer = self.frozen_timer, "blob over-frozen");
                sink.emit(BlobEvent::OverFreeze { id: self.id });
            }
        } else if self.frozen {
            self.frozen = false;
            self.proper_freeze = false;
            self.over_frozen = false;
            self.frozen_timer = 0;
            debug!(id = self.id, vel = self.vel, "blob unfroze");
            sink.emit(BlobEvent::UnFreeze { id: self.id });
        }
    }
    /// Updates every relationship listed in `snapshot`.
    ///
    /// Neighbors missing from the snapshot stay in the map with `updated == false`
    /// until the owner removes them with [`Blob::remove_neighbor`].
    pub fn analyze_neighbors(
        &mut self,
        snapshot: &BTreeMap<ObjectId, NeighborSnapshot>,
        cfg: &NeighborConfig,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) {
        for neighbor in self.neighbors.values_mut() {
            neighbor.mark_stale();
        }
        let (id, position) = (self.id, self.position);
        let (moving, on_stage) = (self.moving_mean, self.on_stage);
        let capacity = self.neighbor_history;
        for (other_id, other) in snapshot.iter() {
            if *other_id == id {
                continue;
            }
            let neighbor = self
                .neighbors
                .entry(*other_id)
                .or_insert_with(|| Neighbor::new(*other_id, capacity));
            neighbor.observe(euclidean_distance(&position, &other.position), other);
            neighbor.analyze(id, moving, on_stage, cfg, now, sink);
        }
    }
    pub fn stale_neighbors(&self) -> Vec<ObjectId> {
        self.neighbors
            .values()
            .filter(|n| !n.is_updated())
            .map(|n| n.get_other_id())
            .collect()
    }
    /// Drops relationship with `other`, breaking it first if it was steady
    pub fn remove_neighbor(
        &mut self,
        other: ObjectId,
        sink: &mut impl EventSink,
    ) -> Option<Neighbor> {
        let neighbor = self.neighbors.remove(&other)?;
        if neighbor.is_steady() {
            sink.emit(BlobEvent::BreakSteady {
                pair: Pair::new(self.id, other),
            });
        }
        Some(neighbor)
    }
    /// End-of-tick bookkeeping: lifetime, loss detection and termination
    pub fn update(&mut self, min_lost_time: Timestamp, now: Timestamp, sink: &mut impl EventSink) {
        self.lifetime += 1;
        self.age = now - self.born;
        if self.updated {
            if self.lost {
                debug!(id = self.id, after = self.lost_duration, "blob recovered");
                self.lost = false;
            }
            self.last_seen = now;
            self.lost_duration = 0;
            self.seen_streak += 1;
            self.max_lifetime = u64::max(self.max_lifetime, self.seen_streak);
        } else {
            if !self.lost {
                self.lost = true;
                sink.emit(BlobEvent::Lost { id: self.id });
            }
            self.seen_streak = 0;
            self.lost_duration = now - self.last_seen;
            if self.lost_duration >= min_lost_time && !self.dying {
                self.dying = true;
                debug!(id = self.id, lost_duration = self.lost_duration, "blob prepares to die");
                sink.emit(BlobEvent::PrepareToDie { id: self.id });
            }
        }
        self.updated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn history_cfg() -> HistoryConfig {
        HistoryConfig {
            max_history: 4,
            neighbor_history: 3,
            velocity_history: 2,
            smoothing_window: 3,
        }
    }

    fn stage() -> StageGeometry {
        StageGeometry {
            frame_width: 100.0,
            frame_height: 100.0,
            stage_radius: 30.0,
            edge_margin: 5.0,
        }
    }

    fn freeze_cfg() -> FreezeConfig {
        FreezeConfig {
            min_vel: 0.1,
            min_time: 2,
            max_time: 4,
            moving_threshold: 1.0,
        }
    }

    fn feed(blob: &mut Blob, x: f32, y: f32, now: Timestamp, events: &mut Vec<BlobEvent>) {
        blob.set_raw_position(x, y, now);
        blob.process_raw_position(&stage(), &PerspectiveTransform::identity(), 3, now, events);
        let d = blob.displacement();
        blob.set_velocity(d.x, d.y);
        blob.analyze(&freeze_cfg(), now, events);
    }

    #[test]
    fn test_create_emits_once() {
        let mut events: Vec<BlobEvent> = vec![];
        let blob = Blob::new(4, 0, &history_cfg(), &mut events);
        assert_eq!(
            events,
            vec![BlobEvent::Created {
                id: 4,
                track_id: blob.get_track_id()
            }]
        );
    }

    #[test]
    fn test_bounded_history() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        for i in 0..10 {
            blob.set_raw_position(i as f32, 0.0, i);
        }
        let xs: Vec<f32> = blob.get_raw_history().iter().map(|p| p.point.x).collect();
        assert_eq!(xs, vec![6.0, 7.0, 8.0, 9.0]);
        assert!(blob.is_updated());
    }

    #[test]
    fn test_smoothing_short_history_and_convergence() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        feed(&mut blob, 60.0, 30.0, 0, &mut events);
        assert_eq!(blob.get_position(), Point::new(60.0, 30.0));
        for now in 1..4 {
            feed(&mut blob, 30.0, 60.0, now, &mut events);
        }
        assert_relative_eq!(blob.get_position().x, 30.0);
        assert_relative_eq!(blob.get_position().y, 60.0);
    }

    #[test]
    fn test_stage_transitions() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        blob.set_raw_position(50.0, 50.0, 0);
        blob.process_raw_position(&stage(), &PerspectiveTransform::identity(), 1, 0, &mut events);
        assert!(blob.is_on_stage());
        assert!(blob.is_counted());
        assert!(!blob.is_on_edge());
        blob.set_raw_position(98.0, 50.0, 1);
        blob.process_raw_position(&stage(), &PerspectiveTransform::identity(), 1, 1, &mut events);
        assert!(!blob.is_on_stage());
        assert!(blob.is_on_edge());
        assert!(blob.is_counted());
        let stage_events: Vec<&BlobEvent> = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::EnterStage { .. } | BlobEvent::LeaveStage { .. }))
            .collect();
        assert_eq!(
            stage_events,
            vec![&BlobEvent::EnterStage { id: 1 }, &BlobEvent::LeaveStage { id: 1 }]
        );
    }

    #[test]
    fn test_velocity_is_window_mean() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        blob.set_velocity(3.0, 4.0);
        assert_relative_eq!(blob.get_speed(), 5.0);
        blob.set_velocity(0.0, 0.0);
        assert_relative_eq!(blob.get_speed(), 2.5);
        blob.set_velocity(0.0, 1.0);
        assert_relative_eq!(blob.get_speed(), 0.5);
        assert_eq!(blob.get_velocity(), Point::new(0.0, 1.0));
    }

    #[test]
    fn test_freeze_hysteresis() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        for now in 0..5 {
            blob.set_velocity(0.0, 0.0);
            blob.analyze(&freeze_cfg(), now, &mut events);
            match now {
                0 | 1 => assert_eq!(blob.freeze_state(), FreezeState::Frozen),
                2 | 3 => assert_eq!(blob.freeze_state(), FreezeState::ProperlyFrozen),
                _ => assert_eq!(blob.freeze_state(), FreezeState::OverFrozen),
            }
        }
        blob.set_velocity(10.0, 0.0);
        blob.analyze(&freeze_cfg(), 5, &mut events);
        assert_eq!(blob.freeze_state(), FreezeState::Moving);
        assert!(!blob.is_proper_freeze());
        assert!(!blob.is_over_frozen());
        assert_eq!(blob.get_frozen_timer(), 0);
        assert!(blob.is_moving_mean());

        let freezes = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::Freeze { .. }))
            .count();
        let over = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::OverFreeze { .. }))
            .count();
        let unfreezes = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::UnFreeze { .. }))
            .count();
        assert_eq!((freezes, over, unfreezes), (1, 1, 1));
    }

    #[test]
    fn test_neighbors_go_stale() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        let snap = NeighborSnapshot {
            position: Point::new(3.0, 4.0),
            moving_mean: false,
            on_stage: true,
        };
        let mut snapshot = BTreeMap::new();
        snapshot.insert(1, blob.snapshot());
        snapshot.insert(2, snap);
        snapshot.insert(3, snap);
        blob.analyze_neighbors(&snapshot, &NeighborConfig::default(), 0, &mut events);
        assert_eq!(blob.get_neighbors().len(), 2);
        let neighbor = blob.get_neighbor(2).unwrap();
        assert_relative_eq!(neighbor.get_mean().unwrap(), 5.0);

        snapshot.remove(&3);
        blob.analyze_neighbors(&snapshot, &NeighborConfig::default(), 1, &mut events);
        assert_eq!(blob.stale_neighbors(), vec![3]);
        assert_eq!(blob.get_neighbor(3).unwrap().get_distances().len(), 1);
        assert!(blob.remove_neighbor(3, &mut events).is_some());
        assert!(blob.get_neighbor(3).is_none());
    }

    #[test]
    fn test_lifecycle_termination() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        blob.set_raw_position(1.0, 1.0, 0);
        blob.update(3, 0, &mut events);
        assert!(!blob.is_lost());
        for now in 1..10 {
            blob.update(3, now, &mut events);
        }
        assert!(blob.is_lost());
        assert!(!blob.is_alive());
        assert_eq!(blob.get_lifetime(), 10);
        assert_eq!(blob.get_max_lifetime(), 1);
        let lost = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::Lost { .. }))
            .count();
        let dying = events
            .iter()
            .filter(|e| matches!(e, BlobEvent::PrepareToDie { .. }))
            .count();
        assert_eq!(lost, 1);
        assert_eq!(dying, 1);
    }

    #[test]
    fn test_recovery_resets_loss() {
        let mut events: Vec<BlobEvent> = vec![];
        let mut blob = Blob::new(1, 0, &history_cfg(), &mut events);
        blob.set_raw_position(1.0, 1.0, 0);
        blob.update(5, 0, &mut events);
        blob.update(5, 1, &mut events);
        assert!(blob.is_lost());
        assert_eq!(blob.get_lost_duration(), 1);
        blob.set_raw_position(1.0, 1.0, 2);
        blob.update(5, 2, &mut events);
        assert!(!blob.is_lost());
        assert_eq!(blob.get_lost_duration(), 0);
        assert!(blob.is_alive());
        assert!(!blob.is_updated());
    }
}
