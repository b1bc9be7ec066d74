use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tracking::tracking_errors::{NoObjectInTracker, TrackerError};
use crate::tracking::{Blob, BlobEvent, NeighborSnapshot, ObjectId, Pair, Timestamp, TrackingConfig};
use crate::utils::PerspectiveTransform;

/// One position report for one object, as delivered by the upstream detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReport {
    pub id: ObjectId,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub size: f32,
}

impl RawReport {
    pub fn new(id: ObjectId, x: f32, y: f32) -> Self {
        RawReport { id, x, y, size: 0.0 }
    }
}

type Subscriber = Box<dyn FnMut(&BlobEvent)>;

/// Owns every tracked blob and drives them through a tick.
///
/// Blobs are created on the first report for an id and destroyed after they
/// raised `PrepareToDie`. Subscribers are called synchronously, in the order
/// events were raised, before `process_frame` returns. They get no access to
/// the registry itself.
pub struct TrackingRegistry {
    config: TrackingConfig,
    transform: PerspectiveTransform,
    // Ordered storage keeps event order deterministic
    objects: BTreeMap<ObjectId, Blob>,
    subscribers: Vec<Subscriber>,
    visitors_counted: usize,
}

impl TrackingRegistry {
    /// Creates registry from a validated configuration
    ///
    /// Basic usage:
    ///
    /// ```
    /// use stage_blobs_rs::tracking::{TrackingConfig, TrackingRegistry, RawReport};
    /// let mut registry = TrackingRegistry::new(TrackingConfig::default()).unwrap();
    /// let events = registry.process_frame(&[RawReport::new(1, 320.0, 240.0)], 0);
    /// assert!(!events.is_empty());
    /// assert_eq!(registry.len(), 1);
    /// ```
    pub fn new(config: TrackingConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }
    fn with_config(config: TrackingConfig) -> Self {
        TrackingRegistry {
            transform: config.perspective_transform(),
            config,
            objects: BTreeMap::new(),
            subscribers: Vec::new(),
            visitors_counted: 0,
        }
    }
    pub fn get_config(&self) -> &TrackingConfig {
        &self.config
    }
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&BlobEvent) + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }
    pub fn get_blob(&self, id: ObjectId) -> Result<&Blob, TrackerError> {
        self.objects
            .get(&id)
            .ok_or_else(|| TrackerError::from(NoObjectInTracker { id }))
    }
    pub fn blobs(&self) -> impl Iterator<Item = &Blob> {
        self.objects.values()
    }
    pub fn len(&self) -> usize {
        self.objects.len()
    }
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
    pub fn on_stage_count(&self) -> usize {
        self.objects
            .values()
            .filter(|b| b.is_on_stage() && !b.is_lost())
            .count()
    }
    /// Number of blobs that ever entered the stage
    pub fn visitors_counted(&self) -> usize {
        self.visitors_counted
    }
    /// Relationships currently steady from at least one side, each reported once.
    /// Relationships with a lost blob on either side are left out.
    pub fn steady_pairs(&self) -> Vec<Pair> {
        self.objects
            .values()
            .filter(|blob| !blob.is_lost())
            .flat_map(|blob| {
                blob.get_neighbors()
                    .values()
                    .filter(|n| n.is_steady() && n.is_updated())
                    .map(move |n| Pair::new(blob.get_id(), n.get_other_id()))
            })
            .unique()
            .collect()
    }
    /// Same as [`TrackingRegistry::process_frame`], stamped with the wall clock
    pub fn process_frame_now(&mut self, reports: &[RawReport]) -> Vec<BlobEvent> {
        self.process_frame(reports, chrono::Utc::now().timestamp())
    }
    /// Runs one tick over all blobs and returns the raised events in order
    pub fn process_frame(&mut self, reports: &[RawReport], now: Timestamp) -> Vec<BlobEvent> {
        let mut events: Vec<BlobEvent> = Vec::new();

        // Ingest
        let history_cfg = &self.config.history;
        for report in reports {
            let blob = self
                .objects
                .entry(report.id)
                .or_insert_with(|| Blob::new(report.id, now, history_cfg, &mut events));
            if blob.is_updated() {
                warn!(id = report.id, "duplicate report in one frame");
            }
            blob.set_raw_position(report.x, report.y, now);
            blob.set_size(report.size);
        }

        // Smoothing, velocity and stage membership
        for blob in self.objects.values_mut().filter(|b| b.is_updated()) {
            let was_counted = blob.is_counted();
            blob.process_raw_position(
                &self.config.stage,
                &self.transform,
                self.config.history.smoothing_window,
                now,
                &mut events,
            );
            let step = blob.displacement();
            blob.set_velocity(step.x, step.y);
            if !was_counted && blob.is_counted() {
                self.visitors_counted += 1;
            }
        }

        // Freeze
        for blob in self.objects.values_mut().filter(|b| b.is_updated()) {
            blob.analyze(&self.config.freeze, now, &mut events);
        }

        // Neighbors. Blobs not reporting this tick are left out of the snapshot
        let snapshot: BTreeMap<ObjectId, NeighborSnapshot> = self
            .objects
            .iter()
            .filter(|(_, b)| b.is_updated())
            .map(|(id, b)| (*id, b.snapshot()))
            .collect();
        for blob in self.objects.values_mut().filter(|b| b.is_updated()) {
            blob.analyze_neighbors(&snapshot, &self.config.neighbor, now, &mut events);
        }

        // Lifecycle. Its events go out after the relationship breaks below
        let mut lifecycle: Vec<BlobEvent> = Vec::new();
        for blob in self.objects.values_mut() {
            blob.update(self.config.min_lost_time, now, &mut lifecycle);
        }
        let dead: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|b| !b.is_alive())
            .map(|b| b.get_id())
            .collect();

        // Break every relationship touching a dying blob, in both directions
        for id in dead.iter() {
            if let Some(blob) = self.objects.get_mut(id) {
                let others: Vec<ObjectId> = blob.get_neighbors().keys().copied().collect();
                for other in others {
                    blob.remove_neighbor(other, &mut events);
                }
            }
        }
        for blob in self.objects.values_mut() {
            for id in dead.iter() {
                blob.remove_neighbor(*id, &mut events);
            }
        }
        events.extend(lifecycle);

        // Clean up existing data
        for id in dead.iter() {
            if let Some(blob) = self.objects.remove(id) {
                debug!(id, track_id = %blob.get_track_id(), age = blob.get_age(), "blob removed");
            }
        }

        for event in events.iter() {
            for subscriber in self.subscribers.iter_mut() {
                subscriber(event);
            }
        }
        events
    }
}

impl Default for TrackingRegistry {
    fn default() -> Self {
        TrackingRegistry::with_config(TrackingConfig::default())
    }
}
