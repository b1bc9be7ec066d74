//! Tuning constants for blob tracking.
//!
//! Everything here is read once when the registry is built and is not reloaded
//! while frames are processed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tracking::{Timestamp, TrackerError};
use crate::utils::PerspectiveTransform;

/// Capacities of the rolling windows kept per blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Raw and smoothed position samples kept per blob (MAX_HISTORY)
    pub max_history: usize,
    /// Distance samples kept per neighbor relationship (NEIGHBOR_HISTORY)
    pub neighbor_history: usize,
    /// Speed samples averaged into the smoothed speed (VELOCITY_HISTORY)
    pub velocity_history: usize,
    /// Number of most recent transformed raw points averaged into the position
    pub smoothing_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: 100,
            neighbor_history: 10,
            velocity_history: 5,
            smoothing_window: 3,
        }
    }
}

/// Frame bounds and stage area, in stage coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageGeometry {
    pub frame_width: f32,
    pub frame_height: f32,
    /// Radius of the stage disc centred in the frame
    pub stage_radius: f32,
    /// Distance to the frame boundary under which a blob counts as on the edge
    pub edge_margin: f32,
}

impl Default for StageGeometry {
    fn default() -> Self {
        Self {
            frame_width: 640.0,
            frame_height: 480.0,
            stage_radius: 200.0,
            edge_margin: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    /// Smoothed speed under which a blob is frozen
    pub min_vel: f32,
    /// Seconds frozen before the freeze counts as intentional
    pub min_time: Timestamp,
    /// Seconds frozen before the blob is over-frozen
    pub max_time: Timestamp,
    /// Smoothed speed above which a blob disturbs neighbor distances
    pub moving_threshold: f32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            min_vel: 0.5,
            min_time: 2,
            max_time: 20,
            moving_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborConfig {
    /// Distance standard deviation under which a relationship is steady
    pub distance_std_dev_threshold: f32,
    /// Mean distance a steady relationship must keep
    pub min_steady_distance: f32,
    /// Seconds of unbroken steadiness before the reward fires
    pub reward_delay: Timestamp,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            distance_std_dev_threshold: 5.0,
            min_steady_distance: 30.0,
            reward_delay: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub history: HistoryConfig,
    pub stage: StageGeometry,
    pub freeze: FreezeConfig,
    pub neighbor: NeighborConfig,
    /// Seconds without reports before a blob is destroyed
    pub min_lost_time: Timestamp,
    /// Row-major camera-to-stage homography
    pub perspective: [[f32; 3]; 3],
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            stage: StageGeometry::default(),
            freeze: FreezeConfig::default(),
            neighbor: NeighborConfig::default(),
            min_lost_time: 2,
            perspective: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

impl TrackingConfig {
    /// Parses configuration from JSON. Missing fields take their defaults.
    ///
    /// Basic usage:
    ///
    /// ```
    /// use stage_blobs_rs::tracking::TrackingConfig;
    /// let cfg = TrackingConfig::from_json_str(r#"{ "min_lost_time": 5 }"#).unwrap();
    /// assert_eq!(cfg.min_lost_time, 5);
    /// assert_eq!(cfg.history.max_history, 100);
    /// ```
    pub fn from_json_str(s: &str) -> Result<Self, TrackerError> {
        let cfg: TrackingConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrackerError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
    pub fn perspective_transform(&self) -> PerspectiveTransform {
        PerspectiveTransform::from_rows(self.perspective)
    }
    pub fn validate(&self) -> Result<(), TrackerError> {
        let h = &self.history;
        if h.max_history == 0 || h.neighbor_history == 0 || h.velocity_history == 0 {
            return Err(TrackerError::InvalidConfig(
                "history capacities must be positive".to_string(),
            ));
        }
        if h.smoothing_window == 0 || h.smoothing_window > h.max_history {
            return Err(TrackerError::InvalidConfig(format!(
                "smoothing window {} must be within 1..={}",
                h.smoothing_window, h.max_history
            )));
        }
        let s = &self.stage;
        let empty_frame = s.frame_width <= 0.0 || s.frame_height <= 0.0;
        if empty_frame || s.stage_radius < 0.0 || s.edge_margin < 0.0 {
            return Err(TrackerError::InvalidConfig(
                "stage geometry must be non-negative with a non-empty frame".to_string(),
            ));
        }
        let f = &self.freeze;
        if f.min_time < 0 || f.max_time < f.min_time {
            return Err(TrackerError::InvalidConfig(format!(
                "freeze times must satisfy 0 <= min_time ({}) <= max_time ({})",
                f.min_time, f.max_time
            )));
        }
        let n = &self.neighbor;
        if n.distance_std_dev_threshold < 0.0 || n.min_steady_distance < 0.0 || n.reward_delay < 0 {
            return Err(TrackerError::InvalidConfig(
                "neighbor thresholds must be non-negative".to_string(),
            ));
        }
        if self.min_lost_time < 0 {
            return Err(TrackerError::InvalidConfig(
                "min_lost_time must be non-negative".to_string(),
            ));
        }
        if !self.perspective_transform().is_invertible() {
            return Err(TrackerError::InvalidConfig(
                "perspective matrix is singular".to_string(),
            ));
        }
        Ok(())
    }
}
