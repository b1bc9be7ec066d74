use serde::{Deserialize, Serialize};

use crate::tracking::Timestamp;
use crate::utils::Point;

/// Position sample stamped with the tick it was observed at
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub point: Point,
    pub time: Timestamp,
}

impl TimedPoint {
    pub fn new(x: f32, y: f32, now: Timestamp) -> Self {
        TimedPoint {
            point: Point::new(x, y),
            time: now,
        }
    }
    pub fn set(&mut self, x: f32, y: f32, now: Timestamp) {
        self.point = Point::new(x, y);
        self.time = now;
    }
}
