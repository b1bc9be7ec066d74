use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(_x: f32, _y: f32) -> Self {
        Point {
            x: _x,
            y: _y,
        }
    }
    pub fn norm(&self) -> f32 {
        f32::sqrt(self.x * self.x + self.y * self.y)
    }
}

pub fn euclidean_distance(p1: &Point, p2: &Point) -> f32 {
    let x_squared = f32::powi(p1.x - p2.x, 2);
    let y_squared = f32::powi(p1.y - p2.y, 2);
    f32::sqrt(x_squared + y_squared)
}

/// Appends `value` and evicts from the front until `buf` holds at most `capacity` items
pub fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, capacity: usize) {
    buf.push_back(value);
    while buf.len() > capacity {
        buf.pop_front();
    }
}
