use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::tracking::ObjectId;

/// Relationship between two blobs.
///
/// `a` is the blob that reported the relationship and `b` the one it observed.
/// Equality and hashing ignore that order, so `Pair::new(1, 2) == Pair::new(2, 1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pair {
    pub a: ObjectId,
    pub b: ObjectId,
}

impl Pair {
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        Pair { a, b }
    }
    /// Order-independent key, smaller id first
    pub fn key(&self) -> (ObjectId, ObjectId) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }
    pub fn contains(&self, id: ObjectId) -> bool {
        self.a == id || self.b == id
    }
    /// Returns the counterpart of `id`, if `id` belongs to the pair
    pub fn other(&self, id: ObjectId) -> Option<ObjectId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pair {}

impl Hash for Pair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}
