use std::fmt;

use thiserror::Error;

use crate::tracking::ObjectId;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{0}")]
    NoObject(NoObjectInTracker),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("can't read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("can't parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<NoObjectInTracker> for TrackerError {
    fn from(e: NoObjectInTracker) -> Self {
        TrackerError::NoObject(e)
    }
}

#[derive(Debug)]
pub struct NoObjectInTracker {
    pub id: ObjectId,
}
impl fmt::Display for NoObjectInTracker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NoObjectInTracker: blob {} is not tracked", self.id)
    }
}
