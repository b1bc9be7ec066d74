use serde::Serialize;
use uuid::Uuid;

use crate::tracking::{ObjectId, Pair};
use crate::utils::Point;

/// Notifications raised while processing a tick.
///
/// Within one tick they are produced in phase order: creation, then
/// position/stage/freeze events, then neighbor events, then lost/terminal events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BlobEvent {
    Created { id: ObjectId, track_id: Uuid },
    UpdatePosition { id: ObjectId, position: Point },
    EnterStage { id: ObjectId },
    LeaveStage { id: ObjectId },
    Freeze { id: ObjectId },
    OverFreeze { id: ObjectId },
    UnFreeze { id: ObjectId },
    Steady { pair: Pair },
    SteadyReward { pair: Pair },
    BreakSteady { pair: Pair },
    Lost { id: ObjectId },
    PrepareToDie { id: ObjectId },
}

impl BlobEvent {
    /// Blob that raised the event. For relationship events it is the observing side.
    pub fn source(&self) -> ObjectId {
        match self {
            BlobEvent::Created { id, .. }
            | BlobEvent::UpdatePosition { id, .. }
            | BlobEvent::EnterStage { id }
            | BlobEvent::LeaveStage { id }
            | BlobEvent::Freeze { id }
            | BlobEvent::OverFreeze { id }
            | BlobEvent::UnFreeze { id }
            | BlobEvent::Lost { id }
            | BlobEvent::PrepareToDie { id } => *id,
            BlobEvent::Steady { pair }
            | BlobEvent::SteadyReward { pair }
            | BlobEvent::BreakSteady { pair } => pair.a,
        }
    }
}

/// Receiver for events raised by blob operations
pub trait EventSink {
    fn emit(&mut self, event: BlobEvent);
}

impl EventSink for Vec<BlobEvent> {
    fn emit(&mut self, event: BlobEvent) {
        self.push(event);
    }
}
