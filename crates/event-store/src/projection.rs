use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Sequence;

/// Well-known projection status values. The field itself is free-form.
pub mod status {
    pub const ACTIVE: &str = "active";
    pub const PAUSED: &str = "paused";
    pub const FAILED: &str = "failed";
}

/// Progress bookmark of a consumer over the global event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub id: Uuid,

    /// Projection identity; unique across the store.
    pub projection_type: String,

    /// Highest sequence the consumer has fully processed. Never decreases.
    pub last_processed_sequence: Sequence,

    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl Projection {
    /// A fresh bookmark at sequence 0 with status `active`.
    pub fn new(projection_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            projection_type: projection_type.into(),
            last_processed_sequence: Sequence::unassigned(),
            status: status::ACTIVE.to_string(),
            updated_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Moves the bookmark forward and refreshes `updated_at`.
    ///
    /// Positions behind the current bookmark are ignored.
    pub fn advance_to(&mut self, sequence: Sequence) {
        if sequence > self.last_processed_sequence {
            self.last_processed_sequence = sequence;
        }
        self.updated_at = Utc::now().trunc_subsecs(6);
    }

    pub fn is_active(&self) -> bool {
        self.status == status::ACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_projection_starts_at_zero_and_active() {
        let projection = Projection::new("order-summary");
        assert_eq!(projection.last_processed_sequence, Sequence::new(0));
        assert_eq!(projection.status, "active");
        assert!(projection.is_active());
    }

    #[test]
    fn advance_never_moves_backwards() {
        let mut projection = Projection::new("order-summary");
        projection.advance_to(Sequence::new(10));
        projection.advance_to(Sequence::new(4));
        assert_eq!(projection.last_processed_sequence, Sequence::new(10));
    }
}
