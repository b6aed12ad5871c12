use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::carrier::McNumber;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub String);

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Available,
    Booked,
    Completed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "booked" => Some(Self::Booked),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Status only moves forward: available -> booked -> completed.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Booked) | (Self::Booked, Self::Completed)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadSnapshot {
    pub load_id: LoadId,
    pub origin: String,
    pub destination: String,
    pub pickup_at: DateTime<Utc>,
    pub delivery_at: DateTime<Utc>,
    pub equipment_type: String,
    pub posted_rate: Decimal,
    pub weight_lbs: Option<f64>,
    pub miles: Option<f64>,
    pub notes: Option<String>,
    pub status: LoadStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPreferences {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_types: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked,
    /// The load was not available anymore; exactly one of two concurrent
    /// booking attempts may observe `Booked`.
    Conflict,
}

/// External load catalog: candidate search, point lookup, and atomic booking.
#[async_trait]
pub trait LoadCatalog: Send + Sync {
    /// Candidates ordered by descending posted rate, ties broken by earliest
    /// pickup, capped at `limit`. An empty result is a valid answer.
    async fn find_candidates(
        &self,
        mc: &McNumber,
        preferences: &LoadPreferences,
        limit: u32,
    ) -> Result<Vec<LoadSnapshot>, StoreError>;

    async fn get(&self, id: &LoadId) -> Result<Option<LoadSnapshot>, StoreError>;

    /// Compare-and-set on status; never fails the call for a lost race.
    async fn book(
        &self,
        id: &LoadId,
        mc: &McNumber,
        agreed_rate: Decimal,
    ) -> Result<BookingOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::LoadStatus;

    #[test]
    fn status_progression_is_monotonic() {
        assert!(LoadStatus::Available.can_transition_to(LoadStatus::Booked));
        assert!(LoadStatus::Booked.can_transition_to(LoadStatus::Completed));

        assert!(!LoadStatus::Booked.can_transition_to(LoadStatus::Available));
        assert!(!LoadStatus::Completed.can_transition_to(LoadStatus::Booked));
        assert!(!LoadStatus::Completed.can_transition_to(LoadStatus::Available));
        assert!(!LoadStatus::Available.can_transition_to(LoadStatus::Completed));
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [LoadStatus::Available, LoadStatus::Booked, LoadStatus::Completed] {
            assert_eq!(LoadStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LoadStatus::parse("cancelled"), None);
    }
}
