use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LookupFailure;

pub const OPERATING_STATUS_ACTIVE: &str = "ACTIVE";

/// Motor-carrier number, stored as bare digits. Accepts the common
/// `MC-123456` / `MC 123456` spellings carriers read off their authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct McNumber(pub String);

impl McNumber {
    pub fn new(raw: &str) -> Self {
        let cleaned = raw
            .trim()
            .trim_start_matches("MC")
            .trim_start_matches("mc")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>();
        Self(cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for McNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MC-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierInfo {
    pub mc_number: McNumber,
    pub legal_name: String,
    pub dba_name: Option<String>,
    pub entity_type: String,
    pub operating_status: String,
    pub physical_address: Option<String>,
    pub phone: Option<String>,
}

/// External carrier registry consulted once per call.
#[async_trait]
pub trait CarrierRegistry: Send + Sync {
    /// Look the carrier up; `Ok(None)` means the registry does not know it.
    async fn verify(&self, mc: &McNumber) -> Result<Option<CarrierInfo>, LookupFailure>;

    /// Current rule: the carrier's operating authority is active. Further
    /// checks (insurance, safety rating) hang off this seam.
    fn is_eligible(&self, info: &CarrierInfo) -> bool {
        info.operating_status == OPERATING_STATUS_ACTIVE
    }
}
