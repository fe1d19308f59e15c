use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// How long a withdrawal may stay unjustified before the reconciliation sweep
/// flags it as `not_closed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyWindow {
    seconds: i64,
}

impl PolicyWindow {
    pub const DEFAULT_DAYS: u32 = 30;

    pub fn days(days: u32) -> Result<Self, LedgerError> {
        Self::from_duration(Duration::days(i64::from(days)))
    }

    /// The window must be strictly positive.
    pub fn from_duration(duration: Duration) -> Result<Self, LedgerError> {
        let seconds = duration.num_seconds();
        if seconds <= 0 {
            return Err(LedgerError::validation("policy window must be positive"));
        }
        Ok(Self { seconds })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl Default for PolicyWindow {
    fn default() -> Self {
        Self {
            seconds: i64::from(Self::DEFAULT_DAYS) * 24 * 60 * 60,
        }
    }
}
