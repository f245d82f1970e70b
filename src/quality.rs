use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest score still considered good
pub const GOOD_THRESHOLD: i32 = 50;
/// Lowest score still considered fair
pub const FAIR_THRESHOLD: i32 = 30;

/// Discrete quality classification of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Good,
    Fair,
    Bad,
}

impl QualityBand {
    /// Bands are closed on the lower end: 50 is good, 30 is fair.
    pub fn classify(quality: i32) -> Self {
        if quality >= GOOD_THRESHOLD {
            QualityBand::Good
        } else if quality >= FAIR_THRESHOLD {
            QualityBand::Fair
        } else {
            QualityBand::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBand::Good => "good",
            QualityBand::Fair => "fair",
            QualityBand::Bad => "bad",
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
