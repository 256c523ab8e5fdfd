//! Letter-grade ratings and the technical-debt density grid

use crate::error::{LiveMeasureError, Result};
use crate::issue::Severity;
use serde::{Deserialize, Serialize};

/// Default upper density bounds for ratings A, B, C and D
pub const DEFAULT_RATING_GRID: [f64; 4] = [0.05, 0.1, 0.2, 0.5];

/// Ordinal A-E grade; A is best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    A,
    B,
    C,
    D,
    E,
}

impl Rating {
    pub const ALL: [Rating; 5] = [Rating::A, Rating::B, Rating::C, Rating::D, Rating::E];

    /// Numeric ordinal stored as the measure value (A = 1 .. E = 5)
    pub fn index(self) -> u8 {
        match self {
            Rating::A => 1,
            Rating::B => 2,
            Rating::C => 3,
            Rating::D => 4,
            Rating::E => 5,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Rating::ALL.into_iter().find(|r| r.index() == index)
    }

    pub fn letter(self) -> &'static str {
        match self {
            Rating::A => "A",
            Rating::B => "B",
            Rating::C => "C",
            Rating::D => "D",
            Rating::E => "E",
        }
    }

    /// Rating implied by the highest severity of unresolved issues
    pub fn from_severity(severity: Option<Severity>) -> Self {
        match severity {
            Some(Severity::Blocker) => Rating::E,
            Some(Severity::Critical) => Rating::D,
            Some(Severity::Major) => Rating::C,
            Some(Severity::Minor) => Rating::B,
            Some(Severity::Info) | None => Rating::A,
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.letter())
    }
}

/// Maintainability grid mapping debt density to a rating
///
/// Holds the upper bounds of A, B, C and D; anything above the last bound
/// is rated E.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebtRatingGrid {
    bounds: [f64; 4],
}

impl DebtRatingGrid {
    pub fn new(bounds: [f64; 4]) -> Result<Self> {
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(LiveMeasureError::InvalidRatingGrid(format!(
                "bounds must be finite and non-negative, got {:?}",
                bounds
            )));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LiveMeasureError::InvalidRatingGrid(format!(
                "bounds must be strictly increasing, got {:?}",
                bounds
            )));
        }
        Ok(DebtRatingGrid { bounds })
    }

    pub fn from_slice(bounds: &[f64]) -> Result<Self> {
        let array: [f64; 4] = bounds.try_into().map_err(|_| {
            LiveMeasureError::InvalidRatingGrid(format!(
                "expected 4 bounds, got {}",
                bounds.len()
            ))
        })?;
        Self::new(array)
    }

    pub fn bounds(&self) -> [f64; 4] {
        self.bounds
    }

    pub fn rating_for_density(&self, density: f64) -> Rating {
        let [a, b, c, d] = self.bounds;
        if density <= a {
            Rating::A
        } else if density <= b {
            Rating::B
        } else if density <= c {
            Rating::C
        } else if density <= d {
            Rating::D
        } else {
            Rating::E
        }
    }

    /// Lowest density that still earns `rating`
    pub fn grade_lower_bound(&self, rating: Rating) -> f64 {
        match rating {
            Rating::A => 0.0,
            Rating::B => self.bounds[0],
            Rating::C => self.bounds[1],
            Rating::D => self.bounds[2],
            Rating::E => self.bounds[3],
        }
    }
}

impl Default for DebtRatingGrid {
    fn default() -> Self {
        DebtRatingGrid {
            bounds: DEFAULT_RATING_GRID,
        }
    }
}
