//! Enumeration types stored alongside entities or produced by aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{MAX_VALUE, MIN_VALUE};

/// Returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// Enum being decoded.
    pub kind: &'static str,
    /// The unrecognised text.
    pub value: String,
}

impl core::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`crate::structs::Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Posted, still recruiting.
    #[default]
    Pending,
    /// Enough people signed up; waiting for the start tick.
    Ready,
    /// Under way.
    Active,
    /// Finished successfully.
    Done,
    /// Abandoned or failed.
    Failed,
}

impl JobState {
    /// Text stored in the `state` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<String> for JobState {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownVariant {
                kind: "job state",
                value,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Laws
// ---------------------------------------------------------------------------

/// Which set of a government's [`crate::structs::Laws`] a stored row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawKind {
    /// An outlawed faction.
    Faction,
    /// An outlawed action.
    Action,
    /// An outlawed commodity.
    Commodity,
    /// An outlawed research topic.
    Research,
    /// An outlawed religion.
    Religion,
}

impl LawKind {
    /// Text stored in the `laws.kind` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Faction => "faction",
            Self::Action => "action",
            Self::Commodity => "commodity",
            Self::Research => "research",
            Self::Religion => "religion",
        }
    }
}

impl TryFrom<String> for LawKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "faction" => Ok(Self::Faction),
            "action" => Ok(Self::Action),
            "commodity" => Ok(Self::Commodity),
            "research" => Ok(Self::Research),
            "religion" => Ok(Self::Religion),
            _ => Err(UnknownVariant {
                kind: "law kind",
                value,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity bands
// ---------------------------------------------------------------------------

/// A fixed severity bucket over `[MIN_VALUE, MAX_VALUE]`.
///
/// | Band | Range |
/// |------|-------|
/// | `Exemplary` | `>= 8000` |
/// | `Excellent` | `5000..8000` |
/// | `Good` | `2000..5000` |
/// | `Average` | `-2000 < v < 2000` |
/// | `Poor` | `-5000 < v <= -2000` |
/// | `Awful` | `-8000 < v <= -5000` |
/// | `Abysmal` | `<= -8000` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// The lowest band.
    Abysmal,
    /// Strongly negative.
    Awful,
    /// Negative.
    Poor,
    /// Around zero.
    Average,
    /// Positive.
    Good,
    /// Strongly positive.
    Excellent,
    /// The highest band.
    Exemplary,
}

impl Band {
    /// Every band from lowest to highest.
    pub const ALL: [Self; 7] = [
        Self::Abysmal,
        Self::Awful,
        Self::Poor,
        Self::Average,
        Self::Good,
        Self::Excellent,
        Self::Exemplary,
    ];

    /// The band `value` falls in. Out-of-range values land in the end bands.
    pub const fn of(value: i64) -> Self {
        if value >= 8_000 {
            Self::Exemplary
        } else if value >= 5_000 {
            Self::Excellent
        } else if value >= 2_000 {
            Self::Good
        } else if value > -2_000 {
            Self::Average
        } else if value > -5_000 {
            Self::Poor
        } else if value > -8_000 {
            Self::Awful
        } else {
            Self::Abysmal
        }
    }

    /// Inclusive value range covered by this band.
    pub const fn range(self) -> (i64, i64) {
        match self {
            Self::Abysmal => (MIN_VALUE, -8_000),
            Self::Awful => (-7_999, -5_000),
            Self::Poor => (-4_999, -2_000),
            Self::Average => (-1_999, 1_999),
            Self::Good => (2_000, 4_999),
            Self::Excellent => (5_000, 7_999),
            Self::Exemplary => (8_000, MAX_VALUE),
        }
    }
}

/// Per-band counts for one bucketed quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    counts: BTreeMap<Band, u64>,
}

impl BandCounts {
    /// Count one more value.
    pub fn add(&mut self, value: i64) {
        let slot = self.counts.entry(Band::of(value)).or_insert(0);
        *slot = slot.saturating_add(1);
    }

    /// How many values fell into `band`.
    pub fn get(&self, band: Band) -> u64 {
        self.counts.get(&band).copied().unwrap_or(0)
    }

    /// Total number of values counted.
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    /// Non-empty bands and their counts, lowest band first.
    pub fn iter(&self) -> impl Iterator<Item = (Band, u64)> + '_ {
        self.counts.iter().map(|(band, n)| (*band, *n))
    }
}
