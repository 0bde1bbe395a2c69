use super::{LblError, LblResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum WarningCategory {
    #[serde(rename = "MissingSelfBroadeningWarning")]
    MissingSelfBroadening,
    #[serde(rename = "NegativeEnergiesWarning")]
    NegativeEnergies,
    #[serde(rename = "OutOfRangeLinesWarning")]
    OutOfRangeLines,
    #[serde(rename = "HighTemperatureWarning")]
    HighTemperature,
    #[serde(rename = "LinestrengthCutoffWarning")]
    LinestrengthCutoff,
    #[serde(rename = "LineshapeTruncationWarning")]
    LineshapeTruncation,
    #[serde(rename = "CoarseGridWarning")]
    CoarseGrid,
}

impl WarningCategory {
    pub const ALL: [Self; 7] = [
        Self::MissingSelfBroadening,
        Self::NegativeEnergies,
        Self::OutOfRangeLines,
        Self::HighTemperature,
        Self::LinestrengthCutoff,
        Self::LineshapeTruncation,
        Self::CoarseGrid,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingSelfBroadening => "MissingSelfBroadeningWarning",
            Self::NegativeEnergies => "NegativeEnergiesWarning",
            Self::OutOfRangeLines => "OutOfRangeLinesWarning",
            Self::HighTemperature => "HighTemperatureWarning",
            Self::LinestrengthCutoff => "LinestrengthCutoffWarning",
            Self::LineshapeTruncation => "LineshapeTruncationWarning",
            Self::CoarseGrid => "CoarseGridWarning",
        }
    }

    const fn raise_placeholder(self) -> &'static str {
        match self {
            Self::MissingSelfBroadening => "WARN.MISSING_SELF_BROADENING",
            Self::NegativeEnergies => "WARN.NEGATIVE_ENERGIES",
            Self::OutOfRangeLines => "WARN.OUT_OF_RANGE_LINES",
            Self::HighTemperature => "WARN.HIGH_TEMPERATURE",
            Self::LinestrengthCutoff => "WARN.LINESTRENGTH_CUTOFF",
            Self::LineshapeTruncation => "WARN.LINESHAPE_TRUNCATION",
            Self::CoarseGrid => "WARN.COARSE_GRID",
        }
    }
}

impl Display for WarningCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningAction {
    Ignore,
    #[default]
    Warn,
    Raise,
}

/// Per-call mapping from warning category to action. Categories without an
/// explicit entry fall back to [`WarningAction::Warn`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WarningPolicy {
    actions: BTreeMap<WarningCategory, WarningAction>,
}

impl WarningPolicy {
    pub fn with(mut self, category: WarningCategory, action: WarningAction) -> Self {
        self.set(category, action);
        self
    }

    pub fn set(&mut self, category: WarningCategory, action: WarningAction) {
        self.actions.insert(category, action);
    }

    pub fn ignore_all() -> Self {
        let mut policy = Self::default();
        for category in WarningCategory::ALL {
            policy.set(category, WarningAction::Ignore);
        }
        policy
    }

    pub fn action(&self, category: WarningCategory) -> WarningAction {
        self.actions.get(&category).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningRecord {
    pub category: WarningCategory,
    pub count: usize,
    pub message: String,
}

/// Collects the warnings emitted during one synthesis call and applies the
/// caller's policy to each of them.
#[derive(Debug, Clone)]
pub struct WarningSink<'a> {
    policy: &'a WarningPolicy,
    records: Vec<WarningRecord>,
}

impl<'a> WarningSink<'a> {
    pub fn new(policy: &'a WarningPolicy) -> Self {
        Self {
            policy,
            records: Vec::new(),
        }
    }

    /// Reports `count` occurrences of `category`. A zero count is a no-op.
    pub fn emit(
        &mut self,
        category: WarningCategory,
        count: usize,
        message: impl Into<String>,
    ) -> LblResult<()> {
        if count == 0 {
            return Ok(());
        }

        let message = message.into();
        match self.policy.action(category) {
            WarningAction::Ignore => Ok(()),
            WarningAction::Warn => {
                tracing::warn!(category = category.as_str(), count, "{message}");
                self.records.push(WarningRecord {
                    category,
                    count,
                    message,
                });
                Ok(())
            }
            WarningAction::Raise => Err(LblError::input_validation(
                category.raise_placeholder(),
                format!("{category}: {message}"),
            )),
        }
    }

    pub fn into_records(self) -> Vec<WarningRecord> {
        self.records
    }
}
