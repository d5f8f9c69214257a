use crate::models::input::ValidationError;
use serde::{Deserialize, Serialize};

/// Integer weight guaranteed to lie in `[MIN, MAX]`.
///
/// Deserialization goes through the same range check as `TryFrom<u8>`, so a
/// value of this type never carries an out-of-range weight into scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Bounded<const MIN: u8, const MAX: u8>(u8);

impl<const MIN: u8, const MAX: u8> Bounded<MIN, MAX> {
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        Self::from_i64(i64::from(value))
    }

    pub fn from_i64(value: i64) -> Result<Self, ValidationError> {
        if value < i64::from(MIN) || value > i64::from(MAX) {
            return Err(ValidationError::OutOfRange {
                value,
                min: MIN,
                max: MAX,
            });
        }
        Ok(Self(value as u8))
    }

    /// Saturates `value` into the valid range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(MIN), i64::from(MAX)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl<const MIN: u8, const MAX: u8> TryFrom<u8> for Bounded<MIN, MAX> {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const MIN: u8, const MAX: u8> From<Bounded<MIN, MAX>> for u8 {
    fn from(value: Bounded<MIN, MAX>) -> Self {
        value.0
    }
}

pub type ImpactWeight = Bounded<1, 10>;
pub type DifficultyWeight = Bounded<1, 5>;
pub type BusinessValueWeight = Bounded<1, 10>;
pub type Severity = Bounded<1, 5>;
pub type BugImpactWeight = Bounded<1, 5>;
pub type MeetingImportance = Bounded<1, 5>;
pub type ContributionLevel = Bounded<1, 5>;
pub type DecisionImportance = Bounded<1, 10>;
pub type InfluenceLevel = Bounded<1, 5>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub impact_weight: ImpactWeight,
    pub difficulty_weight: DifficultyWeight,
    pub business_value_weight: BusinessValueWeight,
}

impl FeatureWeights {
    pub fn new(impact: u8, difficulty: u8, business_value: u8) -> Result<Self, ValidationError> {
        Ok(Self {
            impact_weight: ImpactWeight::new(impact)?,
            difficulty_weight: DifficultyWeight::new(difficulty)?,
            business_value_weight: BusinessValueWeight::new(business_value)?,
        })
    }
}

/// One member's proposal for a feature's weights. At most one per
/// (feature, member) pair; resubmitting replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeightVote {
    pub feature_id: String,
    pub member_id: String,
    pub weights: FeatureWeights,
    pub submitted_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_outside_range() {
        assert!(DifficultyWeight::new(0).is_err());
        assert!(DifficultyWeight::new(6).is_err());
        assert_eq!(DifficultyWeight::new(5).expect("in range").get(), 5);
        assert!(ImpactWeight::from_i64(-3).is_err());
    }

    #[test]
    fn clamps_into_range() {
        assert_eq!(ImpactWeight::clamped(42).get(), 10);
        assert_eq!(ImpactWeight::clamped(-1).get(), 1);
        assert_eq!(DifficultyWeight::clamped(3).get(), 3);
    }

    #[test]
    fn deserialization_applies_range_check() {
        let ok: FeatureWeights = serde_json::from_str(
            r#"{"impact_weight":10,"difficulty_weight":5,"business_value_weight":1}"#,
        )
        .expect("valid weights");
        assert_eq!(ok.impact_weight.get(), 10);

        let bad = serde_json::from_str::<FeatureWeights>(
            r#"{"impact_weight":11,"difficulty_weight":5,"business_value_weight":1}"#,
        );
        assert!(bad.is_err());
    }
}
