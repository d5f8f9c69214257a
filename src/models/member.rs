use crate::models::input::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(MemberStatus::Active),
            "inactive" => Some(MemberStatus::Inactive),
            _ => None,
        }
    }
}

/// Per-member scalar applied to every score component. Finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RiskMultiplier(f64);

impl RiskMultiplier {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::InvalidRiskMultiplier(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for RiskMultiplier {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for RiskMultiplier {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RiskMultiplier> for f64 {
    fn from(value: RiskMultiplier) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: MemberStatus,
    #[serde(default)]
    pub risk_multiplier: RiskMultiplier,
    pub joined_at: i64,
}

impl Member {
    /// The scoring view of this member, or `None` when inactive.
    pub fn as_active(&self) -> Option<ActiveMember> {
        (self.status == MemberStatus::Active).then(|| ActiveMember {
            id: self.id.clone(),
            risk_multiplier: self.risk_multiplier,
        })
    }
}

/// What the aggregator needs to know about a participating member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveMember {
    pub id: String,
    pub risk_multiplier: RiskMultiplier,
}

impl ActiveMember {
    pub fn new(id: impl Into<String>, risk_multiplier: RiskMultiplier) -> Self {
        Self {
            id: id.into(),
            risk_multiplier,
        }
    }
}
