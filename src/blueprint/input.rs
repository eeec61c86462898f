//! Validated startup profile input.
//!
//! Matches the frontend form structure; numeric fields tolerate string
//! input because the form submits everything as text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Who the startup sells to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMarket {
    B2B,
    B2C,
    B2B2C,
}

/// How far along the product is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStage {
    Idea,
    #[serde(rename = "MVP")]
    Mvp,
    Beta,
    Revenue,
    Scaling,
}

/// Validated generation input for one blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInput {
    pub startup_name: String,
    pub industry: String,
    pub target_market: TargetMarket,
    pub geography: String,
    #[serde(default, deserialize_with = "flexible_u32")]
    pub team_size: u32,
    pub product_stage: ProductStage,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub monthly_revenue: f64,
    #[serde(default)]
    pub growth_rate: String,
    #[serde(default)]
    pub traction_summary: String,
    pub business_model: String,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub funding_goal: Option<f64>,
    pub main_financial_concern: String,
}

impl GenerationInput {
    /// Validate the profile. Runs before any job is created or any model
    /// call is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.startup_name.trim().is_empty() {
            return Err(ValidationError::MissingField("startupName"));
        }
        if self.startup_name.len() > 200 {
            return Err(ValidationError::InvalidField {
                field: "startupName",
                message: "must be at most 200 characters".into(),
            });
        }
        for (field, value) in [
            ("industry", &self.industry),
            ("geography", &self.geography),
            ("businessModel", &self.business_model),
            ("mainFinancialConcern", &self.main_financial_concern),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if self.team_size > 10_000 {
            return Err(ValidationError::InvalidField {
                field: "teamSize",
                message: "must be at most 10000".into(),
            });
        }
        if self.monthly_revenue < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "monthlyRevenue",
                message: "must be non-negative".into(),
            });
        }
        if let Some(goal) = self.funding_goal
            && goal < 0.0
        {
            return Err(ValidationError::InvalidField {
                field: "fundingGoal",
                message: "must be non-negative".into(),
            });
        }
        Ok(())
    }

    /// Initial chain context: the profile's fields as a flat JSON object.
    pub fn to_context(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn flexible_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Ok(n.as_u64().unwrap_or(0) as u32),
        Some(Value::String(s)) => Ok(s.trim().parse().unwrap_or(0)),
        _ => Ok(0),
    }
}

fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(flexible_number(Option::<Value>::deserialize(deserializer)?).unwrap_or(0.0))
}

fn flexible_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(flexible_number(Option::<Value>::deserialize(deserializer)?))
}

fn flexible_number(value: Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
