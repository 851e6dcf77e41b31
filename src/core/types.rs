use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInput {
    pub weekly_savings: f64,
    pub goal_value: f64,
    pub birth_date: NaiveDate,
    pub horizon_years: u32,
}

/// Constants of the accumulation and valuation model.
///
/// `Default` is the reference configuration; every field can be overridden
/// through the `[model]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub base_rate: f64,
    pub capital_factor: f64,
    pub reference_factor: f64,
    pub annual_interest_rate: f64,
    pub savings_growth_rate: f64,
    pub weeks_per_year: f64,
    pub halving_interval_years: u32,
    pub halving_base_year: i32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            base_rate: 50.0,
            capital_factor: 20_000.0,
            reference_factor: 6.25,
            annual_interest_rate: 0.06,
            savings_growth_rate: 0.10,
            weeks_per_year: 52.0,
            halving_interval_years: 4,
            halving_base_year: 2024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRecord {
    pub year_index: u32,
    pub age: i32,
    pub cumulative_btc: f64,
    pub projected_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalvingRecord {
    pub halving_calendar_year: i32,
    pub estimated_multiplier: f64,
    pub estimated_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalHit {
    pub year: u32,
    pub age: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub goal_reached: bool,
    pub year_reached: Option<u32>,
    pub age_reached: Option<i32>,
}

impl From<Option<GoalHit>> for Verdict {
    fn from(hit: Option<GoalHit>) -> Self {
        Self {
            goal_reached: hit.is_some(),
            year_reached: hit.map(|h| h.year),
            age_reached: hit.map(|h| h.age),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub spot_price: f64,
    pub current_age: i32,
    pub total_contributed: f64,
    pub years: Vec<YearRecord>,
    pub halvings: Vec<HalvingRecord>,
    pub verdict: Verdict,
}
