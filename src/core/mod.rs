mod engine;
mod types;

pub use engine::{
    MAX_HORIZON_YEARS, age_at, halving_count, parse_birth_date, project, project_with_params,
    validate_model_params, valuation_multiplier,
};
pub use types::{
    GoalHit, HalvingRecord, ModelParams, Projection, ProjectionInput, Verdict, YearRecord,
};
