use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::{ModelParams, Projection, ProjectionInput, Verdict, project_with_params};
use crate::error::CalculationError;
use crate::price::SpotPriceSource;

pub const PRICE_UNAVAILABLE_MESSAGE: &str =
    "Could not fetch the current BTC price. Please try again later.";

/// Fetches the spot price once and runs the projection against it.
///
/// Either the whole projection is returned or nothing is: a failed fetch
/// never falls back to a default price.
pub async fn calculate(
    source: &dyn SpotPriceSource,
    params: &ModelParams,
    input: &ProjectionInput,
    current_date: NaiveDate,
) -> Result<Projection, CalculationError> {
    let spot_price = source.fetch_spot_price().await.inspect_err(|e| {
        warn!(error = %e, "spot price unavailable; aborting projection");
    })?;

    let projection = project_with_params(params, input, spot_price, current_date)?;
    info!(
        spot_price,
        horizon_years = input.horizon_years,
        goal_reached = projection.verdict.goal_reached,
        year_reached = ?projection.verdict.year_reached,
        "projection complete"
    );
    Ok(projection)
}

pub fn verdict_message(goal_value: f64, horizon_years: u32, verdict: &Verdict) -> String {
    let goal = format_usd(goal_value);
    match (verdict.year_reached, verdict.age_reached) {
        (Some(year), Some(age)) => {
            format!("Goal of {goal} reached at age {age} (in {year} years)!")
        }
        _ => format!("Goal of {goal} not reached within {horizon_years} years."),
    }
}

/// Whole dollars with thousands separators, e.g. `$6,500,000`.
pub fn format_usd(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}")
}
