use chrono::{Datelike, NaiveDate};

use super::types::{GoalHit, HalvingRecord, ModelParams, Projection, ProjectionInput, YearRecord};
use crate::error::ProjectionError;

/// Longest horizon the engine accepts; the user-facing surfaces apply a
/// tighter bound.
pub const MAX_HORIZON_YEARS: u32 = 100;

/// Calendar years a configured first halving year may fall in.
pub const HALVING_BASE_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

const BIRTH_DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

#[derive(Debug, Default)]
struct Accumulation {
    cumulative_btc: f64,
    total_contributed: f64,
    years: Vec<YearRecord>,
    halvings: Vec<HalvingRecord>,
    goal: Option<GoalHit>,
}

pub fn valuation_multiplier(
    base_rate: f64,
    capital_factor: f64,
    halving_count: u32,
    reference_factor: f64,
) -> f64 {
    base_rate * capital_factor * 2f64.powi(halving_count as i32) / reference_factor
}

/// Halvings elapsed by the end of simulated year `year_index` (1-based).
/// Year 4 already counts one halving.
pub fn halving_count(year_index: u32, interval_years: u32) -> u32 {
    year_index / interval_years
}

/// Whole calendar years between the two dates; month and day are ignored.
pub fn age_at(birth_date: NaiveDate, current_date: NaiveDate) -> i32 {
    current_date.year() - birth_date.year()
}

pub fn parse_birth_date(raw: &str) -> Result<NaiveDate, ProjectionError> {
    let trimmed = raw.trim();
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| ProjectionError::BirthDate(raw.to_string()))
}

pub fn project(
    input: &ProjectionInput,
    spot_price: f64,
    current_date: NaiveDate,
) -> Result<Projection, ProjectionError> {
    project_with_params(&ModelParams::default(), input, spot_price, current_date)
}

pub fn project_with_params(
    params: &ModelParams,
    input: &ProjectionInput,
    spot_price: f64,
    current_date: NaiveDate,
) -> Result<Projection, ProjectionError> {
    validate_model_params(params)?;
    validate_input(input, spot_price)?;

    let current_age = age_at(input.birth_date, current_date);
    let initial = Accumulation {
        years: Vec::with_capacity(input.horizon_years as usize),
        halvings: Vec::with_capacity((input.horizon_years / params.halving_interval_years) as usize),
        ..Accumulation::default()
    };

    let state = (1..=input.horizon_years).fold(initial, |mut acc, year_index| {
        let contribution = annual_contribution(params, input.weekly_savings, year_index);
        acc.total_contributed += contribution;
        acc.cumulative_btc = accumulate_btc(
            acc.cumulative_btc,
            contribution / spot_price,
            params.annual_interest_rate,
        );

        let halvings = halving_count(year_index, params.halving_interval_years);
        let multiplier = valuation_multiplier(
            params.base_rate,
            params.capital_factor,
            halvings,
            params.reference_factor,
        );
        let projected_value = acc.cumulative_btc * multiplier;
        let age = current_age + year_index as i32;

        acc.years.push(YearRecord {
            year_index,
            age,
            cumulative_btc: acc.cumulative_btc,
            projected_value,
        });

        if year_index % params.halving_interval_years == 0 {
            acc.halvings.push(HalvingRecord {
                halving_calendar_year: params.halving_base_year
                    + (halvings * params.halving_interval_years) as i32,
                estimated_multiplier: multiplier,
                estimated_value: projected_value,
            });
        }

        acc.goal = acc.goal.or_else(|| {
            (projected_value >= input.goal_value).then_some(GoalHit {
                year: year_index,
                age,
            })
        });
        acc
    });

    Ok(Projection {
        spot_price,
        current_age,
        total_contributed: state.total_contributed,
        years: state.years,
        halvings: state.halvings,
        verdict: state.goal.into(),
    })
}

fn annual_contribution(params: &ModelParams, weekly_savings: f64, year_index: u32) -> f64 {
    let growth = (1.0 + params.savings_growth_rate).powi(year_index as i32 - 1);
    weekly_savings * params.weeks_per_year * growth
}

// Interest is earned on the previous holdings plus this year's purchase.
fn accumulate_btc(previous_btc: f64, bought_btc: f64, annual_interest_rate: f64) -> f64 {
    (previous_btc + bought_btc) * (1.0 + annual_interest_rate)
}

fn validate_input(input: &ProjectionInput, spot_price: f64) -> Result<(), ProjectionError> {
    if !input.weekly_savings.is_finite() || input.weekly_savings <= 0.0 {
        return Err(ProjectionError::invalid("weekly_savings", "must be > 0"));
    }
    if !input.goal_value.is_finite() || input.goal_value <= 0.0 {
        return Err(ProjectionError::invalid("goal_value", "must be > 0"));
    }
    if input.horizon_years == 0 || input.horizon_years > MAX_HORIZON_YEARS {
        return Err(ProjectionError::invalid(
            "horizon_years",
            format!("must be between 1 and {MAX_HORIZON_YEARS}"),
        ));
    }
    if !spot_price.is_finite() || spot_price <= 0.0 {
        return Err(ProjectionError::invalid("spot_price", "must be > 0"));
    }
    Ok(())
}

pub fn validate_model_params(params: &ModelParams) -> Result<(), ProjectionError> {
    if params.halving_interval_years == 0 {
        return Err(ProjectionError::invalid("halving_interval_years", "must be > 0"));
    }
    if !HALVING_BASE_YEAR_RANGE.contains(&params.halving_base_year) {
        return Err(ProjectionError::invalid(
            "halving_base_year",
            format!(
                "must be between {} and {}",
                HALVING_BASE_YEAR_RANGE.start(),
                HALVING_BASE_YEAR_RANGE.end()
            ),
        ));
    }
    if !params.reference_factor.is_finite() || params.reference_factor <= 0.0 {
        return Err(ProjectionError::invalid("reference_factor", "must be > 0"));
    }
    for (field, value) in [
        ("base_rate", params.base_rate),
        ("capital_factor", params.capital_factor),
        ("weeks_per_year", params.weeks_per_year),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ProjectionError::invalid(field, "must be > 0"));
        }
    }
    if !params.annual_interest_rate.is_finite() || params.annual_interest_rate < 0.0 {
        return Err(ProjectionError::invalid("annual_interest_rate", "must be >= 0"));
    }
    if !params.savings_growth_rate.is_finite() || params.savings_growth_rate <= -1.0 {
        return Err(ProjectionError::invalid("savings_growth_rate", "must be > -1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn sample_input() -> ProjectionInput {
        ProjectionInput {
            weekly_savings: 25.0,
            goal_value: 6_500_000.0,
            birth_date: date(2000, 1, 1),
            horizon_years: 25,
        }
    }

    fn today() -> NaiveDate {
        date(2025, 1, 1)
    }

    #[test]
    fn valuation_multiplier_doubles_per_halving() {
        assert_approx(valuation_multiplier(50.0, 20_000.0, 0, 6.25), 160_000.0);
        assert_approx(valuation_multiplier(50.0, 20_000.0, 1, 6.25), 320_000.0);
        assert_approx(valuation_multiplier(50.0, 20_000.0, 3, 6.25), 1_280_000.0);
    }

    #[test]
    fn halving_count_steps_at_multiples_of_interval() {
        assert_eq!(halving_count(1, 4), 0);
        assert_eq!(halving_count(3, 4), 0);
        assert_eq!(halving_count(4, 4), 1);
        assert_eq!(halving_count(7, 4), 1);
        assert_eq!(halving_count(8, 4), 2);
    }

    #[test]
    fn age_ignores_month_and_day() {
        assert_eq!(age_at(date(2000, 12, 31), date(2025, 1, 1)), 25);
        assert_eq!(age_at(date(2000, 1, 1), date(2025, 12, 31)), 25);
    }

    #[test]
    fn parse_birth_date_accepts_unpadded_and_iso_forms() {
        assert_eq!(parse_birth_date("1/1/2000"), Ok(date(2000, 1, 1)));
        assert_eq!(parse_birth_date("31/12/1990"), Ok(date(1990, 12, 31)));
        assert_eq!(parse_birth_date(" 05/03/1985 "), Ok(date(1985, 3, 5)));
        assert_eq!(parse_birth_date("1985-03-05"), Ok(date(1985, 3, 5)));
    }

    #[test]
    fn parse_birth_date_rejects_garbage_and_impossible_dates() {
        for raw in ["", "yesterday", "31/02/2000", "12/31/2000", "2000"] {
            assert_eq!(
                parse_birth_date(raw),
                Err(ProjectionError::BirthDate(raw.to_string())),
                "input {raw:?}"
            );
        }
    }

    #[test]
    fn oracle_first_four_years_match_hand_calculation() {
        let mut input = sample_input();
        input.horizon_years = 4;

        // Contributions: 1300, 1430, 1573, 1730.3 at a 50k spot price.
        // BTC: ((((0.026)*1.06 + 0.0286)*1.06 + 0.03146)*1.06 + 0.034606)*1.06
        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        let years = &projection.years;

        assert_approx(years[0].cumulative_btc, 0.02756);
        assert_approx(years[0].projected_value, 4_409.6);
        assert_approx(years[1].cumulative_btc, 0.0595296);
        assert_approx(years[1].projected_value, 9_524.736);
        assert_approx(years[2].cumulative_btc, 0.096448976);
        assert_approx(years[2].projected_value, 15_431.83616);
        assert_approx(years[3].cumulative_btc, 0.13891827456);
        assert_approx(years[3].projected_value, 44_453.8478592);
        assert_approx(projection.total_contributed, 6_033.3);
    }

    #[test]
    fn reference_scenario_shapes_records_and_ages() {
        let projection = project(&sample_input(), 50_000.0, today()).expect("valid projection");

        assert_eq!(projection.current_age, 25);
        assert_eq!(projection.years.len(), 25);
        assert_eq!(projection.years[0].age, 26);
        assert_eq!(projection.years[24].age, 50);
        assert_eq!(projection.halvings.len(), 6);

        assert_approx(projection.halvings[0].estimated_multiplier, 320_000.0);
        assert_approx(projection.halvings[1].estimated_multiplier, 640_000.0);
        assert_eq!(projection.halvings[0].halving_calendar_year, 2028);
        assert_eq!(projection.halvings[1].halving_calendar_year, 2032);
        assert_approx(
            projection.halvings[1].estimated_value,
            projection.years[7].projected_value,
        );
        assert_approx(projection.spot_price, 50_000.0);
    }

    #[test]
    fn horizon_boundaries_for_halving_records() {
        let mut input = sample_input();

        input.horizon_years = 3;
        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        assert!(projection.halvings.is_empty());

        input.horizon_years = 4;
        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        assert_eq!(projection.halvings.len(), 1);
        assert_eq!(projection.halvings[0].halving_calendar_year, 2028);
        assert_approx(projection.halvings[0].estimated_multiplier, 320_000.0);
    }

    #[test]
    fn verdict_marks_first_crossing_only() {
        let mut input = sample_input();
        input.goal_value = 9_524.0;

        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        assert!(projection.verdict.goal_reached);
        assert_eq!(projection.verdict.year_reached, Some(2));
        assert_eq!(projection.verdict.age_reached, Some(27));
    }

    #[test]
    fn verdict_reached_when_value_equals_goal() {
        let baseline = project(&sample_input(), 50_000.0, today()).expect("valid projection");
        let mut input = sample_input();
        input.goal_value = baseline.years[2].projected_value;

        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        assert_eq!(projection.verdict.year_reached, Some(3));
    }

    #[test]
    fn verdict_not_reached_leaves_year_and_age_empty() {
        let mut input = sample_input();
        input.goal_value = 1e15;

        let projection = project(&input, 50_000.0, today()).expect("valid projection");
        assert!(!projection.verdict.goal_reached);
        assert_eq!(projection.verdict.year_reached, None);
        assert_eq!(projection.verdict.age_reached, None);
    }

    #[test]
    fn identical_inputs_produce_identical_projections() {
        let a = project(&sample_input(), 61_234.5, today()).expect("valid projection");
        let b = project(&sample_input(), 61_234.5, today()).expect("valid projection");
        assert_eq!(a, b);
    }

    #[test]
    fn custom_params_change_valuation_only_where_expected() {
        let params = ModelParams {
            annual_interest_rate: 0.0,
            savings_growth_rate: 0.0,
            ..ModelParams::default()
        };
        let mut input = sample_input();
        input.horizon_years = 2;

        let projection =
            project_with_params(&params, &input, 1_300.0, today()).expect("valid projection");
        assert_approx(projection.years[0].cumulative_btc, 1.0);
        assert_approx(projection.years[1].cumulative_btc, 2.0);
        assert_approx(projection.years[1].projected_value, 320_000.0);
        assert_approx(projection.total_contributed, 2_600.0);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let mut input = sample_input();
        input.weekly_savings = 0.0;
        assert!(matches!(
            project(&input, 50_000.0, today()),
            Err(ProjectionError::InvalidInput { field: "weekly_savings", .. })
        ));

        let mut input = sample_input();
        input.goal_value = f64::NAN;
        assert!(matches!(
            project(&input, 50_000.0, today()),
            Err(ProjectionError::InvalidInput { field: "goal_value", .. })
        ));

        let mut input = sample_input();
        input.horizon_years = 0;
        assert!(matches!(
            project(&input, 50_000.0, today()),
            Err(ProjectionError::InvalidInput { field: "horizon_years", .. })
        ));

        assert!(matches!(
            project(&sample_input(), -1.0, today()),
            Err(ProjectionError::InvalidInput { field: "spot_price", .. })
        ));
    }

    #[test]
    fn rejects_zero_halving_interval() {
        let params = ModelParams {
            halving_interval_years: 0,
            ..ModelParams::default()
        };
        assert!(matches!(
            project_with_params(&params, &sample_input(), 50_000.0, today()),
            Err(ProjectionError::InvalidInput {
                field: "halving_interval_years",
                ..
            })
        ));
    }

    #[test]
    fn rejects_out_of_range_halving_base_year() {
        for year in [0, -2024, i32::MAX] {
            let params = ModelParams {
                halving_base_year: year,
                ..ModelParams::default()
            };
            assert!(
                matches!(
                    project_with_params(&params, &sample_input(), 50_000.0, today()),
                    Err(ProjectionError::InvalidInput {
                        field: "halving_base_year",
                        ..
                    })
                ),
                "year {year}"
            );
        }
    }

    #[test]
    fn reference_params_pass_validation() {
        assert_eq!(validate_model_params(&ModelParams::default()), Ok(()));
    }

    #[test]
    fn birth_date_error_names_accepted_formats() {
        let err = parse_birth_date("yesterday").expect_err("must reject");
        assert_eq!(
            err.to_string(),
            "invalid birth date 'yesterday': expected D/M/YYYY or YYYY-MM-DD"
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_projection_structure_holds(
            weekly_savings in 1u32..5_000,
            spot_price in 1_000u32..250_000,
            goal_value in 1_000u64..1_000_000_000,
            horizon_years in 1u32..=60,
            birth_year in 1940i32..2020
        ) {
            let input = ProjectionInput {
                weekly_savings: weekly_savings as f64,
                goal_value: goal_value as f64,
                birth_date: date(birth_year, 6, 15),
                horizon_years,
            };
            let projection = project(&input, spot_price as f64, today())
                .expect("valid projection");

            prop_assert_eq!(projection.years.len(), horizon_years as usize);
            for (idx, record) in projection.years.iter().enumerate() {
                prop_assert_eq!(record.year_index, idx as u32 + 1);
                prop_assert_eq!(record.age, 2025 - birth_year + record.year_index as i32);
                prop_assert!(record.cumulative_btc >= 0.0);
                prop_assert!(record.projected_value >= 0.0);
            }
            for pair in projection.years.windows(2) {
                prop_assert!(pair[1].cumulative_btc >= pair[0].cumulative_btc);
                prop_assert!(pair[1].projected_value > pair[0].projected_value);
            }

            prop_assert_eq!(projection.halvings.len(), (horizon_years / 4) as usize);
            for (k, halving) in projection.halvings.iter().enumerate() {
                prop_assert_eq!(halving.halving_calendar_year, 2024 + 4 * (k as i32 + 1));
                prop_assert_eq!(halving.estimated_value, projection.years[4 * k + 3].projected_value);
            }

            let first_hit = projection
                .years
                .iter()
                .find(|r| r.projected_value >= input.goal_value);
            prop_assert_eq!(projection.verdict.goal_reached, first_hit.is_some());
            prop_assert_eq!(projection.verdict.year_reached, first_hit.map(|r| r.year_index));
            prop_assert_eq!(projection.verdict.age_reached, first_hit.map(|r| r.age));
        }
    }
}
