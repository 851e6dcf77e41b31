use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::calculator::{PRICE_UNAVAILABLE_MESSAGE, calculate, format_usd, verdict_message};
use crate::config::AppConfig;
use crate::core::{
    HalvingRecord, ModelParams, Projection, ProjectionInput, Verdict, YearRecord, parse_birth_date,
};
use crate::error::CalculationError;
use crate::export::{halvings_csv, projection_csv, write_exports};
use crate::price::{CoinGeckoClient, FixedPrice, SpotPriceSource};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

pub const MIN_WEEKLY_SAVINGS: f64 = 1.0;
pub const MIN_GOAL_VALUE: f64 = 1_000.0;
pub const MIN_HORIZON_YEARS: u32 = 5;
pub const MAX_HORIZON_YEARS: u32 = 40;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    weekly_savings: Option<f64>,
    goal_value: Option<f64>,
    birth_date: Option<String>,
    horizon_years: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "btc-retirement",
    bin_name = "btc-retirement project",
    about = "Weekly BTC savings retirement projector with a halving-cycle valuation model"
)]
struct Cli {
    #[arg(long, default_value_t = 25.0, help = "Amount saved every week in USD")]
    weekly_savings: f64,
    #[arg(long, default_value_t = 6_500_000.0, help = "Retirement goal in USD")]
    goal: f64,
    #[arg(long, default_value = "1/1/2000", help = "Birth date as D/M/YYYY")]
    birth_date: String,
    #[arg(long, default_value_t = 25, help = "Years to project (5-40)")]
    years: u32,
    #[arg(long, help = "Use this BTC/USD price instead of fetching the live one")]
    spot_price: Option<f64>,
    #[arg(long, help = "Directory to write projection.csv and halvings.csv into")]
    export_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub prices: Arc<dyn SpotPriceSource>,
    pub model: ModelParams,
    pub today: fn() -> NaiveDate,
}

impl AppState {
    pub fn new(prices: Arc<dyn SpotPriceSource>, model: ModelParams) -> Self {
        Self {
            prices,
            model,
            today: local_today,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    spot_price: f64,
    current_age: i32,
    goal_value: f64,
    horizon_years: u32,
    total_contributed: f64,
    verdict: Verdict,
    message: String,
    years: Vec<YearRecord>,
    halvings: Vec<HalvingRecord>,
    projection_csv: String,
    halvings_csv: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Where a request came from; validation messages name the flag or the JSON
/// key the caller actually typed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InputSource {
    Cli,
    Api,
}

impl InputSource {
    fn label(self, flag: &'static str, key: &'static str) -> &'static str {
        match self {
            InputSource::Cli => flag,
            InputSource::Api => key,
        }
    }
}

fn build_inputs(
    cli: &Cli,
    today: NaiveDate,
    source: InputSource,
) -> Result<ProjectionInput, String> {
    if !cli.weekly_savings.is_finite() || cli.weekly_savings < MIN_WEEKLY_SAVINGS {
        return Err(format!(
            "{} must be >= {MIN_WEEKLY_SAVINGS}",
            source.label("--weekly-savings", "weeklySavings")
        ));
    }
    if !cli.goal.is_finite() || cli.goal < MIN_GOAL_VALUE {
        return Err(format!(
            "{} must be >= {MIN_GOAL_VALUE}",
            source.label("--goal", "goalValue")
        ));
    }
    if !(MIN_HORIZON_YEARS..=MAX_HORIZON_YEARS).contains(&cli.years) {
        return Err(format!(
            "{} must be between {MIN_HORIZON_YEARS} and {MAX_HORIZON_YEARS}",
            source.label("--years", "horizonYears")
        ));
    }
    if let Some(price) = cli.spot_price {
        if !price.is_finite() || price <= 0.0 {
            return Err("--spot-price must be > 0".to_string());
        }
    }
    let birth_label = source.label("--birth-date", "birthDate");
    let birth_date = parse_birth_date(&cli.birth_date).map_err(|e| format!("{birth_label}: {e}"))?;
    if birth_date.year() > today.year() {
        return Err(format!("{birth_label} must not be in the future"));
    }

    Ok(ProjectionInput {
        weekly_savings: cli.weekly_savings,
        goal_value: cli.goal,
        birth_date,
        horizon_years: cli.years,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        weekly_savings: 25.0,
        goal: 6_500_000.0,
        birth_date: "1/1/2000".to_string(),
        years: 25,
        spot_price: None,
        export_dir: None,
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str, today: NaiveDate) -> Result<ProjectionInput, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, today)
}

fn api_request_from_payload(
    payload: ProjectPayload,
    today: NaiveDate,
) -> Result<ProjectionInput, String> {
    let mut cli = default_cli_for_api();
    if let Some(v) = payload.weekly_savings {
        cli.weekly_savings = v;
    }
    if let Some(v) = payload.goal_value {
        cli.goal = v;
    }
    if let Some(v) = payload.birth_date {
        cli.birth_date = v;
    }
    if let Some(v) = payload.horizon_years {
        cli.years = v;
    }
    build_inputs(&cli, today, InputSource::Api)
}

/// One-shot projection printed to stdout. `args[0]` is treated as the
/// program name.
pub async fn run_cli<I, T>(args: I, cfg: &AppConfig) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let today = local_today();
    let input = build_inputs(&cli, today, InputSource::Cli).map_err(anyhow::Error::msg)?;

    let source: Box<dyn SpotPriceSource> = match cli.spot_price {
        Some(price) => Box::new(FixedPrice(price)),
        None => Box::new(CoinGeckoClient::new(&cfg.price)?),
    };

    let projection = match calculate(source.as_ref(), &cfg.model, &input, today).await {
        Ok(projection) => projection,
        Err(CalculationError::Price(e)) => bail!("{PRICE_UNAVAILABLE_MESSAGE} ({e})"),
        Err(e) => return Err(e.into()),
    };

    print!("{}", render_text_report(&input, &projection));

    if let Some(dir) = &cli.export_dir {
        let (projection_path, halvings_path) = write_exports(dir, &projection)?;
        info!(
            projection = %projection_path.display(),
            halvings = %halvings_path.display(),
            "exported CSV files"
        );
        println!(
            "Wrote {} and {}",
            projection_path.display(),
            halvings_path.display()
        );
    }
    Ok(())
}

fn render_text_report(input: &ProjectionInput, projection: &Projection) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "BTC spot price: {} | current age: {} | total contributed: {}",
        format_usd(projection.spot_price),
        projection.current_age,
        format_usd(projection.total_contributed)
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>4}  {:>4}  {:>16}  {:>20}",
        "Year", "Age", "Cumulative BTC", "Projected value"
    );
    for year in &projection.years {
        let _ = writeln!(
            out,
            "{:>4}  {:>4}  {:>16.8}  {:>20}",
            year.year_index,
            year.age,
            year.cumulative_btc,
            format_usd(year.projected_value)
        );
    }

    if !projection.halvings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>7}  {:>14}  {:>20}",
            "Halving", "Multiplier", "Estimated value"
        );
        for halving in &projection.halvings {
            let _ = writeln!(
                out,
                "{:>7}  {:>14.0}  {:>20}",
                halving.halving_calendar_year,
                halving.estimated_multiplier,
                format_usd(halving.estimated_value)
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}",
        verdict_message(input.goal_value, input.horizon_years, &projection.verdict)
    );
    out
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "BTC retirement HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/");
    axum::serve(listener, router(state)).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<ProjectPayload>,
) -> Response {
    project_handler_impl(&state, payload).await
}

async fn project_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<ProjectPayload>,
) -> Response {
    project_handler_impl(&state, payload).await
}

async fn project_handler_impl(state: &AppState, payload: ProjectPayload) -> Response {
    let today = (state.today)();
    let input = match api_request_from_payload(payload, today) {
        Ok(input) => input,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let projection = match calculate(state.prices.as_ref(), &state.model, &input, today).await {
        Ok(projection) => projection,
        Err(CalculationError::Price(_)) => {
            return error_response(StatusCode::BAD_GATEWAY, PRICE_UNAVAILABLE_MESSAGE);
        }
        Err(CalculationError::Projection(e)) => {
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match build_project_response(&input, projection) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => {
            error!(error = %e, "failed to render CSV exports");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build exports")
        }
    }
}

fn build_project_response(
    input: &ProjectionInput,
    projection: Projection,
) -> anyhow::Result<ProjectResponse> {
    Ok(ProjectResponse {
        spot_price: projection.spot_price,
        current_age: projection.current_age,
        goal_value: input.goal_value,
        horizon_years: input.horizon_years,
        total_contributed: projection.total_contributed,
        verdict: projection.verdict,
        message: verdict_message(input.goal_value, input.horizon_years, &projection.verdict),
        projection_csv: projection_csv(&projection.years)?,
        halvings_csv: halvings_csv(&projection.halvings)?,
        years: projection.years,
        halvings: projection.halvings,
    })
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
