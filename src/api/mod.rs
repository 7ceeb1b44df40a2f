use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    BaselineFinance, ComparisonInputs, ComparisonReport, DrivingAssumptions, Financing,
    InvestmentPolicy, NamedScenario, RunningCosts, ScenarioSpec, ScenarioVerdict, run_comparison,
};

const MAX_TERM_YEARS: u32 = 100;

/// Rejected boundary input. The message names the offending flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidScenarioInput(pub String);

#[derive(Debug, Error)]
pub enum CompareCliError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InvalidScenarioInput),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFinancing {
    Cash,
    Loan,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFinancing {
    #[serde(alias = "outright", alias = "cash-purchase")]
    Cash,
    #[serde(alias = "financed", alias = "credit")]
    Loan,
}

impl From<ApiFinancing> for CliFinancing {
    fn from(value: ApiFinancing) -> Self {
        match value {
            ApiFinancing::Cash => CliFinancing::Cash,
            ApiFinancing::Loan => CliFinancing::Loan,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    savings: Option<f64>,
    #[serde(alias = "pension")]
    monthly_income: Option<f64>,
    #[serde(alias = "expenses")]
    monthly_expenses: Option<f64>,

    km_per_year: Option<f64>,
    #[serde(alias = "fuelCost")]
    fuel_price: Option<f64>,

    current_name: Option<String>,
    current_final_payment: Option<f64>,
    current_consumption: Option<f64>,
    current_maintenance: Option<f64>,
    current_insurance: Option<f64>,

    option_a_name: Option<String>,
    option_a_price: Option<f64>,
    option_a_financing: Option<ApiFinancing>,
    option_a_down_payment: Option<f64>,
    option_a_interest_rate: Option<f64>,
    option_a_term_years: Option<u32>,
    option_a_consumption: Option<f64>,
    option_a_maintenance: Option<f64>,
    option_a_insurance: Option<f64>,

    option_b_name: Option<String>,
    option_b_price: Option<f64>,
    option_b_financing: Option<ApiFinancing>,
    option_b_down_payment: Option<f64>,
    option_b_interest_rate: Option<f64>,
    option_b_term_years: Option<u32>,
    option_b_consumption: Option<f64>,
    option_b_maintenance: Option<f64>,
    option_b_insurance: Option<f64>,

    percent_to_invest: Option<f64>,
    return_rate: Option<f64>,
    #[serde(alias = "inflation")]
    inflation_rate: Option<f64>,
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "carplan-compare",
    about = "Compare keeping, buying outright or financing a car over a 10-year capital projection"
)]
struct Cli {
    #[arg(long, default_value_t = 80_000.0, help = "Savings available today")]
    savings: f64,
    #[arg(long, default_value_t = 1_050.0, help = "Net monthly income")]
    monthly_income: f64,
    #[arg(long, default_value_t = 800.0, help = "Monthly living expenses")]
    monthly_expenses: f64,

    #[arg(long, default_value_t = 10_000.0)]
    km_per_year: f64,
    #[arg(long, default_value_t = 1.6, help = "Fuel price per liter")]
    fuel_price: f64,

    #[arg(long, default_value = "Current car")]
    current_name: String,
    #[arg(
        long,
        default_value_t = 20_000.0,
        help = "One-time payment to keep the current car (e.g. lease buyout)"
    )]
    current_final_payment: f64,
    #[arg(long, default_value_t = 5.0, help = "Consumption in L/100km")]
    current_consumption: f64,
    #[arg(long, default_value_t = 600.0)]
    current_maintenance: f64,
    #[arg(long, default_value_t = 600.0)]
    current_insurance: f64,

    #[arg(long, default_value = "Option A (economy)")]
    option_a_name: String,
    #[arg(long, default_value_t = 18_000.0)]
    option_a_price: f64,
    #[arg(long, value_enum, default_value_t = CliFinancing::Cash)]
    option_a_financing: CliFinancing,
    #[arg(
        long,
        default_value_t = 5_000.0,
        help = "Down payment, used only with --option-a-financing=loan"
    )]
    option_a_down_payment: f64,
    #[arg(long, default_value_t = 6.5, help = "Annual loan interest rate in percent")]
    option_a_interest_rate: f64,
    #[arg(long, default_value_t = 5)]
    option_a_term_years: u32,
    #[arg(long, default_value_t = 6.5, help = "Consumption in L/100km")]
    option_a_consumption: f64,
    #[arg(long, default_value_t = 400.0)]
    option_a_maintenance: f64,
    #[arg(long, default_value_t = 500.0)]
    option_a_insurance: f64,

    #[arg(long, default_value = "Option B (premium)")]
    option_b_name: String,
    #[arg(long, default_value_t = 28_000.0)]
    option_b_price: f64,
    #[arg(long, value_enum, default_value_t = CliFinancing::Loan)]
    option_b_financing: CliFinancing,
    #[arg(
        long,
        default_value_t = 8_000.0,
        help = "Down payment, used only with --option-b-financing=loan"
    )]
    option_b_down_payment: f64,
    #[arg(long, default_value_t = 5.5, help = "Annual loan interest rate in percent")]
    option_b_interest_rate: f64,
    #[arg(long, default_value_t = 6)]
    option_b_term_years: u32,
    #[arg(long, default_value_t = 4.5, help = "Consumption in L/100km")]
    option_b_consumption: f64,
    #[arg(long, default_value_t = 300.0)]
    option_b_maintenance: f64,
    #[arg(long, default_value_t = 700.0)]
    option_b_insurance: f64,

    #[arg(
        long,
        default_value_t = 50.0,
        help = "Share of remaining savings to invest, in percent"
    )]
    percent_to_invest: f64,
    #[arg(long, default_value_t = 4.0, help = "Annual investment return in percent")]
    return_rate: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual inflation in percent (reported only, not applied)"
    )]
    inflation_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    best_scenario: String,
    verdicts: Vec<ScenarioVerdict>,
    #[serde(flatten)]
    report: ComparisonReport,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

struct PurchaseArgs<'a> {
    flag_prefix: &'a str,
    name: String,
    price: f64,
    financing: CliFinancing,
    down_payment: f64,
    interest_rate: f64,
    term_years: u32,
    running: RunningCosts,
}

fn invalid(msg: impl Into<String>) -> InvalidScenarioInput {
    InvalidScenarioInput(msg.into())
}

fn require_non_negative(values: &[(&str, f64)]) -> Result<(), InvalidScenarioInput> {
    for (name, value) in values {
        if !value.is_finite() || *value < 0.0 {
            return Err(invalid(format!("{name} must be >= 0")));
        }
    }
    Ok(())
}

fn scenario_name(flag: &str, name: String) -> Result<String, InvalidScenarioInput> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{flag} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn build_purchase(args: PurchaseArgs<'_>) -> Result<NamedScenario, InvalidScenarioInput> {
    let prefix = args.flag_prefix;
    for (field, value) in [
        ("price", args.price),
        ("consumption", args.running.consumption_l_per_100km),
        ("maintenance", args.running.annual_maintenance),
        ("insurance", args.running.annual_insurance),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!("--{prefix}-{field} must be >= 0")));
        }
    }

    let financing = match args.financing {
        CliFinancing::Cash => Financing::Cash,
        CliFinancing::Loan => {
            if !args.down_payment.is_finite() || args.down_payment < 0.0 {
                return Err(invalid(format!("--{prefix}-down-payment must be >= 0")));
            }
            if args.down_payment > args.price {
                return Err(invalid(format!(
                    "--{prefix}-down-payment must be <= --{prefix}-price"
                )));
            }
            if !args.interest_rate.is_finite() || args.interest_rate < 0.0 {
                return Err(invalid(format!("--{prefix}-interest-rate must be >= 0")));
            }
            if args.term_years > MAX_TERM_YEARS {
                return Err(invalid(format!(
                    "--{prefix}-term-years must be between 0 and {MAX_TERM_YEARS}"
                )));
            }
            Financing::Loan {
                down_payment: args.down_payment,
                annual_interest_rate_percent: args.interest_rate,
                term_years: args.term_years,
            }
        }
    };

    Ok(NamedScenario {
        name: scenario_name(&format!("--{prefix}-name"), args.name)?,
        spec: ScenarioSpec::Purchase {
            price: args.price,
            financing,
            running: args.running,
        },
    })
}

fn build_inputs(cli: Cli) -> Result<ComparisonInputs, InvalidScenarioInput> {
    require_non_negative(&[
        ("--savings", cli.savings),
        ("--monthly-income", cli.monthly_income),
        ("--monthly-expenses", cli.monthly_expenses),
        ("--km-per-year", cli.km_per_year),
        ("--fuel-price", cli.fuel_price),
        ("--current-final-payment", cli.current_final_payment),
        ("--current-consumption", cli.current_consumption),
        ("--current-maintenance", cli.current_maintenance),
        ("--current-insurance", cli.current_insurance),
    ])?;

    if !(0.0..=100.0).contains(&cli.percent_to_invest) {
        return Err(invalid("--percent-to-invest must be between 0 and 100"));
    }

    if !cli.return_rate.is_finite() || cli.return_rate <= -100.0 {
        return Err(invalid("--return-rate must be > -100"));
    }

    if !cli.inflation_rate.is_finite() {
        return Err(invalid("--inflation-rate must be a finite number"));
    }

    let keep_current = NamedScenario {
        name: scenario_name("--current-name", cli.current_name)?,
        spec: ScenarioSpec::KeepCurrent {
            final_payment: cli.current_final_payment,
            running: RunningCosts {
                consumption_l_per_100km: cli.current_consumption,
                annual_maintenance: cli.current_maintenance,
                annual_insurance: cli.current_insurance,
            },
        },
    };

    let option_a = build_purchase(PurchaseArgs {
        flag_prefix: "option-a",
        name: cli.option_a_name,
        price: cli.option_a_price,
        financing: cli.option_a_financing,
        down_payment: cli.option_a_down_payment,
        interest_rate: cli.option_a_interest_rate,
        term_years: cli.option_a_term_years,
        running: RunningCosts {
            consumption_l_per_100km: cli.option_a_consumption,
            annual_maintenance: cli.option_a_maintenance,
            annual_insurance: cli.option_a_insurance,
        },
    })?;

    let option_b = build_purchase(PurchaseArgs {
        flag_prefix: "option-b",
        name: cli.option_b_name,
        price: cli.option_b_price,
        financing: cli.option_b_financing,
        down_payment: cli.option_b_down_payment,
        interest_rate: cli.option_b_interest_rate,
        term_years: cli.option_b_term_years,
        running: RunningCosts {
            consumption_l_per_100km: cli.option_b_consumption,
            annual_maintenance: cli.option_b_maintenance,
            annual_insurance: cli.option_b_insurance,
        },
    })?;

    Ok(ComparisonInputs {
        baseline: BaselineFinance {
            savings: cli.savings,
            monthly_income: cli.monthly_income,
            monthly_expenses: cli.monthly_expenses,
        },
        driving: DrivingAssumptions {
            km_per_year: cli.km_per_year,
            fuel_price_per_liter: cli.fuel_price,
        },
        scenarios: [keep_current, option_a, option_b],
        investment: InvestmentPolicy {
            percent_to_invest: cli.percent_to_invest,
            annual_return_rate_percent: cli.return_rate,
            annual_inflation_rate_percent: cli.inflation_rate,
        },
    })
}

/// Parses `compare` flags (the first item is the program name), runs the
/// comparison and returns the report as pretty JSON.
pub fn run_compare_cli<I, T>(args: I) -> Result<String, CompareCliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let inputs = build_inputs(cli)?;
    let response = build_compare_response(run_comparison(&inputs));
    Ok(serde_json::to_string_pretty(&response)?)
}

fn build_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "carplan HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/compare");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn compare_get_handler(Query(payload): Query<ComparePayload>) -> Response {
    compare_response(payload)
}

async fn compare_post_handler(Json(payload): Json<ComparePayload>) -> Response {
    compare_response(payload)
}

fn compare_response(payload: ComparePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => {
            warn!(error = %err, "rejected comparison input");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let response = build_compare_response(run_comparison(&inputs));
    info!(
        scenarios = response.report.scenarios.len(),
        best = %response.best_scenario,
        "comparison computed"
    );
    json_response(StatusCode::OK, response)
}

fn build_compare_response(report: ComparisonReport) -> CompareResponse {
    let best_scenario = report
        .scenarios
        .get(report.best_scenario_index)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    let verdicts = report.scenarios.iter().map(|s| s.verdict).collect();

    CompareResponse {
        best_scenario,
        verdicts,
        report,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<ComparisonInputs, InvalidScenarioInput> {
    let payload = serde_json::from_str::<ComparePayload>(json)
        .map_err(|e| invalid(format!("Invalid API JSON payload: {e}")))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: ComparePayload) -> Result<ComparisonInputs, InvalidScenarioInput> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.savings {
        cli.savings = v;
    }
    if let Some(v) = payload.monthly_income {
        cli.monthly_income = v;
    }
    if let Some(v) = payload.monthly_expenses {
        cli.monthly_expenses = v;
    }

    if let Some(v) = payload.km_per_year {
        cli.km_per_year = v;
    }
    if let Some(v) = payload.fuel_price {
        cli.fuel_price = v;
    }

    if let Some(v) = payload.current_name {
        cli.current_name = v;
    }
    if let Some(v) = payload.current_final_payment {
        cli.current_final_payment = v;
    }
    if let Some(v) = payload.current_consumption {
        cli.current_consumption = v;
    }
    if let Some(v) = payload.current_maintenance {
        cli.current_maintenance = v;
    }
    if let Some(v) = payload.current_insurance {
        cli.current_insurance = v;
    }

    if let Some(v) = payload.option_a_name {
        cli.option_a_name = v;
    }
    if let Some(v) = payload.option_a_price {
        cli.option_a_price = v;
    }
    if let Some(v) = payload.option_a_financing {
        cli.option_a_financing = v.into();
    }
    if let Some(v) = payload.option_a_down_payment {
        cli.option_a_down_payment = v;
    }
    if let Some(v) = payload.option_a_interest_rate {
        cli.option_a_interest_rate = v;
    }
    if let Some(v) = payload.option_a_term_years {
        cli.option_a_term_years = v;
    }
    if let Some(v) = payload.option_a_consumption {
        cli.option_a_consumption = v;
    }
    if let Some(v) = payload.option_a_maintenance {
        cli.option_a_maintenance = v;
    }
    if let Some(v) = payload.option_a_insurance {
        cli.option_a_insurance = v;
    }

    if let Some(v) = payload.option_b_name {
        cli.option_b_name = v;
    }
    if let Some(v) = payload.option_b_price {
        cli.option_b_price = v;
    }
    if let Some(v) = payload.option_b_financing {
        cli.option_b_financing = v.into();
    }
    if let Some(v) = payload.option_b_down_payment {
        cli.option_b_down_payment = v;
    }
    if let Some(v) = payload.option_b_interest_rate {
        cli.option_b_interest_rate = v;
    }
    if let Some(v) = payload.option_b_term_years {
        cli.option_b_term_years = v;
    }
    if let Some(v) = payload.option_b_consumption {
        cli.option_b_consumption = v;
    }
    if let Some(v) = payload.option_b_maintenance {
        cli.option_b_maintenance = v;
    }
    if let Some(v) = payload.option_b_insurance {
        cli.option_b_insurance = v;
    }

    if let Some(v) = payload.percent_to_invest {
        cli.percent_to_invest = v;
    }
    if let Some(v) = payload.return_rate {
        cli.return_rate = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        savings: 80_000.0,
        monthly_income: 1_050.0,
        monthly_expenses: 800.0,
        km_per_year: 10_000.0,
        fuel_price: 1.6,
        current_name: "Current car".to_string(),
        current_final_payment: 20_000.0,
        current_consumption: 5.0,
        current_maintenance: 600.0,
        current_insurance: 600.0,
        option_a_name: "Option A (economy)".to_string(),
        option_a_price: 18_000.0,
        option_a_financing: CliFinancing::Cash,
        option_a_down_payment: 5_000.0,
        option_a_interest_rate: 6.5,
        option_a_term_years: 5,
        option_a_consumption: 6.5,
        option_a_maintenance: 400.0,
        option_a_insurance: 500.0,
        option_b_name: "Option B (premium)".to_string(),
        option_b_price: 28_000.0,
        option_b_financing: CliFinancing::Loan,
        option_b_down_payment: 8_000.0,
        option_b_interest_rate: 5.5,
        option_b_term_years: 6,
        option_b_consumption: 4.5,
        option_b_maintenance: 300.0,
        option_b_insurance: 700.0,
        percent_to_invest: 50.0,
        return_rate: 4.0,
        inflation_rate: 3.0,
    }
}
