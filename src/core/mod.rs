mod engine;
mod types;

pub use engine::{
    build_cost, classify, monthly_payment, project, project_with_trace, run_comparison,
};
pub use types::{
    BaselineFinance, ComparisonInputs, ComparisonReport, DrivingAssumptions, Financing,
    HORIZON_MONTHS, HORIZON_YEARS, InvestmentPolicy, LIQUIDITY_FLOOR, NamedScenario,
    ProjectionSeries, ProjectionYear, RunningCosts, SCENARIO_COUNT, SERIES_LEN, ScenarioCost,
    ScenarioReport, ScenarioSpec, ScenarioVerdict, YearRow,
};
