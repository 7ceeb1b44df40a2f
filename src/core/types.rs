use serde::Serialize;

pub const HORIZON_YEARS: u32 = 10;
pub const SERIES_LEN: usize = HORIZON_YEARS as usize + 1;
pub const HORIZON_MONTHS: u32 = HORIZON_YEARS * 12;
pub const SCENARIO_COUNT: usize = 3;

/// Minimum cash kept in the liquid pool; topped up from investments when breached.
pub const LIQUIDITY_FLOOR: f64 = 2_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineFinance {
    pub savings: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
}

impl BaselineFinance {
    pub fn monthly_cash_flow(&self) -> f64 {
        self.monthly_income - self.monthly_expenses
    }

    pub fn annual_cash_flow(&self) -> f64 {
        self.monthly_cash_flow() * 12.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrivingAssumptions {
    pub km_per_year: f64,
    pub fuel_price_per_liter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningCosts {
    pub consumption_l_per_100km: f64,
    pub annual_maintenance: f64,
    pub annual_insurance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Financing {
    Cash,
    Loan {
        down_payment: f64,
        annual_interest_rate_percent: f64,
        term_years: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioSpec {
    KeepCurrent {
        final_payment: f64,
        running: RunningCosts,
    },
    Purchase {
        price: f64,
        financing: Financing,
        running: RunningCosts,
    },
}

impl ScenarioSpec {
    pub fn running(&self) -> &RunningCosts {
        match self {
            ScenarioSpec::KeepCurrent { running, .. } | ScenarioSpec::Purchase { running, .. } => {
                running
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedScenario {
    pub name: String,
    pub spec: ScenarioSpec,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvestmentPolicy {
    pub percent_to_invest: f64,
    pub annual_return_rate_percent: f64,
    /// Reported back to the caller only; the projection is nominal.
    pub annual_inflation_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonInputs {
    pub baseline: BaselineFinance,
    pub driving: DrivingAssumptions,
    pub scenarios: [NamedScenario; SCENARIO_COUNT],
    pub investment: InvestmentPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCost {
    pub initial_outlay: f64,
    pub monthly_loan_payment: f64,
    pub loan_term_months: u32,
    pub annual_fuel_cost: f64,
    pub annual_fixed_cost: f64,
    pub total_cost_10_years: f64,
    pub monthly_average_cost: f64,
}

impl ScenarioCost {
    pub fn annual_operating_cost(&self) -> f64 {
        self.annual_fuel_cost + self.annual_fixed_cost
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProjectionSeries {
    pub points: [f64; SERIES_LEN],
}

impl ProjectionSeries {
    pub fn initial_capital(&self) -> f64 {
        self.points[0]
    }

    pub fn final_capital(&self) -> f64 {
        self.points[SERIES_LEN - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub year: u32,
    pub car_operating_cost: f64,
    pub loan_outflow: f64,
    pub investment_return: f64,
    pub net_flow: f64,
    pub rebalance_transfer: f64,
    pub end_liquid: f64,
    pub end_invested: f64,
    pub end_total: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioVerdict {
    Insolvent,
    Caution,
    Sustainable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub name: String,
    pub cost: ScenarioCost,
    pub series: ProjectionSeries,
    pub final_capital: f64,
    pub verdict: ScenarioVerdict,
    pub years: Vec<ProjectionYear>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub year: u32,
    pub label: String,
    pub capital: [f64; SCENARIO_COUNT],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub starting_savings: f64,
    pub monthly_cash_flow: f64,
    pub annual_cash_flow: f64,
    pub inflation_rate_percent: f64,
    pub scenarios: Vec<ScenarioReport>,
    pub rows: Vec<YearRow>,
    pub best_scenario_index: usize,
}
