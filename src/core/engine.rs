use tracing::debug;

use super::types::{
    ComparisonInputs, ComparisonReport, DrivingAssumptions, Financing, HORIZON_MONTHS,
    HORIZON_YEARS, InvestmentPolicy, LIQUIDITY_FLOOR, NamedScenario, ProjectionSeries,
    ProjectionYear, SCENARIO_COUNT, SERIES_LEN, ScenarioCost, ScenarioReport, ScenarioSpec,
    ScenarioVerdict, YearRow,
};

#[derive(Debug, Clone, Copy)]
struct CapitalState {
    liquid: f64,
    invested: f64,
}

impl CapitalState {
    fn split(capital: f64, percent_to_invest: f64) -> Self {
        let invested = capital * (percent_to_invest / 100.0);
        Self {
            liquid: capital - invested,
            invested,
        }
    }

    fn total(self) -> f64 {
        self.invested + self.liquid
    }

    /// Tops the liquid pool back up to the floor from investments, as far as
    /// the invested pool allows. Returns the amount moved.
    fn rebalance_to_floor(&mut self) -> f64 {
        if self.liquid >= LIQUIDITY_FLOOR {
            return 0.0;
        }

        let needed = LIQUIDITY_FLOOR - self.liquid;
        if self.invested >= needed {
            self.invested -= needed;
            self.liquid += needed;
            needed
        } else {
            let moved = self.invested;
            self.liquid += moved;
            self.invested = 0.0;
            moved
        }
    }
}

pub fn monthly_payment(principal: f64, annual_rate_percent: f64, term_years: u32) -> f64 {
    if principal <= 0.0 || annual_rate_percent <= 0.0 || term_years == 0 {
        return 0.0;
    }

    let r = annual_rate_percent / 100.0 / 12.0;
    let months = term_years.saturating_mul(12);
    let n = i32::try_from(months).unwrap_or(i32::MAX);
    // Same annuity as P*r*(1+r)^n / ((1+r)^n - 1), without overflowing (1+r)^n.
    let discount = 1.0 - (1.0 + r).powi(-n);
    if discount <= 0.0 {
        return principal / months as f64;
    }
    principal * r / discount
}

pub fn build_cost(scenario: &ScenarioSpec, driving: &DrivingAssumptions) -> ScenarioCost {
    let running = scenario.running();
    let annual_fuel_cost = (driving.km_per_year / 100.0)
        * running.consumption_l_per_100km
        * driving.fuel_price_per_liter;
    let annual_fixed_cost = running.annual_maintenance + running.annual_insurance;

    let (initial_outlay, monthly_loan_payment, loan_term_months) = match *scenario {
        ScenarioSpec::KeepCurrent { final_payment, .. } => (final_payment, 0.0, 0),
        ScenarioSpec::Purchase {
            price,
            financing: Financing::Cash,
            ..
        } => (price, 0.0, 0),
        ScenarioSpec::Purchase {
            price,
            financing:
                Financing::Loan {
                    down_payment,
                    annual_interest_rate_percent,
                    term_years,
                },
            ..
        } => {
            let loan_amount = price - down_payment;
            (
                down_payment,
                monthly_payment(loan_amount, annual_interest_rate_percent, term_years),
                term_years.saturating_mul(12),
            )
        }
    };

    let loan_total = monthly_loan_payment * loan_term_months as f64;
    let operating_total = (annual_fuel_cost + annual_fixed_cost) * HORIZON_YEARS as f64;
    let total_cost_10_years = initial_outlay + loan_total + operating_total;

    ScenarioCost {
        initial_outlay,
        monthly_loan_payment,
        loan_term_months,
        annual_fuel_cost,
        annual_fixed_cost,
        total_cost_10_years,
        monthly_average_cost: total_cost_10_years / HORIZON_MONTHS as f64,
    }
}

/// Number of loan months that fall inside `[(year-1)*12, year*12)`.
fn loan_months_in_year(loan_term_months: u32, year: u32) -> u32 {
    let start_month = (year - 1) * 12;
    let end_month = year * 12;
    loan_term_months.min(end_month).saturating_sub(start_month)
}

pub fn project(
    starting_savings: f64,
    cost: &ScenarioCost,
    annual_cash_flow: f64,
    policy: &InvestmentPolicy,
) -> ProjectionSeries {
    simulate_projection(starting_savings, cost, annual_cash_flow, policy, None)
}

pub fn project_with_trace(
    starting_savings: f64,
    cost: &ScenarioCost,
    annual_cash_flow: f64,
    policy: &InvestmentPolicy,
) -> (ProjectionSeries, Vec<ProjectionYear>) {
    let mut trace = Vec::with_capacity(HORIZON_YEARS as usize);
    let series = simulate_projection(
        starting_savings,
        cost,
        annual_cash_flow,
        policy,
        Some(&mut trace),
    );
    (series, trace)
}

fn simulate_projection(
    starting_savings: f64,
    cost: &ScenarioCost,
    annual_cash_flow: f64,
    policy: &InvestmentPolicy,
    mut trace: Option<&mut Vec<ProjectionYear>>,
) -> ProjectionSeries {
    let mut state = CapitalState::split(
        starting_savings - cost.initial_outlay,
        policy.percent_to_invest,
    );

    let mut points = [0.0; SERIES_LEN];
    points[0] = state.total();

    let car_operating_cost = cost.annual_operating_cost();
    let return_rate = policy.annual_return_rate_percent / 100.0;

    for year in 1..=HORIZON_YEARS {
        let loan_outflow =
            loan_months_in_year(cost.loan_term_months, year) as f64 * cost.monthly_loan_payment;
        let investment_return = state.invested * return_rate;
        let net_flow = annual_cash_flow - (car_operating_cost + loan_outflow);

        state.liquid += net_flow;
        state.invested += investment_return;
        let rebalance_transfer = state.rebalance_to_floor();

        points[year as usize] = state.total();

        if let Some(rows) = trace.as_deref_mut() {
            rows.push(ProjectionYear {
                year,
                car_operating_cost,
                loan_outflow,
                investment_return,
                net_flow,
                rebalance_transfer,
                end_liquid: state.liquid,
                end_invested: state.invested,
                end_total: state.total(),
            });
        }
    }

    ProjectionSeries { points }
}

pub fn classify(final_capital: f64, starting_savings: f64) -> ScenarioVerdict {
    if final_capital.is_nan() || final_capital < 0.0 {
        ScenarioVerdict::Insolvent
    } else if final_capital < starting_savings {
        ScenarioVerdict::Caution
    } else {
        ScenarioVerdict::Sustainable
    }
}

pub fn run_comparison(inputs: &ComparisonInputs) -> ComparisonReport {
    let baseline = &inputs.baseline;
    let annual_cash_flow = baseline.annual_cash_flow();

    let scenarios = inputs
        .scenarios
        .iter()
        .map(|scenario| evaluate_scenario(scenario, inputs, annual_cash_flow))
        .collect::<Vec<_>>();

    let rows = build_year_rows(&scenarios);
    let best_scenario_index = best_scenario_index(&scenarios);

    ComparisonReport {
        starting_savings: baseline.savings,
        monthly_cash_flow: baseline.monthly_cash_flow(),
        annual_cash_flow,
        inflation_rate_percent: inputs.investment.annual_inflation_rate_percent,
        scenarios,
        rows,
        best_scenario_index,
    }
}

fn evaluate_scenario(
    scenario: &NamedScenario,
    inputs: &ComparisonInputs,
    annual_cash_flow: f64,
) -> ScenarioReport {
    let baseline = &inputs.baseline;
    let cost = build_cost(&scenario.spec, &inputs.driving);
    let (series, years) =
        project_with_trace(baseline.savings, &cost, annual_cash_flow, &inputs.investment);
    let final_capital = series.final_capital();
    // Verdict follows the year-10 figure as shown in the rows table.
    let verdict = classify(round_half_up(final_capital), baseline.savings);

    debug!(
        scenario = %scenario.name,
        initial_outlay = cost.initial_outlay,
        monthly_loan_payment = cost.monthly_loan_payment,
        final_capital,
        ?verdict,
        "scenario evaluated"
    );

    ScenarioReport {
        name: scenario.name.clone(),
        cost,
        series,
        final_capital,
        verdict,
        years,
    }
}

fn build_year_rows(scenarios: &[ScenarioReport]) -> Vec<YearRow> {
    (0..SERIES_LEN)
        .map(|idx| {
            let mut capital = [0.0; SCENARIO_COUNT];
            for (slot, scenario) in capital.iter_mut().zip(scenarios) {
                *slot = round_half_up(scenario.series.points[idx]);
            }
            YearRow {
                year: idx as u32,
                label: format!("Year {idx}"),
                capital,
            }
        })
        .collect()
}

fn best_scenario_index(scenarios: &[ScenarioReport]) -> usize {
    let mut best = 0;
    for (idx, scenario) in scenarios.iter().enumerate().skip(1) {
        if scenario.final_capital > scenarios[best].final_capital {
            best = idx;
        }
    }
    best
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
