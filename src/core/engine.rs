use thiserror::Error;

use super::types::{AllocationLine, AssetCategory, CategoryResult, SimulationInput, SimulationOutput};

pub const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("tenure must be at least 1 year, got {0}")]
    InvalidTenure(u32),
    #[error("annual return of {annual_return_pct}% for {} is outside the compounding domain (must be > -100%)", .category.label())]
    InvalidReturnDomain {
        category: AssetCategory,
        annual_return_pct: f64,
    },
}

/// Projects a step-up SIP across every allocation line, month by month.
///
/// Each month a line's balance first grows by its effective monthly rate and
/// only then receives that month's contribution, so the final contribution of
/// the tenure earns no return. Allocation percents are not required to sum to
/// 100; each line simply contributes `monthly_base * allocation_pct / 100`.
pub fn simulate(input: &SimulationInput) -> Result<SimulationOutput, SimulationError> {
    if input.tenure_years < 1 {
        return Err(SimulationError::InvalidTenure(input.tenure_years));
    }

    let monthly_rates = input
        .lines
        .iter()
        .map(|line| {
            monthly_growth_rate(line.annual_return_pct).ok_or(
                SimulationError::InvalidReturnDomain {
                    category: line.category,
                    annual_return_pct: line.annual_return_pct,
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let line_bases: Vec<f64> = input
        .lines
        .iter()
        .map(|line| category_monthly_base(input.monthly_base, line))
        .collect();

    let months = input.tenure_years as usize * MONTHS_PER_YEAR as usize;
    let mut balances = vec![0.0; input.lines.len()];
    let mut monthly_totals = Vec::with_capacity(months);
    let mut total_invested = 0.0;

    for year in 0..input.tenure_years {
        let step_up_multiplier = (1.0 + input.step_up_pct / 100.0).powi(year as i32);
        for _ in 0..MONTHS_PER_YEAR {
            let mut month_total = 0.0;
            for ((balance, rate), base) in balances
                .iter_mut()
                .zip(monthly_rates.iter())
                .zip(line_bases.iter())
            {
                let contribution = base * step_up_multiplier;
                *balance *= 1.0 + rate;
                *balance += contribution;
                total_invested += contribution;
                month_total += *balance;
            }
            monthly_totals.push(month_total);
        }
    }

    let category_results = input
        .lines
        .iter()
        .zip(balances)
        .map(|(line, final_value)| CategoryResult {
            category: line.category,
            final_value,
        })
        .collect();

    Ok(SimulationOutput {
        monthly_totals,
        category_results,
        total_invested,
    })
}

/// Effective monthly rate equivalent to `annual_return_pct` compounded yearly.
///
/// Returns `None` when the annual figure is at or below -100% or not finite.
pub fn monthly_growth_rate(annual_return_pct: f64) -> Option<f64> {
    let annual_factor = 1.0 + annual_return_pct / 100.0;
    if !annual_factor.is_finite() || annual_factor <= 0.0 {
        return None;
    }
    let rate = annual_factor.powf(1.0 / MONTHS_PER_YEAR as f64) - 1.0;
    rate.is_finite().then_some(rate)
}

fn category_monthly_base(monthly_base: f64, line: &AllocationLine) -> f64 {
    monthly_base * line.allocation_pct as f64 / 100.0
}
