use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::engine::{SimulationError, simulate};
use super::returns::{ReturnSource, ReturnSourceError};
use super::types::{AllocationLine, AssetCategory, SimulationInput, SimulationOutput};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("allocations must total 100%, got {0}%")]
    AllocationTotal(u32),
    #[error(transparent)]
    Return(#[from] ReturnSourceError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 3] = [
        RiskProfile::Conservative,
        RiskProfile::Balanced,
        RiskProfile::Aggressive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskProfile::Conservative => "Conservative",
            RiskProfile::Balanced => "Balanced",
            RiskProfile::Aggressive => "Aggressive",
        }
    }

    /// Preset percentages in `AssetCategory::ALL` order.
    pub fn preset(self) -> [u32; 6] {
        match self {
            RiskProfile::Conservative => [60, 10, 20, 10, 0, 0],
            RiskProfile::Balanced => [30, 10, 30, 20, 5, 5],
            RiskProfile::Aggressive => [10, 5, 25, 20, 20, 20],
        }
    }
}

/// Caller-owned allocation table, seeded from a risk profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    profile: RiskProfile,
    allocations: BTreeMap<AssetCategory, u32>,
}

impl AllocationPlan {
    pub fn from_profile(profile: RiskProfile) -> Self {
        let allocations = AssetCategory::ALL
            .into_iter()
            .zip(profile.preset())
            .collect();
        Self {
            profile,
            allocations,
        }
    }

    pub fn with_allocation(mut self, category: AssetCategory, pct: u32) -> Self {
        self.set_allocation(category, pct);
        self
    }

    pub fn set_allocation(&mut self, category: AssetCategory, pct: u32) {
        self.allocations.insert(category, pct);
    }

    pub fn profile(&self) -> RiskProfile {
        self.profile
    }

    pub fn allocation(&self, category: AssetCategory) -> u32 {
        self.allocations.get(&category).copied().unwrap_or(0)
    }

    pub fn total_pct(&self) -> u32 {
        self.allocations.values().sum()
    }

    pub fn ensure_complete(&self) -> Result<(), PlanError> {
        match self.total_pct() {
            100 => Ok(()),
            total => Err(PlanError::AllocationTotal(total)),
        }
    }
}

impl Default for AllocationPlan {
    fn default() -> Self {
        Self::from_profile(RiskProfile::default())
    }
}

/// An allocation line together with the history window its return came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub line: AllocationLine,
    pub window_years: u32,
}

/// Resolves a return for every category of the plan, in display order.
pub fn build_lines(
    plan: &AllocationPlan,
    source: &dyn ReturnSource,
    tenure_years: u32,
) -> Result<Vec<ResolvedLine>, PlanError> {
    AssetCategory::ALL
        .into_iter()
        .map(|category| -> Result<ResolvedLine, PlanError> {
            let estimate = source.annual_return(category, tenure_years)?;
            Ok(ResolvedLine {
                line: AllocationLine {
                    category,
                    allocation_pct: plan.allocation(category),
                    annual_return_pct: estimate.annual_return_pct,
                },
                window_years: estimate.window_years,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ContributionSchedule {
    pub monthly_base: f64,
    pub tenure_years: u32,
    pub step_up_pct: f64,
}

#[derive(Debug, Clone)]
pub struct PlannedProjection {
    pub lines: Vec<ResolvedLine>,
    pub output: SimulationOutput,
}

/// Checks the plan totals 100%, resolves returns and runs the simulation.
pub fn project(
    plan: &AllocationPlan,
    source: &dyn ReturnSource,
    schedule: ContributionSchedule,
) -> Result<PlannedProjection, PlanError> {
    plan.ensure_complete()?;
    let lines = build_lines(plan, source, schedule.tenure_years)?;
    let input = SimulationInput {
        monthly_base: schedule.monthly_base,
        tenure_years: schedule.tenure_years,
        step_up_pct: schedule.step_up_pct,
        lines: lines.iter().map(|resolved| resolved.line.clone()).collect(),
    };
    let output = simulate(&input)?;
    Ok(PlannedProjection { lines, output })
}
