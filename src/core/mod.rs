mod engine;
mod format;
mod plan;
mod returns;
mod summary;
mod types;

pub use engine::{MONTHS_PER_YEAR, SimulationError, monthly_growth_rate, simulate};
pub use format::{Formatter, RupeeFormatter};
pub use plan::{
    AllocationPlan, ContributionSchedule, PlanError, PlannedProjection, ResolvedLine, RiskProfile,
    build_lines, project,
};
pub use returns::{
    DEFAULT_MANUAL_RETURN_PCT, FallbackReturns, ManualReturns, NavHistoryReturns, ReturnEstimate,
    ReturnSource, ReturnSourceError,
};
pub use summary::{DEFAULT_INFLATION_PCT, ProjectionSummary};
pub use types::{AllocationLine, AssetCategory, CategoryResult, SimulationInput, SimulationOutput};
