use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    #[serde(alias = "debtMf", alias = "debt_mf", alias = "Debt MF")]
    DebtMf,
    #[serde(alias = "goldEtf", alias = "gold_etf", alias = "Gold ETF")]
    GoldEtf,
    #[serde(rename = "nifty-50", alias = "nifty50", alias = "nifty_50", alias = "Nifty 50")]
    Nifty50,
    #[serde(alias = "flexiCap", alias = "flexi_cap", alias = "Flexi Cap")]
    FlexiCap,
    #[serde(alias = "midCap", alias = "mid_cap", alias = "Mid Cap")]
    MidCap,
    #[serde(alias = "smallCap", alias = "small_cap", alias = "Small Cap")]
    SmallCap,
}

impl AssetCategory {
    /// Display order used by presets, tables and the CLI.
    pub const ALL: [AssetCategory; 6] = [
        AssetCategory::DebtMf,
        AssetCategory::GoldEtf,
        AssetCategory::Nifty50,
        AssetCategory::FlexiCap,
        AssetCategory::MidCap,
        AssetCategory::SmallCap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::DebtMf => "Debt MF",
            AssetCategory::GoldEtf => "Gold ETF",
            AssetCategory::Nifty50 => "Nifty 50",
            AssetCategory::FlexiCap => "Flexi Cap",
            AssetCategory::MidCap => "Mid Cap",
            AssetCategory::SmallCap => "Small Cap",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            AssetCategory::DebtMf => "debt-mf",
            AssetCategory::GoldEtf => "gold-etf",
            AssetCategory::Nifty50 => "nifty-50",
            AssetCategory::FlexiCap => "flexi-cap",
            AssetCategory::MidCap => "mid-cap",
            AssetCategory::SmallCap => "small-cap",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Self::ALL.into_iter().find(|category| {
            category.slug() == normalized || category.slug().replace('-', "") == normalized
        })
    }
}

/// One category's share of the monthly contribution and its assumed annual return.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationLine {
    pub category: AssetCategory,
    pub allocation_pct: u32,
    pub annual_return_pct: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub monthly_base: f64,
    pub tenure_years: u32,
    pub step_up_pct: f64,
    pub lines: Vec<AllocationLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category: AssetCategory,
    pub final_value: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Portfolio value after month `i + 1`, one entry per simulated month.
    pub monthly_totals: Vec<f64>,
    pub category_results: Vec<CategoryResult>,
    pub total_invested: f64,
}

impl SimulationOutput {
    pub fn final_corpus(&self) -> f64 {
        self.monthly_totals.last().copied().unwrap_or(0.0)
    }

    /// Portfolio value at the end of each year.
    pub fn yearly_totals(&self) -> Vec<f64> {
        self.monthly_totals
            .iter()
            .skip(11)
            .step_by(12)
            .copied()
            .collect()
    }
}
