use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use super::types::AssetCategory;

/// Fallback assumption for categories without an explicit manual rate.
pub const DEFAULT_MANUAL_RETURN_PCT: f64 = 12.0;

#[derive(Debug, Error)]
pub enum ReturnSourceError {
    #[error("no return data for {}", .0.label())]
    UnknownCategory(AssetCategory),
    #[error("{} needs at least two yearly NAV points, found {points}", .category.label())]
    InsufficientHistory {
        category: AssetCategory,
        points: usize,
    },
    #[error("{} has an invalid NAV value {value}", .category.label())]
    InvalidNav { category: AssetCategory, value: f64 },
    #[error("failed to read NAV history: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse NAV history: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Annual return assumption and the number of historical years behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnEstimate {
    pub annual_return_pct: f64,
    pub window_years: u32,
}

/// Supplies a per-category annual return for a given investment tenure.
pub trait ReturnSource: Send + Sync {
    fn annual_return(
        &self,
        category: AssetCategory,
        tenure_years: u32,
    ) -> Result<ReturnEstimate, ReturnSourceError>;
}

impl<T: ReturnSource + ?Sized> ReturnSource for &T {
    fn annual_return(
        &self,
        category: AssetCategory,
        tenure_years: u32,
    ) -> Result<ReturnEstimate, ReturnSourceError> {
        (**self).annual_return(category, tenure_years)
    }
}

/// Static, user-entered return assumptions.
#[derive(Debug, Clone)]
pub struct ManualReturns {
    rates: BTreeMap<AssetCategory, f64>,
    default_pct: f64,
}

impl ManualReturns {
    pub fn new(default_pct: f64) -> Self {
        Self {
            rates: BTreeMap::new(),
            default_pct,
        }
    }

    pub fn with_rate(mut self, category: AssetCategory, annual_return_pct: f64) -> Self {
        self.rates.insert(category, annual_return_pct);
        self
    }

    pub fn set_rate(&mut self, category: AssetCategory, annual_return_pct: f64) {
        self.rates.insert(category, annual_return_pct);
    }
}

impl Default for ManualReturns {
    fn default() -> Self {
        Self::new(DEFAULT_MANUAL_RETURN_PCT)
    }
}

impl ReturnSource for ManualReturns {
    fn annual_return(
        &self,
        category: AssetCategory,
        tenure_years: u32,
    ) -> Result<ReturnEstimate, ReturnSourceError> {
        let annual_return_pct = self
            .rates
            .get(&category)
            .copied()
            .unwrap_or(self.default_pct);
        Ok(ReturnEstimate {
            annual_return_pct,
            window_years: tenure_years,
        })
    }
}

/// CAGR derived from year-end NAV history, oldest point first.
///
/// The lookback window is capped by the history on record, so a 20-year
/// request against 8 years of data reports an 8-year CAGR.
#[derive(Debug, Clone, Default)]
pub struct NavHistoryReturns {
    history: BTreeMap<AssetCategory, Vec<f64>>,
}

impl NavHistoryReturns {
    pub fn new(history: BTreeMap<AssetCategory, Vec<f64>>) -> Self {
        Self { history }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ReturnSourceError> {
        let history = serde_json::from_str::<BTreeMap<AssetCategory, Vec<f64>>>(json)?;
        Ok(Self::new(history))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReturnSourceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let source = Self::from_json_str(&raw)?;
        debug!(
            path = %path.display(),
            categories = source.history.len(),
            "loaded NAV history"
        );
        Ok(source)
    }

    pub fn insert(&mut self, category: AssetCategory, year_end_navs: Vec<f64>) {
        self.history.insert(category, year_end_navs);
    }
}

impl ReturnSource for NavHistoryReturns {
    fn annual_return(
        &self,
        category: AssetCategory,
        tenure_years: u32,
    ) -> Result<ReturnEstimate, ReturnSourceError> {
        let navs = self
            .history
            .get(&category)
            .ok_or(ReturnSourceError::UnknownCategory(category))?;
        if navs.len() < 2 {
            return Err(ReturnSourceError::InsufficientHistory {
                category,
                points: navs.len(),
            });
        }
        if let Some(&value) = navs.iter().find(|nav| !nav.is_finite() || **nav <= 0.0) {
            return Err(ReturnSourceError::InvalidNav { category, value });
        }

        let available_years = (navs.len() - 1) as u32;
        let window_years = tenure_years.clamp(1, available_years);
        let latest = navs[navs.len() - 1];
        let start = navs[navs.len() - 1 - window_years as usize];
        let cagr = (latest / start).powf(1.0 / window_years as f64) - 1.0;

        Ok(ReturnEstimate {
            annual_return_pct: round_to_cents(cagr * 100.0),
            window_years,
        })
    }
}

/// Uses `primary` and falls back to `fallback` whenever the primary lookup fails.
#[derive(Debug, Clone)]
pub struct FallbackReturns<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackReturns<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: ReturnSource, F: ReturnSource> ReturnSource for FallbackReturns<P, F> {
    fn annual_return(
        &self,
        category: AssetCategory,
        tenure_years: u32,
    ) -> Result<ReturnEstimate, ReturnSourceError> {
        match self.primary.annual_return(category, tenure_years) {
            Ok(estimate) => Ok(estimate),
            Err(err) => {
                warn!(
                    category = category.label(),
                    error = %err,
                    "primary return source failed, using fallback"
                );
                self.fallback.annual_return(category, tenure_years)
            }
        }
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
