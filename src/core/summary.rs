use serde::Serialize;

use super::types::SimulationOutput;

/// Long-run consumer inflation assumption used to deflate the final corpus.
pub const DEFAULT_INFLATION_PCT: f64 = 6.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub final_corpus: f64,
    pub total_invested: f64,
    pub wealth_gain: f64,
    pub absolute_profit_pct: f64,
    pub multiplier: f64,
    pub inflation_pct: f64,
    /// Final corpus in today's purchasing power.
    pub real_value: f64,
    pub yearly_values: Vec<f64>,
}

impl ProjectionSummary {
    /// Returns `None` when nothing was invested, since the ratios are undefined.
    pub fn from_output(
        output: &SimulationOutput,
        tenure_years: u32,
        inflation_pct: f64,
    ) -> Option<Self> {
        if output.total_invested <= 0.0 {
            return None;
        }
        let final_corpus = output.final_corpus();
        let total_invested = output.total_invested;
        let wealth_gain = final_corpus - total_invested;
        let deflator = (1.0 + inflation_pct / 100.0).powi(tenure_years as i32);

        Some(Self {
            final_corpus,
            total_invested,
            wealth_gain,
            absolute_profit_pct: wealth_gain / total_invested * 100.0,
            multiplier: final_corpus / total_invested,
            inflation_pct,
            real_value: final_corpus / deflator,
            yearly_values: output.yearly_totals(),
        })
    }

    /// Whether the corpus, deflated to today's money, is still worth more than
    /// what was paid in.
    pub fn outpaces_inflation(&self) -> bool {
        self.real_value > self.total_invested
    }
}
