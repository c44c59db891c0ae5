use axum::{
    Router,
    body::Bytes,
    extract::{Json, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum, error::ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    AllocationPlan, AssetCategory, ContributionSchedule, DEFAULT_INFLATION_PCT,
    DEFAULT_MANUAL_RETURN_PCT, FallbackReturns, Formatter, ManualReturns, NavHistoryReturns,
    PlannedProjection, ProjectionSummary, ReturnSource, RiskProfile, RupeeFormatter, project,
};

const MAX_TENURE_YEARS: u32 = 50;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl From<CliRiskProfile> for RiskProfile {
    fn from(value: CliRiskProfile) -> Self {
        match value {
            CliRiskProfile::Conservative => RiskProfile::Conservative,
            CliRiskProfile::Balanced => RiskProfile::Balanced,
            CliRiskProfile::Aggressive => RiskProfile::Aggressive,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRiskProfile {
    #[serde(alias = "Conservative", alias = "safe")]
    Conservative,
    #[serde(alias = "Balanced", alias = "moderate")]
    Balanced,
    #[serde(alias = "Aggressive", alias = "growth")]
    Aggressive,
}

impl From<ApiRiskProfile> for CliRiskProfile {
    fn from(value: ApiRiskProfile) -> Self {
        match value {
            ApiRiskProfile::Conservative => CliRiskProfile::Conservative,
            ApiRiskProfile::Balanced => CliRiskProfile::Balanced,
            ApiRiskProfile::Aggressive => CliRiskProfile::Aggressive,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    monthly_sip: Option<f64>,
    tenure_years: Option<u32>,
    step_up: Option<f64>,
    profile: Option<ApiRiskProfile>,

    debt_mf: Option<u32>,
    gold_etf: Option<u32>,
    nifty50: Option<u32>,
    flexi_cap: Option<u32>,
    mid_cap: Option<u32>,
    small_cap: Option<u32>,

    debt_mf_return: Option<f64>,
    gold_etf_return: Option<f64>,
    nifty50_return: Option<f64>,
    flexi_cap_return: Option<f64>,
    mid_cap_return: Option<f64>,
    small_cap_return: Option<f64>,
    default_return: Option<f64>,

    use_history: Option<bool>,
    inflation_rate: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "sip-planner",
    about = "Step-up SIP projection across debt, gold and equity categories"
)]
struct Cli {
    #[arg(long, default_value_t = 20000.0, help = "Total monthly SIP amount")]
    monthly_sip: f64,
    #[arg(long, default_value_t = 15, help = "Investment tenure in years (1-50)")]
    tenure_years: u32,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Annual increase of the monthly SIP in percent"
    )]
    step_up: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRiskProfile::Balanced,
        help = "Preset allocation the overrides are applied on top of"
    )]
    profile: CliRiskProfile,
    #[arg(
        long = "allocation",
        value_parser = parse_allocation,
        help = "Override one category's share in percent, e.g. mid-cap=10 (repeatable)"
    )]
    allocations: Vec<(AssetCategory, u32)>,
    #[arg(
        long = "return-rate",
        value_parser = parse_return_rate,
        help = "Manual expected annual return in percent, e.g. gold-etf=9.5 (repeatable)"
    )]
    return_rates: Vec<(AssetCategory, f64)>,
    #[arg(
        long,
        default_value_t = DEFAULT_MANUAL_RETURN_PCT,
        help = "Annual return in percent for categories without --return-rate"
    )]
    default_return: f64,
    #[arg(
        long,
        help = "JSON file of year-end NAVs per category; historical CAGR replaces manual returns where available"
    )]
    nav_history: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = DEFAULT_INFLATION_PCT,
        help = "Expected annual inflation in percent for the real-value figure"
    )]
    inflation_rate: f64,
    #[arg(long, help = "Print the projection as JSON")]
    json: bool,
}

#[derive(Debug)]
struct PlanRequest {
    plan: AllocationPlan,
    manual_returns: ManualReturns,
    schedule: ContributionSchedule,
    inflation_pct: f64,
    use_history: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownRow {
    category: AssetCategory,
    label: &'static str,
    allocation_pct: u32,
    return_pct: f64,
    window_years: u32,
    maturity_value: f64,
    maturity_display: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormattedSummary {
    final_corpus: String,
    total_invested: String,
    wealth_gain: String,
    real_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    profile: RiskProfile,
    monthly_sip: f64,
    tenure_years: u32,
    step_up: f64,
    summary: ProjectionSummary,
    formatted: FormattedSummary,
    breakdown: Vec<BreakdownRow>,
    monthly_totals: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileAllocation {
    category: AssetCategory,
    label: &'static str,
    allocation_pct: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    profile: RiskProfile,
    allocations: Vec<ProfileAllocation>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default)]
struct AppState {
    nav_history: Option<NavHistoryReturns>,
}

fn parse_allocation(raw: &str) -> Result<(AssetCategory, u32), String> {
    let (category, value) = split_category_pair(raw)?;
    let pct = value
        .parse::<u32>()
        .map_err(|_| format!("invalid allocation percent '{value}'"))?;
    Ok((category, pct))
}

fn parse_return_rate(raw: &str) -> Result<(AssetCategory, f64), String> {
    let (category, value) = split_category_pair(raw)?;
    let pct = value
        .parse::<f64>()
        .map_err(|_| format!("invalid return percent '{value}'"))?;
    Ok((category, pct))
}

fn split_category_pair(raw: &str) -> Result<(AssetCategory, &str), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=VALUE, got '{raw}'"))?;
    let category = AssetCategory::from_slug(name).ok_or_else(|| {
        let known: Vec<&str> = AssetCategory::ALL.iter().map(|c| c.slug()).collect();
        format!("unknown category '{name}', expected one of {}", known.join(", "))
    })?;
    Ok((category, value.trim()))
}

fn build_request(cli: &Cli) -> Result<PlanRequest, String> {
    if !cli.monthly_sip.is_finite() || cli.monthly_sip <= 0.0 {
        return Err("--monthly-sip must be > 0".to_string());
    }

    if !(1..=MAX_TENURE_YEARS).contains(&cli.tenure_years) {
        return Err(format!(
            "--tenure-years must be between 1 and {MAX_TENURE_YEARS}"
        ));
    }

    if !(0.0..=100.0).contains(&cli.step_up) {
        return Err("--step-up must be between 0 and 100".to_string());
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate <= -100.0 {
        return Err("--inflation-rate must be > -100".to_string());
    }

    if !valid_return_pct(cli.default_return) {
        return Err("--default-return must be > -100 and <= 100".to_string());
    }

    let mut plan = AllocationPlan::from_profile(cli.profile.into());
    for &(category, pct) in &cli.allocations {
        if pct > 100 {
            return Err(format!(
                "--allocation for {} must be between 0 and 100",
                category.slug()
            ));
        }
        plan.set_allocation(category, pct);
    }
    plan.ensure_complete().map_err(|e| e.to_string())?;

    let mut manual_returns = ManualReturns::new(cli.default_return);
    for &(category, pct) in &cli.return_rates {
        if !valid_return_pct(pct) {
            return Err(format!(
                "--return-rate for {} must be > -100 and <= 100",
                category.slug()
            ));
        }
        manual_returns.set_rate(category, pct);
    }

    Ok(PlanRequest {
        plan,
        manual_returns,
        schedule: ContributionSchedule {
            monthly_base: cli.monthly_sip,
            tenure_years: cli.tenure_years,
            step_up_pct: cli.step_up,
        },
        inflation_pct: cli.inflation_rate,
        use_history: cli.nav_history.is_some(),
    })
}

fn valid_return_pct(pct: f64) -> bool {
    pct.is_finite() && pct > -100.0 && pct <= 100.0
}

fn run_projection(
    request: &PlanRequest,
    nav_history: Option<&NavHistoryReturns>,
) -> Result<ProjectionResponse, String> {
    let projection = match nav_history.filter(|_| request.use_history) {
        Some(history) => {
            let source = FallbackReturns::new(history, &request.manual_returns);
            run_plan(request, &source)?
        }
        None => run_plan(request, &request.manual_returns)?,
    };

    let tenure_years = request.schedule.tenure_years;
    let summary =
        ProjectionSummary::from_output(&projection.output, tenure_years, request.inflation_pct)
            .ok_or_else(|| "projection invested nothing; raise --monthly-sip".to_string())?;

    let formatter = RupeeFormatter;
    let breakdown = projection
        .lines
        .iter()
        .zip(projection.output.category_results.iter())
        .map(|(resolved, result)| BreakdownRow {
            category: result.category,
            label: result.category.label(),
            allocation_pct: resolved.line.allocation_pct,
            return_pct: resolved.line.annual_return_pct,
            window_years: resolved.window_years,
            maturity_value: result.final_value,
            maturity_display: formatter.format_amount(result.final_value),
        })
        .collect();
    let formatted = FormattedSummary {
        final_corpus: formatter.format_amount(summary.final_corpus),
        total_invested: formatter.format_amount(summary.total_invested),
        wealth_gain: formatter.format_amount(summary.wealth_gain),
        real_value: formatter.format_amount(summary.real_value),
    };

    Ok(ProjectionResponse {
        profile: request.plan.profile(),
        monthly_sip: request.schedule.monthly_base,
        tenure_years,
        step_up: request.schedule.step_up_pct,
        summary,
        formatted,
        breakdown,
        monthly_totals: projection.output.monthly_totals,
    })
}

fn run_plan(request: &PlanRequest, source: &dyn ReturnSource) -> Result<PlannedProjection, String> {
    project(&request.plan, source, request.schedule).map_err(|e| e.to_string())
}

/// Parses CLI arguments, runs one projection and renders it as text or JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => return Err(e.to_string().trim_end().to_string()),
    };
    render_cli(&cli)
}

fn render_cli(cli: &Cli) -> Result<String, String> {
    let request = build_request(cli)?;
    let nav_history = cli
        .nav_history
        .as_ref()
        .map(NavHistoryReturns::from_json_file)
        .transpose()
        .map_err(|e| format!("--nav-history: {e}"))?;
    let response = run_projection(&request, nav_history.as_ref())?;
    info!(
        profile = ?response.profile,
        tenure_years = response.tenure_years,
        final_corpus = response.summary.final_corpus,
        "projection complete"
    );

    if cli.json {
        serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode JSON: {e}"))
    } else {
        Ok(render_text(&response))
    }
}

fn render_text(response: &ProjectionResponse) -> String {
    let summary = &response.summary;
    let formatter = RupeeFormatter;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} plan: {} monthly for {} years, {}% yearly step-up",
        response.profile.label(),
        formatter.format_amount(response.monthly_sip),
        response.tenure_years,
        response.step_up
    );
    let _ = writeln!(out, "Final corpus     {}", response.formatted.final_corpus);
    let _ = writeln!(out, "Total invested   {}", response.formatted.total_invested);
    let _ = writeln!(out, "Wealth gain      {}", response.formatted.wealth_gain);
    let _ = writeln!(out, "Absolute profit  {:.1}%", summary.absolute_profit_pct);
    let _ = writeln!(out, "Multiplier       {:.1}x", summary.multiplier);
    let _ = writeln!(
        out,
        "Today's money    {} at {}% inflation",
        response.formatted.real_value, summary.inflation_pct
    );
    let _ = writeln!(
        out,
        "Outlook          {}",
        if summary.outpaces_inflation() {
            "ahead of inflation"
        } else {
            "behind inflation"
        }
    );

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<10} {:>10} {:>12} {:>8} {:>18}",
        "Category", "Allocation", "Return", "Window", "Maturity value"
    );
    for row in &response.breakdown {
        let _ = writeln!(
            out,
            "{:<10} {:>9}% {:>11.2}% {:>7}y {:>18}",
            row.label, row.allocation_pct, row.return_pct, row.window_years, row.maturity_display
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<6} {:>18}", "Year", "Portfolio value");
    for (idx, value) in summary.yearly_values.iter().enumerate() {
        let _ = writeln!(out, "{:<6} {:>18}", idx + 1, formatter.format_amount(*value));
    }
    out
}

pub async fn run_http_server(
    port: u16,
    nav_history: Option<NavHistoryReturns>,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(AppState { nav_history }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "SIP planner HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/profiles", get(profiles_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn profiles_handler() -> Response {
    let profiles: Vec<ProfileResponse> = RiskProfile::ALL
        .into_iter()
        .map(|profile| ProfileResponse {
            profile,
            allocations: AssetCategory::ALL
                .into_iter()
                .zip(profile.preset())
                .map(|(category, allocation_pct)| ProfileAllocation {
                    category,
                    label: category.label(),
                    allocation_pct,
                })
                .collect(),
        })
        .collect();
    json_response(StatusCode::OK, profiles)
}

async fn simulate_get_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    let has_history = state.nav_history.is_some();
    let request = query
        .map_err(|rejection| format!("Invalid API query: {}", rejection.body_text()))
        .and_then(|Query(payload)| {
            debug!(?payload, "simulate query");
            api_request_from_payload(payload, has_history)
        });
    simulate_handler_impl(&state, request)
}

async fn simulate_post_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let has_history = state.nav_history.is_some();
    simulate_handler_impl(&state, api_request_from_json(&body, has_history))
}

fn simulate_handler_impl(state: &AppState, request: Result<PlanRequest, String>) -> Response {
    let request = match request {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match run_projection(&request, state.nav_history.as_ref()) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!(error = %msg, "simulation failed");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn with_cache_control(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)).into_response())
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn api_request_from_json(json: &[u8], has_history: bool) -> Result<PlanRequest, String> {
    let payload = serde_json::from_slice::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    debug!(?payload, "simulate body");
    api_request_from_payload(payload, has_history)
}

fn api_request_from_payload(
    payload: SimulatePayload,
    has_history: bool,
) -> Result<PlanRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.monthly_sip {
        cli.monthly_sip = v;
    }
    if let Some(v) = payload.tenure_years {
        cli.tenure_years = v;
    }
    if let Some(v) = payload.step_up {
        cli.step_up = v;
    }
    if let Some(v) = payload.profile {
        cli.profile = v.into();
    }

    for (category, value) in [
        (AssetCategory::DebtMf, payload.debt_mf),
        (AssetCategory::GoldEtf, payload.gold_etf),
        (AssetCategory::Nifty50, payload.nifty50),
        (AssetCategory::FlexiCap, payload.flexi_cap),
        (AssetCategory::MidCap, payload.mid_cap),
        (AssetCategory::SmallCap, payload.small_cap),
    ] {
        if let Some(v) = value {
            cli.allocations.push((category, v));
        }
    }

    for (category, value) in [
        (AssetCategory::DebtMf, payload.debt_mf_return),
        (AssetCategory::GoldEtf, payload.gold_etf_return),
        (AssetCategory::Nifty50, payload.nifty50_return),
        (AssetCategory::FlexiCap, payload.flexi_cap_return),
        (AssetCategory::MidCap, payload.mid_cap_return),
        (AssetCategory::SmallCap, payload.small_cap_return),
    ] {
        if let Some(v) = value {
            cli.return_rates.push((category, v));
        }
    }
    if let Some(v) = payload.default_return {
        cli.default_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }

    let mut request = build_request(&cli)?;
    request.use_history = has_history && payload.use_history.unwrap_or(true);
    Ok(request)
}

fn default_cli_for_api() -> Cli {
    Cli {
        monthly_sip: 20000.0,
        tenure_years: 15,
        step_up: 10.0,
        profile: CliRiskProfile::Balanced,
        allocations: Vec::new(),
        return_rates: Vec::new(),
        default_return: DEFAULT_MANUAL_RETURN_PCT,
        nav_history: None,
        inflation_rate: DEFAULT_INFLATION_PCT,
        json: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn sample_history() -> NavHistoryReturns {
        let mut history = NavHistoryReturns::default();
        history.insert(AssetCategory::Nifty50, vec![100.0, 120.0]);
        history
    }

    #[test]
    fn cli_defaults_match_api_defaults() {
        let parsed = Cli::parse_from(["sip-planner"]);
        let defaults = default_cli_for_api();
        assert_approx(parsed.monthly_sip, defaults.monthly_sip);
        assert_eq!(parsed.tenure_years, defaults.tenure_years);
        assert_approx(parsed.step_up, defaults.step_up);
        assert_eq!(parsed.profile, defaults.profile);
        assert_approx(parsed.default_return, defaults.default_return);
        assert_approx(parsed.inflation_rate, defaults.inflation_rate);
        assert!(parsed.allocations.is_empty());
        assert!(!parsed.json);
    }

    #[test]
    fn cli_parses_repeatable_overrides() {
        let cli = Cli::parse_from([
            "sip-planner",
            "--profile",
            "aggressive",
            "--allocation",
            "mid-cap=15",
            "--allocation",
            "small_cap=25",
            "--return-rate",
            "Gold ETF=9.5",
        ]);
        assert_eq!(cli.profile, CliRiskProfile::Aggressive);
        assert_eq!(
            cli.allocations,
            vec![(AssetCategory::MidCap, 15), (AssetCategory::SmallCap, 25)]
        );
        assert_eq!(cli.return_rates, vec![(AssetCategory::GoldEtf, 9.5)]);

        let request = build_request(&cli).expect("aggressive with swap still totals 100");
        assert_eq!(request.plan.allocation(AssetCategory::MidCap), 15);
        assert_eq!(request.plan.allocation(AssetCategory::SmallCap), 25);
    }

    #[test]
    fn allocation_parser_rejects_unknown_category() {
        let err = parse_allocation("crypto=10").expect_err("unknown category");
        assert!(err.contains("unknown category 'crypto'"));
        assert!(parse_allocation("mid-cap").is_err());
        assert!(parse_allocation("mid-cap=ten").is_err());
    }

    #[test]
    fn build_request_rejects_allocation_not_totalling_hundred() {
        let mut cli = sample_cli();
        cli.allocations.push((AssetCategory::DebtMf, 40));

        let err = build_request(&cli).expect_err("110% must fail");
        assert_eq!(err, "allocations must total 100%, got 110%");
    }

    #[test]
    fn build_request_rejects_zero_sip() {
        let mut cli = sample_cli();
        cli.monthly_sip = 0.0;
        let err = build_request(&cli).expect_err("zero sip must fail");
        assert!(err.contains("--monthly-sip"));
    }

    #[test]
    fn build_request_rejects_tenure_out_of_range() {
        for tenure in [0, 51] {
            let mut cli = sample_cli();
            cli.tenure_years = tenure;
            let err = build_request(&cli).expect_err("tenure out of range must fail");
            assert!(err.contains("--tenure-years"));
        }
    }

    #[test]
    fn build_request_rejects_return_outside_domain() {
        let mut cli = sample_cli();
        cli.return_rates.push((AssetCategory::SmallCap, -100.0));
        let err = build_request(&cli).expect_err("-100% must fail");
        assert!(err.contains("--return-rate for small-cap"));

        let mut cli = sample_cli();
        cli.default_return = f64::NAN;
        assert!(build_request(&cli).is_err());
    }

    #[test]
    fn build_request_carries_manual_returns() {
        let mut cli = sample_cli();
        cli.default_return = 8.0;
        cli.return_rates.push((AssetCategory::Nifty50, 13.0));
        let request = build_request(&cli).expect("valid");
        let nifty = request
            .manual_returns
            .annual_return(AssetCategory::Nifty50, 15)
            .expect("manual");
        let debt = request
            .manual_returns
            .annual_return(AssetCategory::DebtMf, 15)
            .expect("manual");
        assert_approx(nifty.annual_return_pct, 13.0);
        assert_approx(debt.annual_return_pct, 8.0);
        assert!(!request.use_history);
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let request = api_request_from_json(
            br#"{
                "monthlySip": 15000,
                "tenureYears": 20,
                "stepUp": 5,
                "profile": "Conservative",
                "debtMf": 50,
                "smallCap": 10,
                "goldEtfReturn": 9.5,
                "defaultReturn": 11,
                "inflationRate": 5
            }"#,
            false,
        )
        .expect("valid payload");

        assert_approx(request.schedule.monthly_base, 15_000.0);
        assert_eq!(request.schedule.tenure_years, 20);
        assert_approx(request.schedule.step_up_pct, 5.0);
        assert_eq!(request.plan.profile(), RiskProfile::Conservative);
        assert_eq!(request.plan.allocation(AssetCategory::DebtMf), 50);
        assert_eq!(request.plan.allocation(AssetCategory::SmallCap), 10);
        assert_approx(request.inflation_pct, 5.0);
        let gold = request
            .manual_returns
            .annual_return(AssetCategory::GoldEtf, 20)
            .expect("manual");
        assert_approx(gold.annual_return_pct, 9.5);
    }

    #[test]
    fn api_request_uses_history_only_when_available_and_enabled() {
        let enabled = api_request_from_json(b"{}", true).expect("defaults");
        assert!(enabled.use_history);

        let disabled = api_request_from_json(br#"{"useHistory": false}"#, true).expect("defaults");
        assert!(!disabled.use_history);

        let unavailable =
            api_request_from_json(br#"{"useHistory": true}"#, false).expect("defaults");
        assert!(!unavailable.use_history);
    }

    #[test]
    fn api_request_rejects_bad_json() {
        let err = api_request_from_json(br#"{"tenureYears": "ten"}"#, false)
            .expect_err("must reject");
        assert!(err.starts_with("Invalid API JSON payload"));
    }

    #[test]
    fn projection_response_reports_breakdown_and_summary() {
        let request = build_request(&sample_cli()).expect("defaults are valid");
        let response = run_projection(&request, None).expect("projection");

        assert_eq!(response.breakdown.len(), 6);
        assert_eq!(response.monthly_totals.len(), 15 * 12);
        assert_eq!(response.summary.yearly_values.len(), 15);
        let summed: f64 = response.breakdown.iter().map(|row| row.maturity_value).sum();
        assert!((summed - response.summary.final_corpus).abs() <= 1e-6 * summed);
        assert!(response.formatted.final_corpus.starts_with('₹'));
        for row in &response.breakdown {
            assert_eq!(row.window_years, 15);
            assert_approx(row.return_pct, DEFAULT_MANUAL_RETURN_PCT);
        }
    }

    #[test]
    fn projection_prefers_history_and_falls_back_to_manual() {
        let mut request = build_request(&sample_cli()).expect("defaults are valid");
        request.use_history = true;
        let history = sample_history();
        let response = run_projection(&request, Some(&history)).expect("projection");

        let nifty = response
            .breakdown
            .iter()
            .find(|row| row.category == AssetCategory::Nifty50)
            .expect("nifty row");
        assert_approx(nifty.return_pct, 20.0);
        assert_eq!(nifty.window_years, 1);

        let debt = &response.breakdown[0];
        assert_approx(debt.return_pct, DEFAULT_MANUAL_RETURN_PCT);
        assert_eq!(debt.window_years, 15);
    }

    #[test]
    fn projection_ignores_history_when_disabled() {
        let request = build_request(&sample_cli()).expect("defaults are valid");
        let history = sample_history();
        let response = run_projection(&request, Some(&history)).expect("projection");
        assert!(
            response
                .breakdown
                .iter()
                .all(|row| (row.return_pct - DEFAULT_MANUAL_RETURN_PCT).abs() < EPS)
        );
    }

    #[test]
    fn response_serialization_contains_expected_fields() {
        let request = build_request(&sample_cli()).expect("defaults are valid");
        let response = run_projection(&request, None).expect("projection");
        let json = serde_json::to_value(&response).expect("serializable");

        assert_eq!(json["profile"], "balanced");
        assert_eq!(json["tenureYears"], 15);
        for key in [
            "finalCorpus",
            "totalInvested",
            "wealthGain",
            "absoluteProfitPct",
            "multiplier",
            "realValue",
            "yearlyValues",
        ] {
            assert!(json["summary"].get(key).is_some(), "missing summary.{key}");
        }
        assert_eq!(json["breakdown"][2]["category"], "nifty-50");
        assert_eq!(json["breakdown"][2]["label"], "Nifty 50");
        assert!(json["formatted"]["realValue"].is_string());
    }

    #[test]
    fn text_rendering_lists_every_category_and_year() {
        let mut cli = sample_cli();
        cli.tenure_years = 3;
        let text = render_cli(&cli).expect("render");
        for category in AssetCategory::ALL {
            assert!(text.contains(category.label()), "missing {category:?}");
        }
        assert!(text.contains("Final corpus"));
        assert!(text.contains("Balanced plan"));
        assert_eq!(
            text.lines()
                .filter(|line| line.trim_start().starts_with(['1', '2', '3']))
                .count(),
            3
        );
    }

    #[test]
    fn json_rendering_is_valid_json() {
        let mut cli = sample_cli();
        cli.json = true;
        let text = render_cli(&cli).expect("render");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["monthlyTotals"].as_array().map(Vec::len), Some(180));
    }

    #[test]
    fn run_cli_reports_unknown_flags_as_errors() {
        let err = run_cli(["sip-planner", "--monthly-sipp", "5000"]).expect_err("unknown flag");
        assert!(err.contains("--monthly-sipp"), "{err}");

        let err = run_cli(["sip-planner", "--tenure-years", "many"]).expect_err("bad number");
        assert!(err.contains("--tenure-years"), "{err}");
    }

    #[test]
    fn run_cli_renders_with_parsed_flags() {
        let report = run_cli(["sip-planner", "--tenure-years", "2", "--profile", "aggressive"])
            .expect("valid flags");
        assert!(report.starts_with("Aggressive plan"));
    }

    async fn send(request: Request<Body>) -> (StatusCode, Option<HeaderValue>, serde_json::Value) {
        let response = router(Arc::new(AppState::default()))
            .oneshot(request)
            .await
            .expect("infallible service");
        let status = response.status();
        let cache = response.headers().get(header::CACHE_CONTROL).cloned();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = serde_json::from_slice(&bytes).expect("json body");
        (status, cache, json)
    }

    fn post_simulate(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/simulate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("valid request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request")
    }

    #[tokio::test]
    async fn post_with_mistyped_field_is_json_400() {
        let (status, cache, json) = send(post_simulate(r#"{"tenureYears": "ten"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        let msg = json["error"].as_str().expect("error message");
        assert!(msg.starts_with("Invalid API JSON payload"), "{msg}");
    }

    #[tokio::test]
    async fn post_with_truncated_body_is_json_400() {
        let (status, cache, json) = send(post_simulate(r#"{"monthlySip": 5000,"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn post_with_valid_body_projects() {
        let (status, cache, json) =
            send(post_simulate(r#"{"monthlySip": 5000, "tenureYears": 4}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        assert_eq!(json["tenureYears"], 4);
        assert_eq!(json["monthlyTotals"].as_array().map(Vec::len), Some(48));
    }

    #[tokio::test]
    async fn get_with_bad_query_is_json_400() {
        let (status, cache, json) = send(get_request("/api/simulate?tenureYears=ten")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        let msg = json["error"].as_str().expect("error message");
        assert!(msg.starts_with("Invalid API query"), "{msg}");
    }

    #[tokio::test]
    async fn get_with_invalid_tenure_is_json_400() {
        let (status, _, json) = send(get_request("/api/simulate?tenureYears=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().expect("message").contains("--tenure-years"));
    }

    #[tokio::test]
    async fn get_with_query_projects() {
        let (status, cache, json) =
            send(get_request("/api/simulate?monthlySip=10000&tenureYears=5&profile=aggressive")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        assert_eq!(json["profile"], "aggressive");
        assert_eq!(json["breakdown"].as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn profiles_lists_every_preset() {
        let (status, cache, json) = send(get_request("/api/profiles")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        let profiles = json.as_array().expect("array");
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[1]["profile"], "balanced");
        assert_eq!(profiles[1]["allocations"][2]["category"], "nifty-50");
        assert_eq!(profiles[1]["allocations"][2]["allocationPct"], 30);
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let (status, cache, json) = send(get_request("/api/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(cache, Some(HeaderValue::from_static("no-store")));
        assert_eq!(json, serde_json::json!({ "error": "Not found" }));
    }
}
