use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Multi-bookmaker +EV and arbitrage scanner
#[derive(Parser, Debug, Clone)]
#[command(name = "linescout", version, about)]
pub struct Config {
    /// Read game/quote snapshots from this JSON file
    #[arg(long, env = "SNAPSHOT_PATH")]
    pub snapshot_path: Option<String>,

    /// Fetch game/quote snapshots from this data-provider URL
    #[arg(long, env = "SNAPSHOT_URL")]
    pub snapshot_url: Option<String>,

    /// Results API listen address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    pub api_addr: String,

    /// SQLite database path for the flagged-record audit trail
    #[arg(long, env = "DATABASE_PATH", default_value = "linescout.db")]
    pub database_path: String,

    /// Refresh cycle interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "30")]
    pub poll_interval_secs: u64,

    /// Compute budget per refresh cycle in seconds; the cycle aborts past it
    #[arg(long, env = "CYCLE_TIMEOUT_SECS", default_value = "10")]
    pub cycle_timeout_secs: u64,

    /// Maximum number of flagged records kept in the review history
    #[arg(long, env = "FLAG_HISTORY_CAP", default_value = "500")]
    pub flag_history_cap: usize,

    /// Flagged records older than this many days are pruned
    #[arg(long, env = "FLAG_RETENTION_DAYS", default_value = "7")]
    pub flag_retention_days: i64,

    /// Quotes captured longer ago than this are discarded (minutes)
    #[arg(long, env = "FRESHNESS_WINDOW_MINS", default_value = "30")]
    pub freshness_window_mins: i64,

    /// American-odds magnitude above which a price is implausible
    #[arg(long, env = "MAX_AMERICAN_ODDS", default_value = "50000")]
    pub max_american_odds: f64,

    /// Prices bookmakers publish to mark a suspended market
    #[arg(
        long,
        env = "SUSPENDED_SENTINELS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "-11011"
    )]
    pub suspended_sentinels: Vec<f64>,

    /// Minimum books quoting a game before +EV is evaluated
    #[arg(long, env = "MIN_BOOKS_EV", default_value = "3")]
    pub min_books_ev: usize,

    /// Minimum books quoting a 2-way game before arbitrage is evaluated
    #[arg(long, env = "MIN_BOOKS_ARB", default_value = "2")]
    pub min_books_arb: usize,

    /// Minimum books quoting a 3-way game before arbitrage is evaluated
    #[arg(long, env = "MIN_BOOKS_ARB_THREE_WAY", default_value = "3")]
    pub min_books_arb_three_way: usize,

    /// Disable the per-side outlier filter
    #[arg(long, env = "DISABLE_OUTLIER_FILTER", default_value = "false")]
    pub disable_outlier_filter: bool,

    /// Outlier filter aggressiveness
    #[arg(long, env = "OUTLIER_MODE", value_enum, default_value = "conservative")]
    pub outlier_mode: OutlierMode,

    /// Quotes per side required before outlier filtering runs
    #[arg(long, env = "OUTLIER_MIN_QUOTES", default_value = "4")]
    pub outlier_min_quotes: usize,

    /// Relative distance from the median (0.5 = 50%) a price must exceed to be an outlier
    #[arg(long, env = "OUTLIER_MAX_DEVIATION", default_value = "0.5")]
    pub outlier_max_deviation: f64,

    /// Bookmaker name of an algorithmic fairline feed, used ahead of every book
    #[arg(long, env = "ALGO_FAIRLINE_SOURCE")]
    pub algo_fairline_source: Option<String>,

    /// Sharp reference bookmakers, in priority order
    #[arg(
        long,
        env = "REFERENCE_BOOKS",
        value_delimiter = ',',
        default_value = "Pinnacle,Circa Sports"
    )]
    pub reference_books: Vec<String>,

    /// Quotes per side required for a consensus-median fairline
    #[arg(long, env = "MEDIAN_MIN_QUOTES", default_value = "7")]
    pub median_min_quotes: usize,

    /// Quotes per side required for a best-price fairline
    #[arg(long, env = "BEST_PRICE_MIN_QUOTES", default_value = "3")]
    pub best_price_min_quotes: usize,

    /// Ignore vendor-supplied implied percentages and always derive from price
    #[arg(long, env = "DERIVED_PROBABILITIES_ONLY", default_value = "false")]
    pub derived_probabilities_only: bool,

    /// Minimum EV% for a bet to be reported
    #[arg(long, env = "EV_MIN_PCT", default_value = "1.0")]
    pub ev_min_pct: f64,

    /// EV% above which a retained bet is flagged for review
    #[arg(long, env = "EV_SUSPICIOUS_PCT", default_value = "15.0")]
    pub ev_suspicious_pct: f64,

    /// EV% above which a bet is treated as a data error
    #[arg(long, env = "EV_REJECT_PCT", default_value = "50.0")]
    pub ev_reject_pct: f64,

    /// Minimum profit% for a 2-way arbitrage to be reported
    #[arg(long, env = "ARB_MIN_PROFIT_PCT", default_value = "0.1")]
    pub arb_min_profit_pct: f64,

    /// Minimum profit% for a 3-way arbitrage to be reported
    #[arg(long, env = "ARB_MIN_PROFIT_PCT_THREE_WAY", default_value = "0.5")]
    pub arb_min_profit_pct_three_way: f64,

    /// Arbitrage profit% flagged as suspicious
    #[arg(long, env = "ARB_SUSPICIOUS_PCT", default_value = "5.0")]
    pub arb_suspicious_pct: f64,

    /// Arbitrage profit% flagged as extreme
    #[arg(long, env = "ARB_EXTREME_PCT", default_value = "10.0")]
    pub arb_extreme_pct: f64,

    /// Arbitrage profit% above which the result is excluded as implausible
    #[arg(long, env = "ARB_REJECT_PCT", default_value = "20.0")]
    pub arb_reject_pct: f64,

    /// Notional total stake used for arbitrage stake splits
    #[arg(long, env = "NOTIONAL_STAKE", default_value = "1000.0")]
    pub notional_stake: f64,
}

/// How hard the per-side outlier filter cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMode {
    /// median ± 3.0×IQR
    Conservative,
    /// median ± 1.5×IQR
    Aggressive,
}

impl OutlierMode {
    pub fn iqr_multiplier(self) -> f64 {
        match self {
            OutlierMode::Conservative => 3.0,
            OutlierMode::Aggressive => 1.5,
        }
    }
}

/// Immutable engine settings, passed into every evaluation call.
///
/// Percent thresholds are in percentage points (`15.0` = 15%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub freshness_window_mins: i64,
    pub max_american_odds: f64,
    pub suspended_sentinels: Vec<f64>,
    pub min_books_ev: usize,
    pub min_books_arb: usize,
    pub min_books_arb_three_way: usize,
    pub outlier_filter_enabled: bool,
    pub outlier_mode: OutlierMode,
    pub outlier_min_quotes: usize,
    /// Filtering is abandoned when it would leave fewer quotes than this.
    pub outlier_min_remaining: usize,
    pub outlier_max_deviation: f64,
    pub algo_fairline_source: Option<String>,
    pub reference_books: Vec<String>,
    pub median_min_quotes: usize,
    pub best_price_min_quotes: usize,
    pub prefer_vendor_probabilities: bool,
    pub ev_min_pct: f64,
    pub ev_suspicious_pct: f64,
    pub ev_reject_pct: f64,
    pub arb_min_profit_pct: f64,
    pub arb_min_profit_pct_three_way: f64,
    pub arb_suspicious_pct: f64,
    pub arb_extreme_pct: f64,
    pub arb_reject_pct: f64,
    pub notional_stake: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            freshness_window_mins: 30,
            max_american_odds: 50_000.0,
            suspended_sentinels: vec![-11011.0],
            min_books_ev: 3,
            min_books_arb: 2,
            min_books_arb_three_way: 3,
            outlier_filter_enabled: true,
            outlier_mode: OutlierMode::Conservative,
            outlier_min_quotes: 4,
            outlier_min_remaining: 3,
            outlier_max_deviation: 0.5,
            algo_fairline_source: None,
            reference_books: vec!["Pinnacle".into(), "Circa Sports".into()],
            median_min_quotes: 7,
            best_price_min_quotes: 3,
            prefer_vendor_probabilities: true,
            ev_min_pct: 1.0,
            ev_suspicious_pct: 15.0,
            ev_reject_pct: 50.0,
            arb_min_profit_pct: 0.1,
            arb_min_profit_pct_three_way: 0.5,
            arb_suspicious_pct: 5.0,
            arb_extreme_pct: 10.0,
            arb_reject_pct: 20.0,
            notional_stake: 1000.0,
        }
    }
}

impl EngineConfig {
    /// True for sources that only feed the fairline and are never bet into.
    pub fn is_reference_only(&self, bookmaker: &str) -> bool {
        self.algo_fairline_source
            .as_deref()
            .is_some_and(|algo| algo.eq_ignore_ascii_case(bookmaker))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.freshness_window_mins <= 0 {
            anyhow::bail!("freshness_window_mins must be positive");
        }
        if self.max_american_odds < 100.0 {
            anyhow::bail!("max_american_odds must be at least 100");
        }
        if self.min_books_ev == 0 || self.min_books_arb < 2 || self.min_books_arb_three_way < 2 {
            anyhow::bail!("minimum book counts must be >= 1 for EV and >= 2 for arbitrage");
        }
        if self.outlier_min_remaining == 0 {
            anyhow::bail!("outlier_min_remaining must be positive");
        }
        if self.outlier_max_deviation <= 0.0 {
            anyhow::bail!("outlier_max_deviation must be positive");
        }
        if self.best_price_min_quotes == 0 || self.median_min_quotes == 0 {
            anyhow::bail!("fairline quote minimums must be positive");
        }
        if !(self.ev_min_pct < self.ev_suspicious_pct && self.ev_suspicious_pct < self.ev_reject_pct) {
            anyhow::bail!("EV thresholds must satisfy min < suspicious < reject");
        }
        if !(self.arb_suspicious_pct < self.arb_extreme_pct && self.arb_extreme_pct < self.arb_reject_pct) {
            anyhow::bail!("arbitrage thresholds must satisfy suspicious < extreme < reject");
        }
        if self.arb_min_profit_pct < 0.0
            || self.arb_min_profit_pct >= self.arb_reject_pct
            || self.arb_min_profit_pct_three_way < 0.0
            || self.arb_min_profit_pct_three_way >= self.arb_reject_pct
        {
            anyhow::bail!("arbitrage retain floors must lie in [0, arb_reject_pct)");
        }
        if self.notional_stake <= 0.0 {
            anyhow::bail!("notional_stake must be positive");
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.snapshot_path, &self.snapshot_url) {
            (None, None) => anyhow::bail!("one of SNAPSHOT_PATH or SNAPSHOT_URL is required"),
            (Some(_), Some(_)) => {
                anyhow::bail!("SNAPSHOT_PATH and SNAPSHOT_URL are mutually exclusive")
            }
            _ => {}
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.cycle_timeout_secs == 0 {
            anyhow::bail!("cycle_timeout_secs must be positive");
        }
        if self.flag_history_cap == 0 {
            anyhow::bail!("flag_history_cap must be positive");
        }
        if self.flag_retention_days <= 0 {
            anyhow::bail!("flag_retention_days must be positive");
        }
        self.engine_config().validate()
    }

    /// Snapshot the engine-facing settings into an immutable value.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            freshness_window_mins: self.freshness_window_mins,
            max_american_odds: self.max_american_odds,
            suspended_sentinels: self.suspended_sentinels.clone(),
            min_books_ev: self.min_books_ev,
            min_books_arb: self.min_books_arb,
            min_books_arb_three_way: self.min_books_arb_three_way,
            outlier_filter_enabled: !self.disable_outlier_filter,
            outlier_mode: self.outlier_mode,
            outlier_min_quotes: self.outlier_min_quotes,
            outlier_min_remaining: 3,
            outlier_max_deviation: self.outlier_max_deviation,
            algo_fairline_source: self
                .algo_fairline_source
                .clone()
                .filter(|s| !s.trim().is_empty()),
            reference_books: self
                .reference_books
                .iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            median_min_quotes: self.median_min_quotes,
            best_price_min_quotes: self.best_price_min_quotes,
            prefer_vendor_probabilities: !self.derived_probabilities_only,
            ev_min_pct: self.ev_min_pct,
            ev_suspicious_pct: self.ev_suspicious_pct,
            ev_reject_pct: self.ev_reject_pct,
            arb_min_profit_pct: self.arb_min_profit_pct,
            arb_min_profit_pct_three_way: self.arb_min_profit_pct_three_way,
            arb_suspicious_pct: self.arb_suspicious_pct,
            arb_extreme_pct: self.arb_extreme_pct,
            arb_reject_pct: self.arb_reject_pct,
            notional_stake: self.notional_stake,
        }
    }
}
