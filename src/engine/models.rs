use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One outcome of a head-to-head market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Draw,
    Away,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Draw => "draw",
            Side::Away => "away",
        }
    }
}

/// Number of mutually exclusive outcomes a market settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarketShape {
    #[serde(rename = "2-way")]
    TwoWay,
    #[serde(rename = "3-way")]
    ThreeWay,
}

impl MarketShape {
    pub fn sides(self) -> &'static [Side] {
        match self {
            MarketShape::TwoWay => &[Side::Home, Side::Away],
            MarketShape::ThreeWay => &[Side::Home, Side::Draw, Side::Away],
        }
    }

    /// Normalized fair probabilities outside this range are logged as extreme.
    pub fn plausible_probability_range(self) -> (f64, f64) {
        match self {
            MarketShape::TwoWay => (0.02, 0.98),
            MarketShape::ThreeWay => (0.02, 0.95),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
}

/// A single bookmaker's moneyline observation for a game.
///
/// Prices are American odds; vendor percentages are 0 to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bookmaker: String,
    pub game_id: String,
    #[serde(default)]
    pub home_price: Option<f64>,
    #[serde(default)]
    pub away_price: Option<f64>,
    #[serde(default)]
    pub draw_price: Option<f64>,
    #[serde(default)]
    pub home_implied_pct: Option<f64>,
    #[serde(default)]
    pub away_implied_pct: Option<f64>,
    #[serde(default)]
    pub draw_implied_pct: Option<f64>,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub is_live: bool,
}

impl Quote {
    pub fn price(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => self.home_price,
            Side::Away => self.away_price,
            Side::Draw => self.draw_price,
        }
    }

    /// Vendor-supplied implied probability as a fraction, if present and sane.
    pub fn vendor_probability(&self, side: Side) -> Option<f64> {
        let pct = match side {
            Side::Home => self.home_implied_pct,
            Side::Away => self.away_implied_pct,
            Side::Draw => self.draw_implied_pct,
        }?;
        (pct.is_finite() && pct > 0.0 && pct < 100.0).then(|| pct / 100.0)
    }

    pub fn prices(&self) -> impl Iterator<Item = (Side, f64)> + '_ {
        [Side::Home, Side::Draw, Side::Away]
            .into_iter()
            .filter_map(|side| self.price(side).map(|p| (side, p)))
    }
}

/// A game and every quote currently known for it. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub sport: String,
    #[serde(default)]
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub status: GameStatus,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

impl GameSnapshot {
    pub fn label(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }

    pub fn bet_label(&self, side: Side) -> String {
        match side {
            Side::Home => format!("{} ML", self.home_team),
            Side::Away => format!("{} ML", self.away_team),
            Side::Draw => "Draw".to_string(),
        }
    }

    pub fn reference(&self) -> GameRef {
        GameRef {
            game_id: self.game_id.clone(),
            sport: self.sport.clone(),
            league: self.league.clone(),
            label: self.label(),
            start_time: self.start_time,
        }
    }
}

/// What the data provider hands over each cycle: games plus their quotes,
/// either nested under each game or listed alongside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotBatch {
    #[serde(default)]
    pub games: Vec<GameSnapshot>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

/// Plain copy of the game identity carried on every output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRef {
    pub game_id: String,
    pub sport: String,
    pub league: String,
    pub label: String,
    pub start_time: DateTime<Utc>,
}

/// Which tier of the fairline cascade produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairlineMethod {
    AlgorithmicReference,
    ReferenceBook,
    Median,
    BestPrice,
}

impl FairlineMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            FairlineMethod::AlgorithmicReference => "algorithmic_reference",
            FairlineMethod::ReferenceBook => "reference_book",
            FairlineMethod::Median => "median",
            FairlineMethod::BestPrice => "best_price",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairLine {
    pub side: Side,
    /// American odds of the fair price before vig removal
    pub fair_price: f64,
    pub fair_decimal: f64,
    /// Vig-free probability
    pub fair_probability: f64,
    pub method: FairlineMethod,
    pub source: String,
}

/// The fair line for every side of one game's market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairLineSet {
    pub game_id: String,
    pub shape: MarketShape,
    pub method: FairlineMethod,
    pub source: String,
    /// Summed raw implied probability minus one
    pub overround: f64,
    pub lines: Vec<FairLine>,
}

impl FairLineSet {
    pub fn probability(&self, side: Side) -> Option<f64> {
        self.lines
            .iter()
            .find(|l| l.side == side)
            .map(|l| l.fair_probability)
    }
}

/// Where an implied probability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilitySource {
    Vendor,
    Derived,
    Mixed,
}

impl ProbabilitySource {
    pub fn combine(sources: impl IntoIterator<Item = ProbabilitySource>) -> ProbabilitySource {
        let mut vendor = false;
        let mut derived = false;
        for s in sources {
            match s {
                ProbabilitySource::Vendor => vendor = true,
                ProbabilitySource::Derived => derived = true,
                ProbabilitySource::Mixed => return ProbabilitySource::Mixed,
            }
        }
        match (vendor, derived) {
            (true, true) => ProbabilitySource::Mixed,
            (true, false) => ProbabilitySource::Vendor,
            _ => ProbabilitySource::Derived,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvOpportunity {
    pub game: GameRef,
    pub side: Side,
    pub bet: String,
    pub bookmaker: String,
    /// Quoted American odds
    pub price: f64,
    pub decimal_odds: f64,
    pub implied_probability: f64,
    pub probability_source: ProbabilitySource,
    pub fair_probability: f64,
    pub fairline_method: FairlineMethod,
    pub ev_pct: f64,
    /// Full-Kelly bankroll fraction, in percent
    pub kelly_pct: f64,
    pub is_live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbLeg {
    pub side: Side,
    pub bet: String,
    pub bookmaker: String,
    pub price: f64,
    pub decimal_odds: f64,
    pub implied_probability: f64,
    pub probability_source: ProbabilitySource,
    pub stake: f64,
    pub payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub game: GameRef,
    pub shape: MarketShape,
    pub legs: Vec<ArbLeg>,
    pub total_implied_probability: f64,
    pub profit_pct: f64,
    pub total_stake: f64,
    pub guaranteed_profit: f64,
    pub probability_source: ProbabilitySource,
    pub is_live: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityKind {
    Ev,
    Arb,
}

impl OpportunityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityKind::Ev => "ev",
            OpportunityKind::Arb => "arb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Suspicious,
    Extreme,
    Rejected,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Suspicious => "suspicious",
            Severity::Extreme => "extreme",
            Severity::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Severity> {
        match s {
            "suspicious" => Some(Severity::Suspicious),
            "extreme" => Some(Severity::Extreme),
            "rejected" => Some(Severity::Rejected),
            _ => None,
        }
    }
}

/// The inputs behind a flagged value, kept for human audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub quotes: Vec<Quote>,
    #[serde(default)]
    pub fair_line: Option<FairLineSet>,
    #[serde(default)]
    pub bookmaker: Option<String>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub legs: Vec<ArbLeg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    pub kind: OpportunityKind,
    pub severity: Severity,
    pub game: GameRef,
    /// EV% or arbitrage profit%
    pub value: f64,
    /// The threshold that was crossed
    pub threshold: f64,
    /// Whether the result was kept out of the primary output
    pub excluded: bool,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
    pub inputs: AuditSnapshot,
}

/// Everything one refresh cycle produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub generated_at: DateTime<Utc>,
    pub games_seen: usize,
    pub games_with_fairline: usize,
    pub fair_lines: Vec<FairLineSet>,
    pub ev_opportunities: Vec<EvOpportunity>,
    pub arbitrage_opportunities: Vec<ArbitrageOpportunity>,
    pub flagged: Vec<FlaggedRecord>,
}
