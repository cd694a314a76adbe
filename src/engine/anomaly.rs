//! Plausibility gate shared by the EV and arbitrage evaluators.
//!
//! Each opportunity kind has a [`ThresholdTable`]: a retain floor plus
//! descending tiers. The highest tier a value crosses decides the flag
//! severity and whether the result is kept out of the primary output. Flags
//! are collected on the side and never abort evaluation.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::EngineConfig;

use super::models::{AuditSnapshot, FlaggedRecord, GameRef, MarketShape, OpportunityKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    /// Values strictly above this cross the tier
    pub above: f64,
    pub severity: Severity,
    /// Crossing this tier keeps the value out of the primary output
    pub excludes: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    pub kind: OpportunityKind,
    pub floor: f64,
    pub floor_inclusive: bool,
    /// Ordered highest threshold first
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub retain: bool,
    pub crossed: Option<Tier>,
}

impl ThresholdTable {
    pub fn ev(cfg: &EngineConfig) -> ThresholdTable {
        ThresholdTable {
            kind: OpportunityKind::Ev,
            floor: cfg.ev_min_pct,
            floor_inclusive: true,
            tiers: vec![
                Tier {
                    above: cfg.ev_reject_pct,
                    severity: Severity::Rejected,
                    excludes: true,
                },
                Tier {
                    above: cfg.ev_suspicious_pct,
                    severity: Severity::Suspicious,
                    excludes: false,
                },
            ],
        }
    }

    pub fn arbitrage(cfg: &EngineConfig, shape: MarketShape) -> ThresholdTable {
        let floor = match shape {
            MarketShape::TwoWay => cfg.arb_min_profit_pct,
            MarketShape::ThreeWay => cfg.arb_min_profit_pct_three_way,
        };
        ThresholdTable {
            kind: OpportunityKind::Arb,
            floor,
            floor_inclusive: false,
            tiers: vec![
                Tier {
                    above: cfg.arb_reject_pct,
                    severity: Severity::Extreme,
                    excludes: true,
                },
                Tier {
                    above: cfg.arb_extreme_pct,
                    severity: Severity::Extreme,
                    excludes: false,
                },
                Tier {
                    above: cfg.arb_suspicious_pct,
                    severity: Severity::Suspicious,
                    excludes: false,
                },
            ],
        }
    }

    pub fn assess(&self, value: f64) -> Assessment {
        if !value.is_finite() {
            return Assessment {
                retain: false,
                crossed: self.tiers.first().copied(),
            };
        }
        let crossed = self.tiers.iter().find(|t| value > t.above).copied();
        let meets_floor = if self.floor_inclusive {
            value >= self.floor
        } else {
            value > self.floor
        };
        Assessment {
            retain: meets_floor && !crossed.is_some_and(|t| t.excludes),
            crossed,
        }
    }
}

/// Collects flagged records for one game.
#[derive(Debug)]
pub struct Flagger {
    flagged_at: DateTime<Utc>,
    records: Vec<FlaggedRecord>,
}

impl Flagger {
    pub fn new(flagged_at: DateTime<Utc>) -> Self {
        Flagger {
            flagged_at,
            records: Vec::new(),
        }
    }

    /// Record a flag if the assessment crossed a tier.
    pub fn observe(
        &mut self,
        table: &ThresholdTable,
        assessment: &Assessment,
        value: f64,
        game: &GameRef,
        subject: &str,
        inputs: impl FnOnce() -> AuditSnapshot,
    ) {
        let Some(tier) = assessment.crossed else {
            return;
        };
        let metric = match table.kind {
            OpportunityKind::Ev => "EV",
            OpportunityKind::Arb => "arbitrage profit",
        };
        let disposition = if tier.excludes {
            "excluded from results"
        } else {
            "retained for review"
        };
        let reason = format!(
            "{}: {} {:.2}% above {} threshold {:.2}%; {}",
            subject,
            metric,
            value,
            tier.severity.as_str(),
            tier.above,
            disposition
        );
        warn!("[{}] {} ({})", table.kind.as_str(), reason, game.label);

        self.records.push(FlaggedRecord {
            kind: table.kind,
            severity: tier.severity,
            game: game.clone(),
            value,
            threshold: tier.above,
            excluded: tier.excludes,
            reason,
            flagged_at: self.flagged_at,
            inputs: inputs(),
        });
    }

    pub fn into_records(self) -> Vec<FlaggedRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{game, now};

    #[test]
    fn ev_tiers() {
        let table = ThresholdTable::ev(&EngineConfig::default());

        let a = table.assess(0.5);
        assert!(!a.retain && a.crossed.is_none());

        let a = table.assess(1.0);
        assert!(a.retain && a.crossed.is_none());

        let a = table.assess(20.0);
        assert!(a.retain);
        assert_eq!(a.crossed.map(|t| t.severity), Some(Severity::Suspicious));

        let a = table.assess(50.0);
        assert!(a.retain);

        let a = table.assess(50.1);
        assert!(!a.retain);
        assert_eq!(a.crossed.map(|t| t.severity), Some(Severity::Rejected));
    }

    #[test]
    fn arbitrage_tiers() {
        let table = ThresholdTable::arbitrage(&EngineConfig::default(), MarketShape::TwoWay);

        assert!(!table.assess(0.1).retain);
        assert!(table.assess(0.2).retain);

        let a = table.assess(6.0);
        assert!(a.retain);
        assert_eq!(a.crossed.map(|t| t.severity), Some(Severity::Suspicious));

        let a = table.assess(12.0);
        assert!(a.retain);
        assert_eq!(a.crossed.map(|t| t.severity), Some(Severity::Extreme));

        let a = table.assess(20.0);
        assert!(a.retain);

        let a = table.assess(25.0);
        assert!(!a.retain);
        assert_eq!(a.crossed.map(|t| (t.severity, t.excludes)), Some((Severity::Extreme, true)));
    }

    #[test]
    fn three_way_floor_is_higher() {
        let table = ThresholdTable::arbitrage(&EngineConfig::default(), MarketShape::ThreeWay);
        assert!(!table.assess(0.4).retain);
        assert!(table.assess(0.6).retain);
    }

    #[test]
    fn non_finite_values_are_excluded() {
        let table = ThresholdTable::ev(&EngineConfig::default());
        let a = table.assess(f64::INFINITY);
        assert!(!a.retain);
        assert!(a.crossed.is_some());
    }

    #[test]
    fn flagger_records_only_crossings() {
        let cfg = EngineConfig::default();
        let table = ThresholdTable::ev(&cfg);
        let game_ref = game(vec![]).reference();
        let mut flagger = Flagger::new(now());

        let quiet = table.assess(3.0);
        flagger.observe(&table, &quiet, 3.0, &game_ref, "BookA Home ML", AuditSnapshot::default);
        let loud = table.assess(60.0);
        flagger.observe(&table, &loud, 60.0, &game_ref, "BookB Home ML", AuditSnapshot::default);

        let records = flagger.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Rejected);
        assert!(records[0].excluded);
        assert!(records[0].reason.contains("BookB Home ML"));
        assert_eq!(records[0].flagged_at, now());
    }
}
