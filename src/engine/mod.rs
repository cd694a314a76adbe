pub mod anomaly;
pub mod arbitrage;
pub mod book;
pub mod cleaner;
pub mod error;
pub mod ev;
pub mod fairline;
pub mod kelly;
pub mod models;
pub mod normalize;
pub mod odds;
pub mod outlier;
pub mod pipeline;

pub use error::EngineError;
pub use models::{
    ArbitrageOpportunity, CycleReport, EvOpportunity, FlaggedRecord, GameSnapshot, Quote,
    Severity, SnapshotBatch,
};
pub use pipeline::{assemble_snapshots, evaluate};
