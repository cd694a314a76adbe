//! Multi-bookmaker moneyline scanner: consensus fairlines, +EV and arbitrage
//! detection, and anomaly flagging over snapshots from a data provider.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod feed;
pub mod runner;
