use thiserror::Error;

/// Conditions that abort a whole evaluation cycle.
///
/// Thin books, unresolvable fairlines and implausible values are not errors;
/// they are skipped or flagged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("cycle exceeded its compute budget after {processed}/{total} games ({elapsed_ms} ms)")]
    Timeout {
        processed: usize,
        total: usize,
        elapsed_ms: u128,
    },

    #[error("malformed snapshot: {0}")]
    Contract(String),
}
