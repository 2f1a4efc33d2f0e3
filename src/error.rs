use thiserror::Error;

/// Errors that can occur when building a ConcurrentMap.
///
/// Key absence is never an error: lookups report it through `Option`/`bool`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The shard count is invalid (must be greater than 0).
    #[error("shard count must be greater than 0 (got {0})")]
    InvalidShardCount(usize),
}
