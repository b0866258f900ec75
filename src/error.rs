//! Error types for the ranking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Domain failures are raised as [`RankingError`] so
//! callers can `downcast_ref` to tell them apart.

use crate::types::DeckSize;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ranking scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankingError {
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Partition {deck_size} update lost {attempts} consecutive write races")]
    ConcurrencyConflict { deck_size: DeckSize, attempts: u32 },

    #[error("Corrupt counters for partition {deck_size}: {reason}")]
    CorruptPartitionData { deck_size: DeckSize, reason: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl RankingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        RankingError::Validation {
            reason: reason.into(),
        }
    }

    pub fn corrupt(deck_size: DeckSize, reason: impl Into<String>) -> Self {
        RankingError::CorruptPartitionData {
            deck_size,
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        RankingError::Storage {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RankingError::ConcurrencyConflict { .. } | RankingError::Storage { .. }
        )
    }
}

/// Look for a [`RankingError`] inside an anyhow error chain
pub fn ranking_error(err: &anyhow::Error) -> Option<&RankingError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RankingError>())
}
