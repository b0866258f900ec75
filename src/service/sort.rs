//! Column-priority sorting for leaderboard pages
//!
//! A [`SortHistory`] holds up to three columns, most recently chosen first.
//! Rows are compared column by column; rows equal on every column keep their
//! original order.

use crate::config::MAX_SORT_COLUMNS;
use crate::error::RankingError;
use crate::types::{ColumnSort, Percentile, ScoreWithPercentiles, SortColumn, SortDirection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortHistory {
    columns: Vec<ColumnSort>,
}

impl SortHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from a client-supplied list, highest priority first
    pub fn from_columns(columns: Vec<ColumnSort>) -> std::result::Result<Self, RankingError> {
        if columns.len() > MAX_SORT_COLUMNS {
            return Err(RankingError::validation(format!(
                "at most {} sort columns allowed, got {}",
                MAX_SORT_COLUMNS,
                columns.len()
            )));
        }
        for (i, sort) in columns.iter().enumerate() {
            if columns[..i].iter().any(|earlier| earlier.column == sort.column) {
                return Err(RankingError::validation(format!(
                    "sort column {:?} listed twice",
                    sort.column
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSort] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Apply a header click.
    ///
    /// Clicking the primary column flips its direction. Any other column
    /// becomes primary with its default direction, dropping its older entry
    /// and anything beyond the third position.
    pub fn click(&mut self, column: SortColumn) {
        if let Some(primary) = self.columns.first_mut() {
            if primary.column == column {
                primary.direction = primary.direction.flipped();
                return;
            }
        }

        self.columns.retain(|sort| sort.column != column);
        self.columns
            .insert(0, ColumnSort::new(column, column.default_direction()));
        self.columns.truncate(MAX_SORT_COLUMNS);
    }

    /// Compare two rows by the first column on which they differ
    pub fn compare(&self, a: &ScoreWithPercentiles, b: &ScoreWithPercentiles) -> Ordering {
        for sort in &self.columns {
            let ordering = compare_column(sort.column, a, b);
            let ordering = match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort in place
    pub fn sort(&self, entries: &mut [ScoreWithPercentiles]) {
        if self.columns.is_empty() {
            return;
        }
        entries.sort_by(|a, b| self.compare(a, b));
    }
}

/// Unranked rows compare below every ranked row
fn compare_percentile(a: Option<Percentile>, b: Option<Percentile>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn compare_column(column: SortColumn, a: &ScoreWithPercentiles, b: &ScoreWithPercentiles) -> Ordering {
    match column {
        SortColumn::Id => a.score.id.cmp(&b.score.id),
        SortColumn::Initials => a.score.initials.cmp(&b.score.initials),
        SortColumn::DeckSize => a.score.deck_size.cmp(&b.score.deck_size),
        SortColumn::Pairs => a.score.pairs.cmp(&b.score.pairs),
        SortColumn::Mismatches => a.score.mismatches.cmp(&b.score.mismatches),
        SortColumn::GameTime => a.score.game_time_units.cmp(&b.score.game_time_units),
        SortColumn::MismatchPercentile => {
            compare_percentile(a.mismatch_percentile, b.mismatch_percentile)
        }
        SortColumn::GameTimePercentile => {
            compare_percentile(a.game_time_percentile, b.game_time_percentile)
        }
        SortColumn::CreatedAt => a.score.created_at.cmp(&b.score.created_at),
    }
}
