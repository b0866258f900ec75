//! Ordered "worse than" counters for a single metric
//!
//! A [`WorseThanMap`] maps every raw metric value seen in a partition to the
//! number of recorded scores strictly worse (greater) than that value. It is
//! updated incrementally, one score at a time, in a single ascending pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered `value -> worse_count` map.
///
/// Serializes as a JSON object keyed by the decimal value, which is the shape
/// the `score_counts` table stores. Key order always comes from the
/// `BTreeMap`, never from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorseThanMap {
    entries: BTreeMap<u64, u64>,
}

/// Result of inserting one score into a [`WorseThanMap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInsertion {
    pub map: WorseThanMap,
    /// Worse-than count stored at the inserted value
    pub own_worse_count: u64,
    /// Whether the value was new to the map
    pub inserted_key: bool,
}

impl WorseThanMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry map for the first score of a partition
    pub fn singleton(value: u64) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(value, 0);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Worse-than count for an exact value, if that value has been recorded
    pub fn worse_count(&self, value: u64) -> Option<u64> {
        self.entries.get(&value).copied()
    }

    /// Entries in ascending value order
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().map(|(k, c)| (*k, *c))
    }

    /// Record one more score with `value`, given the partition held `total`
    /// scores before it.
    ///
    /// Every value better than the new one gains one worse score. Worse or
    /// equal values are untouched. A value seen for the first time inherits
    /// the pre-increment count of the closest better value, or `total` when
    /// it is the best value so far.
    pub fn insert(&self, total: u64, value: u64) -> MapInsertion {
        let mut next_better_count = total;
        let mut found = None;
        let mut entries = BTreeMap::new();

        for (&key, &count) in &self.entries {
            if value > key {
                entries.insert(key, count + 1);
                next_better_count = count;
            } else {
                if value == key {
                    found = Some(count);
                }
                entries.insert(key, count);
            }
        }

        let (own_worse_count, inserted_key) = match found {
            Some(count) => (count, false),
            None => {
                entries.insert(value, next_better_count);
                (next_better_count, true)
            }
        };

        MapInsertion {
            map: WorseThanMap { entries },
            own_worse_count,
            inserted_key,
        }
    }

    /// Build a map from scratch out of raw values.
    ///
    /// Equivalent to inserting every value in any order.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut occurrences: BTreeMap<u64, u64> = BTreeMap::new();
        for value in values {
            *occurrences.entry(value).or_insert(0) += 1;
        }

        let mut entries = BTreeMap::new();
        let mut worse = 0u64;
        for (value, count) in occurrences.into_iter().rev() {
            entries.insert(value, worse);
            worse += count;
        }

        Self { entries }
    }

    /// Check the invariants a map belonging to a partition of `total` scores
    /// must satisfy. Returns a description of the first violation.
    pub fn check_invariants(&self, total: u64) -> std::result::Result<(), String> {
        if total > 0 && self.entries.is_empty() {
            return Err(format!("empty map for {} recorded scores", total));
        }

        let mut previous: Option<(u64, u64)> = None;
        for (&key, &count) in &self.entries {
            if count >= total {
                return Err(format!(
                    "value {} has worse count {} but partition holds {} scores",
                    key, count, total
                ));
            }
            if let Some((prev_key, prev_count)) = previous {
                if prev_count < count {
                    return Err(format!(
                        "worse count rises from {} at {} to {} at {}",
                        prev_count, prev_key, count, key
                    ));
                }
            }
            previous = Some((key, count));
        }

        Ok(())
    }
}

impl FromIterator<(u64, u64)> for WorseThanMap {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
