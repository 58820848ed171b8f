//! Artist survivor selection
//!
//! Duplicate artists are grouped by `(artist_id, name)`. Within a group the
//! candidates are ordered by
//!
//! 1. duplicate count, descending
//! 2. name, ascending
//! 3. latitude, ascending, nulls last
//! 4. longitude, ascending, nulls last
//! 5. location, descending, nulls first
//!
//! and the first candidate survives. The null placement is the one Redshift
//! applies to the same `ORDER BY`, so [`select_survivors`] predicts the rows
//! the `remove-artist-duplicates` statements keep.

use crate::row::{Row, Value};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One row of the artists duplicate check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistCandidate {
    pub duplicates: i64,
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtistCandidate {
    /// Read `num_duplicates`, `artist_id`, `name`, `location`, `latitude` and
    /// `longitude`; `None` when an identifying column is missing.
    pub fn from_row(row: &Row) -> Option<Self> {
        let text = |column: &str| row.get(column).and_then(Value::as_str).map(str::to_string);
        let number = |column: &str| row.get(column).and_then(Value::as_f64);

        Some(Self {
            duplicates: row.get("num_duplicates").and_then(Value::as_i64).unwrap_or(1),
            artist_id: text("artist_id")?,
            name: text("name")?,
            location: text("location"),
            latitude: number("latitude"),
            longitude: number("longitude"),
        })
    }

    fn key(&self) -> (&str, &str) {
        (&self.artist_id, &self.name)
    }
}

fn asc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn desc_nulls_first(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Survivor ordering: the smaller candidate wins.
pub fn survivor_order(a: &ArtistCandidate, b: &ArtistCandidate) -> Ordering {
    b.duplicates
        .cmp(&a.duplicates)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| asc_nulls_last(a.latitude, b.latitude))
        .then_with(|| asc_nulls_last(a.longitude, b.longitude))
        .then_with(|| desc_nulls_first(a.location.as_deref(), b.location.as_deref()))
}

/// One survivor per `(artist_id, name)` group that has more than one row,
/// ordered by artist id.
pub fn select_survivors(candidates: &[ArtistCandidate]) -> Vec<ArtistCandidate> {
    let mut groups: BTreeMap<(&str, &str), Vec<&ArtistCandidate>> = BTreeMap::new();
    for candidate in candidates {
        groups.entry(candidate.key()).or_default().push(candidate);
    }

    groups
        .into_values()
        .filter(|group| group.len() > 1)
        .filter_map(|group| group.into_iter().min_by(|a, b| survivor_order(a, b)))
        .cloned()
        .collect()
}
