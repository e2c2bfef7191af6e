//! Day-over-day snapshot comparison
//!
//! Scans the snapshot store for one name tag on two dates, removes the
//! `recorded_date` attribute from every row and checks whether what remains
//! is identical. Two empty scans compare as "same".

use crate::error::{CompareError, StoreError};
use crate::store::{SnapshotFilter, SnapshotStore};
use chrono::{Days, NaiveDate};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Date format used for the `recorded_date` attribute
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const RECORDED_DATE: &str = "recorded_date";
const RESOURCE_ID: &str = "resourceid";

/// How row order affects equality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowOrdering {
    /// Rows must match position by position, in scan order
    #[default]
    AsReturned,
    /// Rows are compared as a multiset
    Unordered,
}

/// Result of comparing two dated scans for one name tag
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub as_of: NaiveDate,
    pub prior: NaiveDate,
    pub nametag: String,
    pub differs: bool,
    /// Neither date had rows; `differs` is false in that case
    pub both_empty: bool,
    /// Rows for `as_of`, without `recorded_date`
    pub current: Vec<Value>,
    /// Rows for `prior`, without `recorded_date`
    pub previous: Vec<Value>,
}

impl Comparison {
    /// Human-readable summary followed by a per-resource field diff
    pub fn render_diff(&self) -> String {
        let mut out = String::new();
        if !self.differs {
            let _ = writeln!(
                out,
                "The rows from {} and {} are the same.",
                self.as_of, self.prior
            );
            return out;
        }

        let _ = writeln!(
            out,
            "The rows from {} and {} are different.",
            self.as_of, self.prior
        );

        let current = by_resource(&self.current);
        let previous = by_resource(&self.previous);
        let ids: BTreeSet<&str> = current.keys().chain(previous.keys()).copied().collect();

        for id in ids {
            match (current.get(id), previous.get(id)) {
                (Some(_), None) => {
                    let _ = writeln!(out, "+ {id}: only on {}", self.as_of);
                }
                (None, Some(_)) => {
                    let _ = writeln!(out, "- {id}: only on {}", self.prior);
                }
                (Some(now), Some(before)) => {
                    let fields = changed_fields(now, before);
                    if fields.is_empty() {
                        continue;
                    }
                    let _ = writeln!(out, "~ {id}:");
                    for (field, before, now) in fields {
                        let _ = writeln!(out, "    {field}: {before} -> {now}");
                    }
                }
                (None, None) => {}
            }
        }

        if ordering_only(&self.current, &self.previous) {
            let _ = writeln!(out, "(same rows, different order)");
        }
        out
    }
}

/// Compares dated snapshots held in a [`SnapshotStore`]
#[derive(Clone)]
pub struct DayOverDayComparator {
    store: Arc<dyn SnapshotStore>,
    ordering: RowOrdering,
}

impl DayOverDayComparator {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            ordering: RowOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: RowOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Compare `nametag` rows on `as_of` against `as_of - day_offset` days
    pub async fn compare(
        &self,
        as_of: NaiveDate,
        nametag: &str,
        day_offset: u32,
    ) -> Result<Comparison, CompareError> {
        let prior = as_of
            .checked_sub_days(Days::new(u64::from(day_offset)))
            .ok_or(CompareError::OffsetOutOfRange { as_of, day_offset })?;

        let current = self.scan_stripped(as_of, nametag).await?;
        let previous = self.scan_stripped(prior, nametag).await?;

        let both_empty = current.is_empty() && previous.is_empty();
        if both_empty {
            warn!(
                nametag = %nametag,
                as_of = %as_of,
                prior = %prior,
                "No rows on either date; reporting as unchanged"
            );
        }

        let differs = match self.ordering {
            RowOrdering::AsReturned => current != previous,
            RowOrdering::Unordered => canonical(&current) != canonical(&previous),
        };

        info!(
            nametag = %nametag,
            as_of = %as_of,
            prior = %prior,
            current_rows = current.len(),
            previous_rows = previous.len(),
            differs,
            "Compared snapshots"
        );

        Ok(Comparison {
            as_of,
            prior,
            nametag: nametag.to_string(),
            differs,
            both_empty,
            current,
            previous,
        })
    }

    async fn scan_stripped(&self, date: NaiveDate, nametag: &str) -> Result<Vec<Value>, StoreError> {
        let filter = SnapshotFilter::new(date.format(DATE_FORMAT).to_string(), nametag);
        let rows = self.store.scan(&filter).await?;

        rows.iter()
            .map(|row| {
                let mut value = serde_json::to_value(row)
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                if let Some(object) = value.as_object_mut() {
                    object.remove(RECORDED_DATE);
                }
                Ok(value)
            })
            .collect()
    }
}

fn canonical(rows: &[Value]) -> Vec<String> {
    let mut rows: Vec<String> = rows.iter().map(Value::to_string).collect();
    rows.sort();
    rows
}

fn ordering_only(current: &[Value], previous: &[Value]) -> bool {
    current != previous && canonical(current) == canonical(previous)
}

fn by_resource(rows: &[Value]) -> std::collections::BTreeMap<&str, &Map<String, Value>> {
    rows.iter()
        .filter_map(|row| {
            let object = row.as_object()?;
            let id = object.get(RESOURCE_ID)?.as_str()?;
            Some((id, object))
        })
        .collect()
}

fn changed_fields(
    now: &Map<String, Value>,
    before: &Map<String, Value>,
) -> Vec<(String, String, String)> {
    let keys: BTreeSet<&String> = now.keys().chain(before.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let after = now.get(key).unwrap_or(&Value::Null);
            let prior = before.get(key).unwrap_or(&Value::Null);
            (after != prior).then(|| (key.clone(), prior.to_string(), after.to_string()))
        })
        .collect()
}
