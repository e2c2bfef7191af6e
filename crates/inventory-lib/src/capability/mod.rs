//! Instance-type capability lookup
//!
//! Resolves the distinct instance types seen in a run with one filtered
//! describe call per chunk of identifiers, instead of one call per type.

mod ec2;

pub use ec2::Ec2InstanceTypeCatalog;

use crate::error::CapabilityError;
use crate::models::CapabilityRecord;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Most identifiers the describe API accepts in one filter
pub const MAX_TYPES_PER_REQUEST: usize = 100;

const MIB_PER_GIB: i64 = 1024;

/// Instance type identifier -> capability attributes
pub type CapabilityMap = HashMap<String, CapabilityRecord>;

/// One page of describe results
#[derive(Debug, Clone, Default)]
pub struct CapabilityPage {
    pub records: Vec<CapabilityRecord>,
    pub next_token: Option<String>,
}

/// Trait for instance-type description sources
#[async_trait]
pub trait InstanceTypeCatalog: Send + Sync {
    /// Describe `instance_types`, one page at a time
    async fn describe_page(
        &self,
        instance_types: &[String],
        next_token: Option<String>,
    ) -> Result<CapabilityPage, CapabilityError>;
}

/// Bulk resolver over an [`InstanceTypeCatalog`]
#[derive(Clone)]
pub struct InstanceCapabilityLookup {
    catalog: Arc<dyn InstanceTypeCatalog>,
}

impl InstanceCapabilityLookup {
    pub fn new(catalog: Arc<dyn InstanceTypeCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve every identifier in `instance_types`.
    ///
    /// Identifiers the catalog does not know are simply absent from the
    /// returned map; callers must treat absence as a failure.
    pub async fn resolve<I, S>(&self, instance_types: I) -> Result<CapabilityMap, CapabilityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = instance_types
            .into_iter()
            .map(|t| t.as_ref().replace('\'', ""))
            .filter(|t| !t.is_empty())
            .collect();

        let mut map = CapabilityMap::new();
        // An unfiltered describe call would return the whole catalog
        if wanted.is_empty() {
            return Ok(map);
        }

        let wanted: Vec<String> = wanted.into_iter().collect();
        for chunk in wanted.chunks(MAX_TYPES_PER_REQUEST) {
            let mut next_token = None;
            loop {
                let page = self.catalog.describe_page(chunk, next_token).await?;
                for record in page.records {
                    map.insert(record.instance_type.clone(), record);
                }
                match page.next_token {
                    Some(token) if !token.is_empty() => next_token = Some(token),
                    _ => break,
                }
            }
        }

        let missing = wanted.iter().filter(|t| !map.contains_key(*t)).count();
        if missing > 0 {
            warn!(
                requested = wanted.len(),
                missing = missing,
                "Some instance types were not returned by the catalog"
            );
        }
        debug!(resolved = map.len(), "Resolved instance capabilities");

        Ok(map)
    }
}

/// Memory in GiB as an exact decimal.
///
/// Whole numbers keep one fractional digit so 16384 MiB reads `16.0`.
pub fn memory_gib(memory_mib: i64) -> Decimal {
    gib_scale((Decimal::from(memory_mib) / Decimal::from(MIB_PER_GIB)).normalize())
}

/// Give whole GiB values one fractional digit
pub fn gib_scale(mut gib: Decimal) -> Decimal {
    if gib.scale() == 0 {
        gib.rescale(1);
    }
    gib
}

/// Decimal from a float's shortest textual form, never from its binary value
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    let text = value.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
