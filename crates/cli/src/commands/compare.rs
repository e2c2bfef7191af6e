//! Day-over-day comparison command

use anyhow::Result;
use colored::Colorize;
use inventory_lib::compare::{DayOverDayComparator, RowOrdering};
use serde_json::json;
use std::sync::Arc;

use super::{parse_date, StoreTarget};
use crate::output::{print_success, print_warning, OutputFormat};

/// Compare one name tag's snapshots against an earlier date
pub async fn compare_snapshots(
    target: &StoreTarget,
    nametag: &str,
    date: Option<&str>,
    offset: u32,
    unordered: bool,
    format: OutputFormat,
) -> Result<bool> {
    let as_of = parse_date(date)?;
    let ordering = if unordered {
        RowOrdering::Unordered
    } else {
        RowOrdering::AsReturned
    };

    let comparator = DayOverDayComparator::new(Arc::new(target.connect().await)).with_ordering(ordering);
    let result = comparator.compare(as_of, nametag, offset).await?;

    match format {
        OutputFormat::Json => {
            let body = json!({
                "nametag": result.nametag,
                "as_of": result.as_of.to_string(),
                "prior": result.prior.to_string(),
                "differs": result.differs,
                "both_empty": result.both_empty,
                "current": result.current,
                "previous": result.previous,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Table => {
            println!("{} {}", "Snapshot comparison:".bold(), nametag.cyan());
            println!("{}", "=".repeat(50));
            print!("{}", result.render_diff());
            if result.both_empty {
                print_warning("No snapshots on either date");
            } else if !result.differs {
                print_success("No changes");
            }
        }
    }

    Ok(result.differs)
}
