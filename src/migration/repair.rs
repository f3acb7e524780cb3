use std::str::FromStr;

use anyhow::{Context, Result};
use getset::CopyGetters;
use log::info;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::document::{Fields, Value};
use crate::store::{self, item_key, ExpenseTable};

pub const GRAND_TOTAL: &str = "grandTotal";
pub const LINE_ITEMS: &str = "lineItems";

#[derive(Debug, PartialEq, Error)]
pub enum RepairError {
    #[error("`lineItems` is a {0}, expected a list")]
    NotAList(&'static str),
    #[error("line item {index} is a {kind}, expected a map")]
    NotAMap { index: usize, kind: &'static str },
    #[error("line item {index}: `{field}` holds {value}, expected a number")]
    InvalidNumber {
        index: usize,
        field: &'static str,
        value: String,
    },
    #[error("grand total overflowed the decimal range")]
    Overflow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct RepairSummary {
    scanned: usize,
    updated: usize,
    unchanged: usize,
}

fn number_field(fields: &Fields, index: usize, field: &'static str) -> Result<Decimal, RepairError> {
    let invalid = |value: &Value| RepairError::InvalidNumber {
        index,
        field,
        value: value.to_string(),
    };

    match fields.get(field) {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::Integer(i)) => Ok(Decimal::from(*i)),
        Some(Value::Decimal(d)) => Ok(*d),
        Some(value @ Value::Float(f)) => Decimal::from_f64_retain(*f).ok_or_else(|| invalid(value)),
        Some(value @ Value::String(s)) => Decimal::from_str(s.trim()).map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

/// Sum of `quantity * unitCost` over the line items, in exact decimal
/// arithmetic. Missing quantities and costs count as zero.
pub fn recompute_grand_total(line_items: Option<&Value>) -> Result<Decimal, RepairError> {
    let mut total = dec!(0.00);
    let items = match line_items {
        None | Some(Value::Null) => return Ok(total),
        Some(Value::List(items)) => items,
        Some(other) => return Err(RepairError::NotAList(other.kind())),
    };

    for (index, item) in items.iter().enumerate() {
        let Value::Map(fields) = item else {
            return Err(RepairError::NotAMap { index, kind: item.kind() });
        };
        let quantity = number_field(fields, index, "quantity")?;
        let unit_cost = number_field(fields, index, "unitCost")?;

        total = quantity
            .checked_mul(unit_cost)
            .and_then(|line| total.checked_add(line))
            .ok_or(RepairError::Overflow)?;
    }

    Ok(total)
}

/// Exact numeric equality between the stored total and the recomputed one.
/// A stored float compares by its exact binary value, so `10.0` matches
/// `10.00` while `0.1` never matches decimal `0.1`. Missing or non-numeric
/// totals never match.
pub fn is_current(stored: Option<&Value>, recomputed: Decimal) -> bool {
    match stored {
        Some(Value::Decimal(d)) => *d == recomputed,
        Some(Value::Integer(i)) => Decimal::from(*i) == recomputed,
        Some(Value::Float(f)) => Decimal::from_f64_retain(*f).is_some_and(|d| d == recomputed),
        _ => false,
    }
}

fn describe(stored: Option<&Value>) -> String {
    stored.map_or_else(|| "missing".to_owned(), Value::to_string)
}

pub fn run<T: ExpenseTable + ?Sized>(table: &mut T) -> Result<RepairSummary> {
    info!("Scanning table: {}...", table.name());
    let items = store::scan_all(&*table).with_context(|| format!("failed to scan {}", table.name()))?;
    info!("Found {} items to check.", items.len());

    let mut summary = RepairSummary {
        scanned: items.len(),
        ..RepairSummary::default()
    };

    for item in &items {
        let id = item_key(item)?;
        let recomputed = recompute_grand_total(item.get(LINE_ITEMS))
            .with_context(|| format!("failed to recompute {GRAND_TOTAL} for {id}"))?;
        let current = item.get(GRAND_TOTAL);

        if is_current(current, recomputed) {
            info!("{}: grandTotal already correct ({})", id, describe(current));
            summary.unchanged += 1;
        } else {
            info!("Updating {}: {} -> {}", id, describe(current), recomputed);
            table
                .update_field(id, GRAND_TOTAL, Value::Decimal(recomputed))
                .with_context(|| format!("failed to update {GRAND_TOTAL} for {id}"))?;
            summary.updated += 1;
        }
    }

    info!(
        "Done fixing grand totals, updated={}, unchanged={}",
        summary.updated, summary.unchanged
    );

    Ok(summary)
}
