use std::fs;
use std::mem;

use anyhow::{Context, Result};
use getset::CopyGetters;
use log::info;
use thiserror::Error;

use crate::config::LoadConfig;
use crate::document::{self, SanitizeError, Value};
use crate::store::{ExpenseTable, Item, StoreError};

/// Records between two progress lines.
pub const PROGRESS_INTERVAL: usize = 25;

#[derive(Debug, PartialEq, Error)]
pub enum LoadError {
    #[error("expected a list of records, found {0}")]
    NotAList(&'static str),
    #[error("record {index} is a {kind}, expected an object")]
    NotAnObject { index: usize, kind: &'static str },
    #[error("{0}")]
    Sanitize(#[from] SanitizeError),
}

#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct LoadSummary {
    loaded: usize,
}

/// Sanitizes an aggregate document and splits it into table items.
pub fn prepare_items(document: Value) -> Result<Vec<Item>, LoadError> {
    let records = match document::sanitize(document)? {
        Value::List(records) => records,
        other => return Err(LoadError::NotAList(other.kind())),
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Map(fields) => Ok(fields),
            other => Err(LoadError::NotAnObject { index, kind: other.kind() }),
        })
        .collect()
}

/// Upserts `items` in batches of `batch_size`. A failed batch aborts the
/// upload; earlier batches stay written.
pub fn upload<T: ExpenseTable + ?Sized>(table: &mut T, items: Vec<Item>, batch_size: usize) -> Result<usize, StoreError> {
    let batch_size = batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut count = 0;

    for item in items {
        batch.push(item);
        count += 1;

        if batch.len() == batch_size {
            table.batch_put(mem::take(&mut batch))?;
        }
        if count % PROGRESS_INTERVAL == 0 {
            info!("Uploaded {} items...", count);
        }
    }

    if !batch.is_empty() {
        table.batch_put(batch)?;
    }

    Ok(count)
}

pub fn run<T: ExpenseTable + ?Sized>(config: &LoadConfig, table: &mut T) -> Result<LoadSummary> {
    config.validate()?;

    let input_path = config.input_path();
    let text = fs::read_to_string(&input_path).with_context(|| format!("failed to read {}", input_path.display()))?;
    let document =
        document::parse_lenient(&text).with_context(|| format!("failed to parse {}", input_path.display()))?;
    let items = prepare_items(document)?;

    info!(
        "Loaded and sanitized {} items from {}",
        items.len(),
        input_path.display()
    );

    let loaded = upload(&mut *table, items, config.batch_size)
        .with_context(|| format!("batch write to {} failed", table.name()))?;

    info!("Successfully uploaded {} items to {}", loaded, table.name());

    Ok(LoadSummary { loaded })
}
