use std::io;
use std::path::PathBuf;

use enum_dispatch::enum_dispatch;
use thiserror::Error;

use crate::document::{DocumentError, Fields, Value};

pub mod dynamo;
pub mod file;
pub mod memory;


pub use dynamo::DynamoTable;
pub use file::JsonFileTable;
pub use memory::MemoryTable;

/// Attribute holding the primary key of every item.
pub const KEY_ATTRIBUTE: &str = "id";

pub type Item = Fields;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item has no string `{KEY_ATTRIBUTE}` attribute")]
    MissingKey,
    #[error("table file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("table file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("table file {path} holds a malformed item: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("{operation} request failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: Box<aws_sdk_dynamodb::Error>,
    },
    #[error("{remaining} writes were still unprocessed after retrying")]
    Unprocessed { remaining: usize },
    #[error("attribute cannot be converted: {0}")]
    Attribute(String),
    #[error("failed to start the request runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// One page of a full table scan. `last_key` is set when more items follow.
#[derive(Debug, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    pub last_key: Option<String>,
}

#[enum_dispatch]
pub trait ExpenseTable {
    fn name(&self) -> &str;

    /// Returns the page of items following the item keyed `start_after`.
    fn scan_page(&self, start_after: Option<&str>) -> Result<ScanPage, StoreError>;

    /// Upserts every item, replacing any stored item with the same key.
    /// Within one batch the last item for a key wins.
    fn batch_put(&mut self, items: Vec<Item>) -> Result<(), StoreError>;

    /// Sets a single attribute of the item keyed by `id` and returns the new value.
    fn update_field(&mut self, id: &str, field: &str, value: Value) -> Result<Value, StoreError>;
}

#[enum_dispatch(ExpenseTable)]
pub enum Table {
    MemoryTable,
    JsonFileTable,
    DynamoTable,
}

pub fn item_key(item: &Item) -> Result<&str, StoreError> {
    item.get(KEY_ATTRIBUTE)
        .and_then(Value::as_str)
        .ok_or(StoreError::MissingKey)
}

/// Follows scan pages until the table reports no further key.
pub fn scan_all<T: ExpenseTable + ?Sized>(table: &T) -> Result<Vec<Item>, StoreError> {
    let mut items = Vec::new();
    let mut start_after: Option<String> = None;

    loop {
        let page = table.scan_page(start_after.as_deref())?;
        items.extend(page.items);
        match page.last_key {
            Some(key) => start_after = Some(key),
            None => break,
        }
    }

    Ok(items)
}
