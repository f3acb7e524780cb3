use rust_decimal::Decimal;

use crate::document::{Fields, Value};
use crate::store::{ExpenseTable, Item, MemoryTable, ScanPage, StoreError};

/// Wraps a [`MemoryTable`] and records every write it receives.
pub struct RecordingTable {
    pub inner: MemoryTable,
    pub batches: Vec<usize>,
    pub updates: Vec<(String, String, Value)>,
    pub fail_on_batch: Option<usize>,
}

impl RecordingTable {
    pub fn new(inner: MemoryTable) -> RecordingTable {
        RecordingTable {
            inner,
            batches: Vec::new(),
            updates: Vec::new(),
            fail_on_batch: None,
        }
    }
}

impl ExpenseTable for RecordingTable {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn scan_page(&self, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        self.inner.scan_page(start_after)
    }

    fn batch_put(&mut self, items: Vec<Item>) -> Result<(), StoreError> {
        if self.fail_on_batch == Some(self.batches.len()) {
            return Err(StoreError::MissingKey);
        }
        self.batches.push(items.len());
        self.inner.batch_put(items)
    }

    fn update_field(&mut self, id: &str, field: &str, value: Value) -> Result<Value, StoreError> {
        self.updates.push((id.to_owned(), field.to_owned(), value.clone()));
        self.inner.update_field(id, field, value)
    }
}

pub fn line_item(quantity: Value, unit_cost: Value) -> Value {
    Value::Map(Fields::from_iter([
        ("category".to_owned(), Value::String("Feed".to_owned())),
        ("quantity".to_owned(), quantity),
        ("unitCost".to_owned(), unit_cost),
    ]))
}

pub fn stored_expense(id: &str, grand_total: Option<Value>, line_items: Vec<Value>) -> Item {
    let mut fields = Fields::from_iter([
        ("id".to_owned(), Value::String(id.to_owned())),
        ("vendor".to_owned(), Value::String("Hardware Co".to_owned())),
        ("lineItems".to_owned(), Value::List(line_items)),
        ("_version".to_owned(), Value::Integer(3)),
    ]);
    if let Some(total) = grand_total {
        fields.insert("grandTotal", total);
    }
    fields
}

pub fn decimal_of(item: Option<&Item>, field: &str) -> Option<Decimal> {
    match item.and_then(|item| item.get(field)) {
        Some(Value::Decimal(d)) => Some(*d),
        _ => None,
    }
}
