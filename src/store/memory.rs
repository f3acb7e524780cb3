use std::collections::BTreeMap;
use std::ops::Bound;

use super::{item_key, ExpenseTable, Item, ScanPage, StoreError, KEY_ATTRIBUTE};
use crate::document::{Fields, Value};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    page_size: usize,
    items: BTreeMap<String, Item>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> MemoryTable {
        MemoryTable::with_page_size(name, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(name: impl Into<String>, page_size: usize) -> MemoryTable {
        MemoryTable {
            name: name.into(),
            page_size: page_size.max(1),
            items: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(super) fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }
}

impl ExpenseTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan_page(&self, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        let lower = match start_after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let mut remaining = self
            .items
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, item)| item);

        let items: Vec<Item> = remaining.by_ref().take(self.page_size).cloned().collect();
        let last_key = match remaining.next() {
            Some(_) => items.last().map(item_key).transpose()?.map(str::to_owned),
            None => None,
        };

        Ok(ScanPage { items, last_key })
    }

    fn batch_put(&mut self, items: Vec<Item>) -> Result<(), StoreError> {
        // Reject the whole batch before writing any of it.
        let keys = items
            .iter()
            .map(|item| item_key(item).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;

        for (key, item) in keys.into_iter().zip(items) {
            self.items.insert(key, item);
        }

        Ok(())
    }

    fn update_field(&mut self, id: &str, field: &str, value: Value) -> Result<Value, StoreError> {
        let item = self.items.entry(id.to_owned()).or_insert_with(|| {
            let mut fields = Fields::new();
            fields.insert(KEY_ATTRIBUTE, Value::String(id.to_owned()));
            fields
        });
        item.insert(field, value.clone());

        Ok(value)
    }
}
