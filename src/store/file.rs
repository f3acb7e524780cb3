use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::memory::{MemoryTable, DEFAULT_PAGE_SIZE};
use super::{ExpenseTable, Item, ScanPage, StoreError};
use crate::document::typed::{fields_from_typed_json, fields_to_typed_json};
use crate::document::Value;

/// A table persisted as a single JSON array of typed items at
/// `<dir>/<name>.json`. Every mutation rewrites the file.
#[derive(Debug)]
pub struct JsonFileTable {
    path: PathBuf,
    table: MemoryTable,
}

impl JsonFileTable {
    pub fn open(dir: &Path, name: &str) -> Result<JsonFileTable, StoreError> {
        JsonFileTable::open_with_page_size(dir, name, DEFAULT_PAGE_SIZE)
    }

    pub fn open_with_page_size(dir: &Path, name: &str, page_size: usize) -> Result<JsonFileTable, StoreError> {
        let path = dir.join(format!("{name}.json"));
        let mut table = MemoryTable::with_page_size(name, page_size);

        match fs::read_to_string(&path) {
            Ok(text) => {
                let items = parse_items(&path, &text)?;
                debug!("opened table file {}, items={}", path.display(), items.len());
                table.batch_put(items)?;
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("table file {} does not exist yet, starting empty", path.display());
            },
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        Ok(JsonFileTable { path, table })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.table.get(id)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let items: Vec<serde_json::Value> = self.table.items().map(fields_to_typed_json).collect();
        let tmp_path = self.path.with_extension("json.tmp");
        let file = fs::File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &items).map_err(|source| StoreError::Json {
            path: tmp_path.clone(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }
}

fn parse_items(path: &Path, text: &str) -> Result<Vec<Item>, StoreError> {
    let json: Vec<serde_json::Value> = serde_json::from_str(text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    json.into_iter()
        .map(|item| {
            fields_from_typed_json(item).map_err(|source| StoreError::Document {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

impl ExpenseTable for JsonFileTable {
    fn name(&self) -> &str {
        self.table.name()
    }

    fn scan_page(&self, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        self.table.scan_page(start_after)
    }

    fn batch_put(&mut self, items: Vec<Item>) -> Result<(), StoreError> {
        self.table.batch_put(items)?;
        self.persist()
    }

    fn update_field(&mut self, id: &str, field: &str, value: Value) -> Result<Value, StoreError> {
        let value = self.table.update_field(id, field, value)?;
        self.persist()?;

        Ok(value)
    }
}
