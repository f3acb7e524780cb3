use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use getset::Getters;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::config::TransformConfig;
use crate::expense::{ExpenseRecord, LineItem};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, PartialEq, Error)]
pub enum TransformError {
    #[error("missing required column `{0}`")]
    MissingField(&'static str),
    #[error("column `{column}` holds `{value}`, expected {expected}")]
    InvalidValue {
        column: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("unreadable row: {0}")]
    Unreadable(String),
}

#[derive(Debug, PartialEq, Error)]
pub enum LineItemsError {
    #[error("not valid JSON: {0}")]
    Json(String),
    #[error("expected a list of line items")]
    NotAList,
    #[error("line item {index} is not an `M` attribute map")]
    NotAMap { index: usize },
    #[error("line item {index} has no `{field}.{tag}` attribute")]
    MissingAttribute {
        index: usize,
        field: &'static str,
        tag: &'static str,
    },
    #[error("line item {index}: `{value}` is not a valid {field}")]
    InvalidNumber {
        index: usize,
        field: &'static str,
        value: String,
    },
}

/// One row of the source export. Every column is optional here; empty cells
/// deserialize to `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SourceRow {
    pub id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub date: Option<String>,
    pub vendor: Option<String>,
    #[serde(rename = "grandTotal")]
    pub grand_total: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "receiptImageKey")]
    pub receipt_image_key: Option<String>,
    #[serde(rename = "lineItems")]
    pub line_items: Option<String>,
    pub owner: Option<String>,
    #[serde(rename = "_version")]
    pub version: Option<String>,
    #[serde(rename = "_lastChangedAt")]
    pub last_changed_at: Option<String>,
    #[serde(rename = "_deleted")]
    pub deleted: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,

    // Flat columns used when the row has no decodable line items.
    pub category: Option<String>,
    pub item: Option<String>,
    #[serde(rename = "unitCost")]
    pub unit_cost: Option<String>,
    pub quantity: Option<String>,
    #[serde(rename = "totalCost")]
    pub total_cost: Option<String>,
}

#[derive(Debug)]
pub enum RowOutcome {
    Transformed { record: ExpenseRecord, warnings: Vec<String> },
    Failed { row: usize, id: Option<String>, reason: TransformError },
}

#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct TransformReport {
    outcomes: Vec<RowOutcome>,
    aggregate_path: PathBuf,
}

impl TransformReport {
    pub fn records(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            RowOutcome::Transformed { record, .. } => Some(record),
            RowOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RowOutcome::Failed { .. }))
    }

    pub fn warning_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                RowOutcome::Transformed { warnings, .. } => warnings.len(),
                RowOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// DynamoDB attribute-value form of a single line item, e.g.
/// `{"M": {"unitCost": {"N": "2.5"}, ...}}`.
#[derive(Debug, Deserialize)]
struct TypedLineItem {
    #[serde(rename = "M")]
    attributes: serde_json::Map<String, serde_json::Value>,
}

fn typed_attribute<'a>(
    item: &'a TypedLineItem,
    index: usize,
    field: &'static str,
    tag: &'static str,
) -> Result<&'a str, LineItemsError> {
    item.attributes
        .get(field)
        .and_then(|attribute| attribute.get(tag))
        .and_then(serde_json::Value::as_str)
        .ok_or(LineItemsError::MissingAttribute { index, field, tag })
}

/// Decodes the `lineItems` column. Exports double the quotes inside the
/// cell, so `""` is collapsed before parsing.
pub fn decode_line_items(raw: &str) -> Result<Vec<LineItem>, LineItemsError> {
    let json = raw.replace("\"\"", "\"");
    let parsed: serde_json::Value = serde_json::from_str(&json).map_err(|err| LineItemsError::Json(err.to_string()))?;
    let serde_json::Value::Array(entries) = parsed else {
        return Err(LineItemsError::NotAList);
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| -> Result<LineItem, LineItemsError> {
            let item: TypedLineItem =
                serde_json::from_value(entry).map_err(|_| LineItemsError::NotAMap { index })?;
            let invalid = |field: &'static str, value: &str| LineItemsError::InvalidNumber {
                index,
                field,
                value: value.to_owned(),
            };

            let unit_cost = typed_attribute(&item, index, "unitCost", "N")?;
            let quantity = typed_attribute(&item, index, "quantity", "N")?;
            let line_total = typed_attribute(&item, index, "lineTotal", "N")?;

            Ok(LineItem {
                category: typed_attribute(&item, index, "category", "S")?.to_owned(),
                item: typed_attribute(&item, index, "item", "S")?.to_owned(),
                unit_cost: parse_float(unit_cost).ok_or_else(|| invalid("unitCost", unit_cost))?,
                quantity: parse_integer(quantity).ok_or_else(|| invalid("quantity", quantity))?,
                line_total: parse_float(line_total).ok_or_else(|| invalid("lineTotal", line_total))?,
            })
        })
        .collect()
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Accepts plain integers and floats without a fractional part, as
/// spreadsheet exports often write `3.0` for `3`.
fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(integer) = value.parse::<i64>() {
        return Some(integer);
    }

    let float = value.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn required(value: Option<String>, column: &'static str) -> Result<String, TransformError> {
    value.ok_or(TransformError::MissingField(column))
}

fn parsed<T>(
    value: Option<String>,
    column: &'static str,
    expected: &'static str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, TransformError> {
    match value {
        None => Ok(default),
        Some(raw) => parse(&raw).ok_or(TransformError::InvalidValue {
            column,
            value: raw,
            expected,
        }),
    }
}

fn required_integer(value: Option<String>, column: &'static str) -> Result<i64, TransformError> {
    let raw = required(value, column)?;
    parse_integer(&raw).ok_or(TransformError::InvalidValue {
        column,
        value: raw,
        expected: "an integer",
    })
}

fn flat_line_item(row: &mut SourceRow) -> Result<LineItem, TransformError> {
    Ok(LineItem {
        category: row.category.take().unwrap_or_else(|| UNKNOWN.to_owned()),
        item: row.item.take().unwrap_or_else(|| UNKNOWN.to_owned()),
        unit_cost: parsed(row.unit_cost.take(), "unitCost", "a number", 0.0, parse_float)?,
        quantity: parsed(row.quantity.take(), "quantity", "an integer", 1, parse_integer)?,
        line_total: parsed(row.total_cost.take(), "totalCost", "a number", 0.0, parse_float)?,
    })
}

/// Builds the record for one row. Line items that fail to decode are not an
/// error: they fall back to a single item from the flat columns and the
/// reason is returned as a warning.
pub fn transform_row(mut row: SourceRow) -> Result<(ExpenseRecord, Vec<String>), TransformError> {
    let id = required(row.id.take(), "id")?;
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(TransformError::InvalidValue {
            column: "id",
            value: id,
            expected: "an id usable as a file name",
        });
    }

    let mut warnings = Vec::new();
    let decoded = match row.line_items.take() {
        Some(raw) => match decode_line_items(&raw) {
            Ok(items) => Some(items),
            Err(err) => {
                warn!("error parsing lineItems for {}: {}", id, err);
                warnings.push(format!("lineItems: {err}"));
                None
            },
        },
        None => None,
    };
    let line_items = match decoded {
        Some(items) => items,
        None => vec![flat_line_item(&mut row)?],
    };

    let record = ExpenseRecord {
        user_id: required(row.user_id, "userId")?,
        date: required(row.date, "date")?,
        vendor: row.vendor.unwrap_or_default(),
        grand_total: parsed(row.grand_total, "grandTotal", "a number", f64::NAN, parse_float)?,
        description: row.description.unwrap_or_default(),
        receipt_image_key: row.receipt_image_key,
        line_items,
        owner: required(row.owner, "owner")?,
        version: required_integer(row.version, "_version")?,
        last_changed_at: required_integer(row.last_changed_at, "_lastChangedAt")?,
        deleted: parsed(row.deleted, "_deleted", "a boolean", false, parse_flag)?,
        created_at: required(row.created_at, "createdAt")?,
        updated_at: required(row.updated_at, "updatedAt")?,
        id,
    };

    Ok((record, warnings))
}

/// Transforms every row of a CSV source. Only an unreadable header is fatal;
/// each row's failure is kept in its outcome.
pub fn transform_reader<R: Read>(reader: R) -> Result<Vec<RowOutcome>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers().context("failed to read the header row")?;
    debug!("source columns: {:?}", headers);

    let mut outcomes = Vec::new();
    for (index, record) in csv_reader.deserialize::<SourceRow>().enumerate() {
        let row = index + 1;
        let outcome = match record {
            Ok(source) => {
                let id = source.id.clone();
                match transform_row(source) {
                    Ok((record, warnings)) => RowOutcome::Transformed { record, warnings },
                    Err(reason) => RowOutcome::Failed { row, id, reason },
                }
            },
            Err(err) => RowOutcome::Failed {
                row,
                id: None,
                reason: TransformError::Unreadable(err.to_string()),
            },
        };

        if let RowOutcome::Failed { row, id, reason } = &outcome {
            warn!("skipping row {}, id={:?}, err={}", row, id, reason);
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut serializer)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush()?;

    Ok(())
}

pub fn run(config: &TransformConfig) -> Result<TransformReport> {
    let source = File::open(&config.csv_path)
        .with_context(|| format!("failed to open source table {}", config.csv_path.display()))?;
    let outcomes = transform_reader(source)?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create output directory {}", config.output_dir.display()))?;

    let report = TransformReport {
        outcomes,
        aggregate_path: config.aggregate_path(),
    };

    let records: Vec<&ExpenseRecord> = report.records().collect();
    for record in &records {
        write_pretty(&config.output_dir.join(format!("{}.json", record.id)), record)?;
    }
    write_pretty(report.aggregate_path(), &records)?;

    info!("Transformed {} records.", records.len());
    info!(
        "Output folder: {}, failed rows={}, warnings={}",
        config.output_dir.display(),
        report.failures().count(),
        report.warning_count()
    );

    Ok(report)
}
