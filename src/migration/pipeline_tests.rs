use anyhow::Result;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use super::test_support::decimal_of;
use super::{load, repair, transform};
use crate::config::{LoadConfig, TableConfig, TransformConfig};
use crate::document::Value;
use crate::store::{scan_all, JsonFileTable};

const SOURCE: &str = "\
id,userId,date,vendor,grandTotal,description,receiptImageKey,owner,_version,_lastChangedAt,_deleted,createdAt,updatedAt,unitCost,quantity,totalCost
exp-1,user-1,2024-03-02,Feed Store,,hay,,owner-1,1,1709337600000,,2024-03-02T10:00:00.000Z,2024-03-02T10:00:00.000Z,2.50,3,7.50
exp-2,user-1,2024-03-03,Hardware Co,7.5,nails,receipts/2.jpg,owner-1,2,1709424000000,false,2024-03-03T10:00:00.000Z,2024-03-03T10:00:00.000Z,2.50,3,7.50
";

#[test]
fn test_transform_load_repair_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("results.csv");
    std::fs::write(&csv_path, SOURCE)?;

    let transform_config = TransformConfig {
        csv_path,
        output_dir: dir.path().join("transformed"),
        ..TransformConfig::default()
    };
    let report = transform::run(&transform_config)?;
    assert_eq!(report.records().count(), 2);

    let load_config = LoadConfig {
        input: Some(transform_config.aggregate_path()),
        batch_size: 1,
        table: TableConfig::file("expenses", dir.path().join("tables")),
        ..LoadConfig::default()
    };
    let mut table = load_config.table.open()?;
    assert_eq!(load::run(&load_config, &mut table)?.loaded(), 2);
    let loaded = scan_all(&table)?;

    // A second upload of the same file leaves the table unchanged.
    load::run(&load_config, &mut table)?;
    assert_eq!(scan_all(&table)?, loaded);

    let summary = repair::run(&mut table)?;
    assert_eq!((summary.updated(), summary.unchanged()), (1, 1));
    assert_eq!(repair::run(&mut table)?.updated(), 0);

    let stored = JsonFileTable::open(&load_config.table.dir, &load_config.table.name)?;
    let repaired = decimal_of(stored.get("exp-1"), "grandTotal");
    assert_eq!(repaired, Some(dec!(7.50)));
    assert_eq!(repaired.map(|total| total.to_string()).as_deref(), Some("7.50"));
    assert_eq!(decimal_of(stored.get("exp-2"), "grandTotal"), Some(dec!(7.5)));
    assert_eq!(
        stored.get("exp-1").and_then(|item| item.get("receiptImageKey")),
        Some(&Value::Null)
    );
    assert_eq!(
        stored.get("exp-1").and_then(|item| item.get("_deleted")),
        Some(&Value::Bool(false))
    );

    Ok(())
}
