use anyhow::Result;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use super::repair::*;
use super::test_support::{decimal_of, line_item, stored_expense, RecordingTable};
use crate::document::{Fields, Value};
use crate::store::{ExpenseTable, MemoryTable};

#[test]
fn test_recompute_sums_quantity_times_unit_cost() -> Result<()> {
    let items = Value::List(vec![
        line_item(Value::Integer(3), Value::Decimal(dec!(2.50))),
        line_item(Value::Decimal(dec!(2)), Value::String("1.25".to_owned())),
    ]);

    assert_eq!(recompute_grand_total(Some(&items))?, dec!(10.00));

    Ok(())
}

#[test]
fn test_recompute_keeps_cents_scale() -> Result<()> {
    let items = Value::List(vec![line_item(Value::Integer(3), Value::Decimal(dec!(2.5)))]);

    assert_eq!(recompute_grand_total(Some(&items))?.to_string(), "7.50");
    assert_eq!(recompute_grand_total(None)?.to_string(), "0.00");

    Ok(())
}

#[test]
fn test_recompute_missing_fields_count_as_zero() -> Result<()> {
    let items = Value::List(vec![
        Value::Map(Fields::from_iter([("unitCost".to_owned(), Value::Decimal(dec!(4)))])),
        line_item(Value::Null, Value::Decimal(dec!(9))),
        line_item(Value::Integer(2), Value::Decimal(dec!(1.10))),
    ]);

    assert_eq!(recompute_grand_total(Some(&items))?, dec!(2.20));
    assert_eq!(recompute_grand_total(Some(&Value::Null))?, dec!(0));

    Ok(())
}

#[test]
fn test_recompute_uses_exact_float_value() -> Result<()> {
    let items = Value::List(vec![line_item(Value::Integer(1), Value::Float(0.1))]);

    let total = recompute_grand_total(Some(&items))?;

    assert!(total != dec!(0.1));
    assert!((total - dec!(0.1)).abs() < dec!(0.0000000001));

    Ok(())
}

#[test]
fn test_recompute_rejects_non_numeric_fields() {
    let items = Value::List(vec![line_item(Value::Bool(true), Value::Decimal(dec!(1)))]);
    assert_eq!(
        recompute_grand_total(Some(&items)),
        Err(RepairError::InvalidNumber {
            index: 0,
            field: "quantity",
            value: "true".to_owned(),
        })
    );

    assert_eq!(
        recompute_grand_total(Some(&Value::String("[]".to_owned()))),
        Err(RepairError::NotAList("string"))
    );
    assert_eq!(
        recompute_grand_total(Some(&Value::List(vec![Value::Integer(1)]))),
        Err(RepairError::NotAMap { index: 0, kind: "integer" })
    );
}

#[test]
fn test_is_current_compares_numeric_value_exactly() {
    assert!(is_current(Some(&Value::Decimal(dec!(10.0))), dec!(10.00)));
    assert!(is_current(Some(&Value::Integer(10)), dec!(10.00)));
    assert!(is_current(Some(&Value::Float(10.0)), dec!(10.00)));

    assert!(!is_current(Some(&Value::Decimal(dec!(9.99))), dec!(10.00)));
    assert!(!is_current(Some(&Value::Float(0.1)), dec!(0.1)));
    assert!(!is_current(Some(&Value::String("10.00".to_owned())), dec!(10.00)));
    assert!(!is_current(Some(&Value::Null), dec!(0.00)));
    assert!(!is_current(None, dec!(0.00)));
}

#[test]
fn test_mismatch_triggers_single_update() -> Result<()> {
    let mut inner = MemoryTable::new("expenses");
    inner.batch_put(vec![
        stored_expense(
            "exp-1",
            Some(Value::Decimal(dec!(9.99))),
            vec![line_item(Value::Integer(4), Value::Decimal(dec!(2.50)))],
        ),
        stored_expense(
            "exp-2",
            Some(Value::Float(10.0)),
            vec![line_item(Value::Integer(1), Value::Decimal(dec!(10.00)))],
        ),
    ])?;
    let mut table = RecordingTable::new(inner);

    let summary = run(&mut table)?;

    assert_eq!((summary.scanned(), summary.updated(), summary.unchanged()), (2, 1, 1));
    assert_eq!(
        table.updates,
        vec![("exp-1".to_owned(), GRAND_TOTAL.to_owned(), Value::Decimal(dec!(10.00)))]
    );

    let repaired = table.inner.get("exp-1").cloned().unwrap_or_default();
    assert_eq!(decimal_of(Some(&repaired), GRAND_TOTAL), Some(dec!(10.00)));
    assert_eq!(repaired.get("vendor"), Some(&Value::String("Hardware Co".to_owned())));
    assert_eq!(repaired.get("_version"), Some(&Value::Integer(3)));

    Ok(())
}

#[test]
fn test_second_pass_performs_no_updates() -> Result<()> {
    let mut inner = MemoryTable::with_page_size("expenses", 2);
    inner.batch_put(
        ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| stored_expense(id, None, vec![line_item(Value::Integer(2), Value::Float(1.5))]))
            .collect(),
    )?;
    let mut table = RecordingTable::new(inner);

    let first = run(&mut table)?;
    assert_eq!((first.scanned(), first.updated()), (5, 5));

    let second = run(&mut table)?;
    assert_eq!((second.scanned(), second.updated(), second.unchanged()), (5, 0, 5));
    assert_eq!(table.updates.len(), 5);

    Ok(())
}

#[test]
fn test_invalid_record_aborts_after_earlier_updates() -> Result<()> {
    let mut inner = MemoryTable::new("expenses");
    inner.batch_put(vec![
        stored_expense("a", None, vec![line_item(Value::Integer(1), Value::Decimal(dec!(3)))]),
        stored_expense("b", None, vec![line_item(Value::String("two".to_owned()), Value::Decimal(dec!(3)))]),
        stored_expense("c", None, vec![]),
    ])?;
    let mut table = RecordingTable::new(inner);

    assert!(run(&mut table).is_err());
    assert_eq!(decimal_of(table.inner.get("a"), GRAND_TOTAL), Some(dec!(3)));
    assert_eq!(decimal_of(table.inner.get("c"), GRAND_TOTAL), None);

    Ok(())
}
