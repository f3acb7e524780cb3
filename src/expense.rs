use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub category: String,
    pub item: String,
    pub unit_cost: f64,
    pub quantity: i64,
    /// Informational only, the grand total is derived from unit cost and quantity.
    pub line_total: f64,
}

/// An expense as written to the transformed JSON files. Field order matches
/// the order of the keys in the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub vendor: String,
    /// NaN when the source had no total, which serializes as null.
    pub grand_total: f64,
    pub description: String,
    pub receipt_image_key: Option<String>,
    pub line_items: Vec<LineItem>,
    pub owner: String,
    #[serde(rename = "_version")]
    pub version: i64,
    #[serde(rename = "_lastChangedAt")]
    pub last_changed_at: i64,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}
