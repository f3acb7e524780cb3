use std::collections::HashMap;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use tokio::runtime::Runtime;

use super::{item_key, ExpenseTable, Item, ScanPage, StoreError, KEY_ATTRIBUTE};
use crate::document::{Fields, Value};

/// Largest number of put requests DynamoDB accepts in one `BatchWriteItem`.
pub const MAX_BATCH_WRITE: usize = 25;

const MAX_WRITE_ATTEMPTS: u32 = 5;

/// A DynamoDB table. Each call blocks on a private current-thread runtime so
/// the passes stay linear.
#[derive(Debug)]
pub struct DynamoTable {
    name: String,
    client: Client,
    runtime: Runtime,
}

impl DynamoTable {
    /// Builds a client from the default AWS credential chain. `region` and
    /// `endpoint_url` override what the environment provides, the latter for
    /// DynamoDB Local.
    pub fn connect(name: &str, region: Option<&str>, endpoint_url: Option<&str>) -> Result<DynamoTable, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_owned()));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = runtime.block_on(loader.load());
        let client = Client::new(&sdk_config);

        info!("connected to DynamoDB table {}", name);

        Ok(DynamoTable {
            name: name.to_owned(),
            client,
            runtime,
        })
    }

    fn write_chunk(&self, mut requests: Vec<WriteRequest>) -> Result<(), StoreError> {
        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let output = self
                .runtime
                .block_on(self.client.batch_write_item().request_items(&self.name, requests).send())
                .map_err(|err| remote("BatchWriteItem", err))?;

            requests = output
                .unprocessed_items
                .and_then(|mut unprocessed| unprocessed.remove(&self.name))
                .unwrap_or_default();
            if requests.is_empty() {
                return Ok(());
            }

            warn!("{} writes unprocessed after attempt {}, retrying", requests.len(), attempt + 1);
            thread::sleep(Duration::from_millis(100 << attempt));
        }

        Err(StoreError::Unprocessed {
            remaining: requests.len(),
        })
    }
}

impl ExpenseTable for DynamoTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan_page(&self, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        let exclusive_start_key = start_after
            .map(|id| HashMap::from([(KEY_ATTRIBUTE.to_owned(), AttributeValue::S(id.to_owned()))]));

        let output = self
            .runtime
            .block_on(
                self.client
                    .scan()
                    .table_name(&self.name)
                    .set_exclusive_start_key(exclusive_start_key)
                    .send(),
            )
            .map_err(|err| remote("Scan", err))?;

        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_from_attributes)
            .collect::<Result<Vec<_>, _>>()?;
        let last_key = match output.last_evaluated_key {
            Some(key) => Some(
                key.get(KEY_ATTRIBUTE)
                    .and_then(|id| id.as_s().ok())
                    .cloned()
                    .ok_or(StoreError::MissingKey)?,
            ),
            None => None,
        };
        debug!("scanned {} items from {}, more={}", items.len(), self.name, last_key.is_some());

        Ok(ScanPage { items, last_key })
    }

    fn batch_put(&mut self, items: Vec<Item>) -> Result<(), StoreError> {
        let requests = last_per_key(items)?
            .iter()
            .map(put_request)
            .collect::<Result<Vec<_>, _>>()?;

        for chunk in requests.chunks(MAX_BATCH_WRITE) {
            self.write_chunk(chunk.to_vec())?;
        }

        Ok(())
    }

    fn update_field(&mut self, id: &str, field: &str, value: Value) -> Result<Value, StoreError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .update_item()
                    .table_name(&self.name)
                    .key(KEY_ATTRIBUTE, AttributeValue::S(id.to_owned()))
                    .update_expression("SET #field = :value")
                    .expression_attribute_names("#field", field)
                    .expression_attribute_values(":value", to_attribute(&value)?)
                    .return_values(ReturnValue::UpdatedNew)
                    .send(),
            )
            .map_err(|err| remote("UpdateItem", err))?;

        match output.attributes.and_then(|mut attributes| attributes.remove(field)) {
            Some(updated) => from_attribute(updated),
            None => Ok(value),
        }
    }
}

fn remote(operation: &'static str, err: impl Into<aws_sdk_dynamodb::Error>) -> StoreError {
    StoreError::Remote {
        operation,
        source: Box::new(err.into()),
    }
}

fn put_request(item: &Item) -> Result<WriteRequest, StoreError> {
    let put = PutRequest::builder()
        .set_item(Some(item_to_attributes(item)?))
        .build()
        .map_err(|err| StoreError::Attribute(err.to_string()))?;

    Ok(WriteRequest::builder().put_request(put).build())
}

/// Keeps the last item for every key, at the position its key first appeared.
/// DynamoDB rejects a batch that names one key twice.
pub fn last_per_key(items: Vec<Item>) -> Result<Vec<Item>, StoreError> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Item> = Vec::with_capacity(items.len());

    for item in items {
        let key = item_key(&item)?.to_owned();
        match positions.get(&key) {
            Some(&position) => unique[position] = item,
            None => {
                positions.insert(key, unique.len());
                unique.push(item);
            },
        }
    }

    Ok(unique)
}

pub fn to_attribute(value: &Value) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Integer(integer) => AttributeValue::N(integer.to_string()),
        Value::Float(float) if float.is_finite() => AttributeValue::N(float.to_string()),
        Value::Float(float) => return Err(StoreError::Attribute(format!("non-finite number {float}"))),
        Value::Decimal(decimal) => AttributeValue::N(decimal.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::List(values) => AttributeValue::L(values.iter().map(to_attribute).collect::<Result<_, _>>()?),
        Value::Map(fields) => AttributeValue::M(item_to_attributes(fields)?),
    })
}

pub fn from_attribute(attribute: AttributeValue) -> Result<Value, StoreError> {
    Ok(match attribute {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(flag) => Value::Bool(flag),
        AttributeValue::N(number) => parse_number(&number)?,
        AttributeValue::S(text) => Value::String(text),
        AttributeValue::L(values) => Value::List(values.into_iter().map(from_attribute).collect::<Result<_, _>>()?),
        AttributeValue::M(attributes) => Value::Map(item_from_attributes(attributes)?),
        other => return Err(StoreError::Attribute(format!("unsupported attribute type {other:?}"))),
    })
}

pub fn item_to_attributes(item: &Fields) -> Result<HashMap<String, AttributeValue>, StoreError> {
    item.iter()
        .map(|(key, value)| -> Result<_, StoreError> { Ok((key.to_owned(), to_attribute(value)?)) })
        .collect()
}

/// Attribute maps come back unordered, so keys are sorted for a stable item.
pub fn item_from_attributes(attributes: HashMap<String, AttributeValue>) -> Result<Fields, StoreError> {
    let mut pairs: Vec<(String, AttributeValue)> = attributes.into_iter().collect();
    pairs.sort_by(|(a, _), (b, _)| a.cmp(b));

    pairs
        .into_iter()
        .map(|(key, attribute)| -> Result<_, StoreError> { Ok((key, from_attribute(attribute)?)) })
        .collect()
}

/// Numbers without a fraction or exponent that fit an `i64` read back as
/// integers; everything else is an exact decimal.
fn parse_number(number: &str) -> Result<Value, StoreError> {
    if let Ok(integer) = number.parse::<i64>() {
        return Ok(Value::Integer(integer));
    }

    Decimal::from_str(number)
        .or_else(|_| Decimal::from_scientific(number))
        .map(Value::Decimal)
        .map_err(|_| StoreError::Attribute(format!("number {number} does not fit a decimal")))
}
