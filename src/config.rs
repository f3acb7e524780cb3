use std::path::PathBuf;

use clap::{Args, ValueEnum};
use thiserror::Error;

use crate::store::{DynamoTable, JsonFileTable, StoreError, Table};

pub const DEFAULT_CSV_PATH: &str = "results.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "transformed_expenses_v2";
pub const DEFAULT_AGGREGATE_FILE_NAME: &str = "all_transformed_expenses.json";
pub const DEFAULT_TABLE_NAME: &str = "Expense-hziuk4texngnpdushazijd3p5q-main";
pub const DEFAULT_TABLE_DIR: &str = "tables";
pub const DEFAULT_BATCH_SIZE: usize = 25;

#[derive(Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
}

#[derive(Debug, Clone, Args)]
pub struct TransformConfig {
    /// Tabular export to transform
    #[arg(long = "csv", env = "EXPENSE_CSV", default_value = DEFAULT_CSV_PATH)]
    pub csv_path: PathBuf,

    /// Directory receiving one JSON file per record plus the aggregate file
    #[arg(long, env = "EXPENSE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// File name of the aggregate JSON inside the output directory
    #[arg(long = "aggregate", default_value = DEFAULT_AGGREGATE_FILE_NAME)]
    pub aggregate_file_name: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            aggregate_file_name: DEFAULT_AGGREGATE_FILE_NAME.to_owned(),
        }
    }
}

impl TransformConfig {
    pub fn aggregate_path(&self) -> PathBuf {
        self.output_dir.join(&self.aggregate_file_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// The DynamoDB table named by `--table`
    Dynamo,
    /// A typed-JSON file `<table-dir>/<table>.json`
    File,
}

#[derive(Debug, Clone, Args)]
pub struct TableConfig {
    /// Name of the expense table
    #[arg(long = "table", env = "EXPENSE_TABLE", default_value = DEFAULT_TABLE_NAME)]
    pub name: String,

    /// Where the table lives
    #[arg(long, env = "EXPENSE_BACKEND", value_enum, default_value_t = Backend::Dynamo)]
    pub backend: Backend,

    /// Directory holding the table files of the `file` backend
    #[arg(long = "table-dir", env = "EXPENSE_TABLE_DIR", default_value = DEFAULT_TABLE_DIR)]
    pub dir: PathBuf,

    /// AWS region, overriding the environment and profile
    #[arg(long, env = "EXPENSE_REGION")]
    pub region: Option<String>,

    /// DynamoDB endpoint, e.g. `http://localhost:8000` for DynamoDB Local
    #[arg(long = "endpoint-url", env = "EXPENSE_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            name: DEFAULT_TABLE_NAME.to_owned(),
            backend: Backend::Dynamo,
            dir: PathBuf::from(DEFAULT_TABLE_DIR),
            region: None,
            endpoint_url: None,
        }
    }
}

impl TableConfig {
    /// A `file` backend table under `dir`.
    pub fn file(name: impl Into<String>, dir: impl Into<PathBuf>) -> TableConfig {
        TableConfig {
            name: name.into(),
            backend: Backend::File,
            dir: dir.into(),
            ..TableConfig::default()
        }
    }

    pub fn open(&self) -> Result<Table, StoreError> {
        match self.backend {
            Backend::Dynamo => {
                Ok(DynamoTable::connect(&self.name, self.region.as_deref(), self.endpoint_url.as_deref())?.into())
            },
            Backend::File => Ok(JsonFileTable::open(&self.dir, &self.name)?.into()),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct LoadConfig {
    /// Aggregate JSON file to load [default: <output-dir>/<aggregate>]
    #[arg(long = "input", env = "EXPENSE_INPUT")]
    pub input: Option<PathBuf>,

    /// Output directory of `transform`, used when `--input` is not given
    #[arg(long, env = "EXPENSE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// File name of the aggregate JSON inside the output directory
    #[arg(long = "aggregate", default_value = DEFAULT_AGGREGATE_FILE_NAME)]
    pub aggregate_file_name: String,

    /// Number of records per batch write
    #[arg(long, env = "EXPENSE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[command(flatten)]
    pub table: TableConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        LoadConfig {
            input: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            aggregate_file_name: DEFAULT_AGGREGATE_FILE_NAME.to_owned(),
            batch_size: DEFAULT_BATCH_SIZE,
            table: TableConfig::default(),
        }
    }
}

impl LoadConfig {
    /// The explicit `--input`, otherwise the aggregate file `transform`
    /// writes into the same output directory.
    pub fn input_path(&self) -> PathBuf {
        match &self.input {
            Some(input) => input.clone(),
            None => self.output_dir.join(&self.aggregate_file_name),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct RepairConfig {
    #[command(flatten)]
    pub table: TableConfig,
}
