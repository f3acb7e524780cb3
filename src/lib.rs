pub mod config;
pub mod document;
pub mod expense;
pub mod migration;
pub mod store;
