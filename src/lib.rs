pub mod app;
pub mod common;
pub mod config;
pub mod data_model;
pub mod flows;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod probe_engine;
pub mod probe_ops;
pub mod runtime;
pub mod settings;
pub mod storage;

#[cfg(test)]
mod test_support;
