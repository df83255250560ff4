pub mod cla;
pub mod comment;
pub mod committers;
pub mod config;
pub mod database;
pub mod error;
pub mod github;
pub mod ledger;
pub mod metrics;
pub mod resolver;
pub mod status;
pub mod webhooks;

pub use error::ClaError;
