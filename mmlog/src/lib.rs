pub mod api;
pub mod cli;
pub mod error;
pub mod format;
pub mod models;
pub mod reconcile;
pub mod schema;
pub mod services;
pub mod settings;
