pub mod args;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod formatter;
pub mod logger;
pub mod reconciler;
pub mod record;
pub mod spf;
pub mod store;
pub mod validation;
