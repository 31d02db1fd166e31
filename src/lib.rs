#![forbid(unsafe_code)]

pub mod api;
pub mod cli;
pub mod crawl;
pub mod error;
pub mod export;
pub mod formats;
pub mod import;
pub mod logging;
pub mod openapi;
pub mod store;
