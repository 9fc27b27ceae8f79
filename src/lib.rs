#![forbid(unsafe_code)]

#[cfg(feature = "browser")]
pub mod browser;
pub mod build;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod fetch;
pub mod formats;
pub mod index;
pub mod logging;
pub mod package;
pub mod resources;
pub mod rewrite;
pub mod sources;
pub mod toc;
