//! vidlink - direct video link extraction for file hosting platforms.
//!
//! Resolves share and embed links from hosting platforms into playable
//! direct links, with expiry tracking, caching and a scheduled refresh of
//! stored links.

#![allow(clippy::should_implement_trait)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod expiry;
pub mod extractors;
pub mod http_client;
pub mod models;
pub mod rate_limit;
pub mod refresh;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod server;
pub mod token;
pub mod utils;
