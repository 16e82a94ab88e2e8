#![allow(clippy::collapsible_if)]
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod streaming;
pub mod upload;
