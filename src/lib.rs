//! docvault: client records with six fixed document slots, file uploads into a
//! per-client directory tree, and checkout/checkin tracking, served over HTTP.
//!
//! Layering, leaf first: `file_store` and `record_store` persist bytes and records,
//! `service` composes them per request, `server` maps HTTP routes onto `service`.

pub mod client;
pub mod config;
pub mod error;
pub mod file_store;
pub mod model;
pub mod record_store;
pub mod server;
pub mod service;
