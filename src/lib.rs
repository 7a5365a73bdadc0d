//! Personal notes service: a bearer-token REST API over an owner-scoped
//! note store, plus the client-side session guard and note cache.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod notes;
pub mod state;
pub mod summarizer;
