//! Out-of-school education enrollment backend.
//!
//! Providers publish workshops, parents apply for their children and
//! administrators moderate both within their institution and territory.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod push;
pub mod queue;
pub mod search;
pub mod services;
pub mod state;
pub mod workers;

pub use error::{Error, ErrorResponse, Result, Typed};
