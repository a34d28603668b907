//! Environmental data backend.
//!
//! Two independent flows share this crate: sensor readings posted to
//! `/api/data` ([`api`]) and current weather fetched from OpenWeather
//! ([`weather`]). Both write through the [`db::Storage`] seam.

pub mod api;
pub mod config;
pub mod db;
pub mod measurement;
pub mod schema;
pub mod weather;
