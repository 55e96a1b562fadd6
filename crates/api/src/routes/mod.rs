//! HTTP handlers grouped by resource.

pub mod clients;
pub mod orders;
pub mod params;
pub mod products;
pub mod system;
