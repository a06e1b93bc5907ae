//! HTTP request handlers for the precipitation API.

pub mod cache;
pub mod health;
pub mod landing;
pub mod params;
pub mod periods;
pub mod precipitation;
pub mod timeseries;
