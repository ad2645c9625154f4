//! Luna Job Tracker
//!
//! Client-side library for the Luna lunar DEM processing service: validates
//! and uploads images, tracks the resulting asynchronous jobs by polling their
//! status, and retrieves the generated Digital Elevation Model artifacts and
//! their quality analysis.

pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod tracker;
