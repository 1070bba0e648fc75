//! Motion pipeline domain: data model, pipeline stages and settings

pub mod connection;
pub mod filter;
pub mod imu;
pub mod integrator;
pub mod models;
pub mod settings;
