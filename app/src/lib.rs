//! # Wild Rydes
//!
//! Process assembly for the two Wild Rydes services:
//!
//! - `ride-api`: `POST /ride` plus the in-process dispatch workflow
//!   (receipt pipeline, ride records, stats, payroll)
//! - `receipt-service`: the flaky receipt post-processing endpoint
//!
//! Configuration comes from the environment (see [`Config::from_env`]);
//! a `.env` file is honoured by the binaries.

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use bootstrap::{RideApi, Stores};
pub use config::Config;
