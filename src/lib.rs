//! linkcycle - link lifecycle and quota engine for URL shorteners
//!
//! This library owns the lifecycle of short links: collision-free code
//! assignment, soft deletion into an archive, restore, per-role quotas
//! and the scheduled jobs that reconcile all of it.
//!
//! # Architecture
//! - `storage`: SeaORM persistence for links, the archive and users
//! - `services`: link / archive / quota / redirect / user operations
//! - `scheduler`: expire, enforce-quota and purge-archive jobs plus the retrying runner
//! - `config`: Configuration management
//! - `system`: Logging initialization
//! - `cli`: Command-line definitions for the `linkcycle` binary

pub mod cli;
pub mod config;
pub mod errors;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
