#![doc = "git2onenote-core: core reconciliation logic for git2onenote."]

//! This crate contains all reconciliation logic, data models and trigger
//! coordination for git2onenote. Vendor transport clients (GitLab REST,
//! Microsoft Graph) are not included here; they implement the traits in
//! [`contract`] from the binary crate.
//!
//! # Usage
//! Add this as a dependency for all shared reconciliation, scheduling,
//! encoding and coordination code.

pub mod config;
pub mod contract;
pub mod encode;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod schedule;
pub mod trigger;
