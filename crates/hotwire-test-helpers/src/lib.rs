//! Test utilities and fixtures for hotwire
//!
//! This crate provides shared test helpers for the integration tests
//! (tests/ directory) of the hotwire crates.

pub mod app;
pub mod fixtures;
pub mod mocks;
