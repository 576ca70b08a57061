//! Core domain types
//!
//! This module contains the run model and the lifecycle events derived from
//! it. These types are shared between the HTTP client (which fetches runs)
//! and the engine (which reconciles them and notifies consumers).

pub mod event;
pub mod run;
