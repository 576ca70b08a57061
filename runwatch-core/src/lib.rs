//! Runwatch Core
//!
//! Core types shared by the run synchronization engine and its collaborators.
//!
//! This crate contains:
//! - Domain types: runs, statuses, lifecycle events and transitions
//! - DTOs: wire records from the remote run API and launcher announcements

pub mod domain;
pub mod dto;
