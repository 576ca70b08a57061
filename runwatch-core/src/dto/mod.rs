//! Data Transfer Objects
//!
//! Lightweight representations of runs as they travel over the wire from
//! the remote run API, and as the job launcher announces them.

pub mod run;
