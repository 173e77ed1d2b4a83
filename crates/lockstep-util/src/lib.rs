#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for lockstep.
//!
//! This crate provides pure helper functions with no logging/tracing dependencies.
//! Callers decide how failures are reported.

pub mod fs;
pub mod hash;
