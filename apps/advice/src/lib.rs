//! # advice
//!
//! Command-line driver for the Advice Taker. All reasoning lives in
//! `advice-core`; this crate loads worlds, runs commands and prints results.

pub mod cli;
