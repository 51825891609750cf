//! # MANA Application Library
//!
//! HTTP API, CLI and configuration around the `mana-core` engine. The
//! binary in `main.rs` is a thin shell over [`cli::execute`].

pub mod api;
pub mod cli;
pub mod config;
