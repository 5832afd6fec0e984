//! Palaver is a line-oriented terminal chat client for a curated catalog of
//! hosted language models.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the model catalog, configuration, the completion provider,
//!   and the conversation session that ties them together.
//! - [`cli`] parses arguments and hosts the interactive picker and chat loop.
//! - [`auth`] stores and resolves the API key.
//! - [`api`] defines the chat completion payloads sent over the wire.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
