//! Storage layer integration tests
//!
//! Exercises environments, writers, the dictionary and the sweep directly,
//! below the shape and store abstractions.

#[path = "../common/mod.rs"]
mod common;

mod codecs;
mod dictionary;
