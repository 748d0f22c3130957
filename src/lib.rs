//! Localer - GitHub-backed translation publishing tool
//!
//! Library crate behind the `localer-cli` binary. The publish pipeline
//! lives in [`engine::publish`]; the remote API surface in
//! [`engine::github`].

pub mod engine;
