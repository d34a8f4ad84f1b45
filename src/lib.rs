//! Purpose: Library crate behind the `dpaste` CLI: post snippets to a pastebin and fetch them back.
//! Exports: `core` (expiration, reference normalization, HTML fragment extraction, errors)
//! and `api` (configuration, transports, and the paste client).
//! Role: Keeps the binary a thin shell over explicit, testable operations.
//! Invariants: No process-wide state; endpoints arrive through `api::ServiceConfig`.
//! Invariants: Network access only happens through the `api` transport traits.
pub mod api;
pub mod core;
