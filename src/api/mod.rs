//! Purpose: Public Rust API for posting and fetching pastes.
//! Exports: Configuration, transport seams, the paste client, notices, and core error types.
//! Role: The only surface the CLI uses; keeps endpoint and HTTP details out of `main`.
//! Invariants: Additive-only; core parsing modules stay reachable through `crate::core`.

mod client;
mod config;
pub mod notice;
mod transport;

pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::expires::Expiration;
pub use client::{BodyShape, PasteClient, PostOptions, PostedPaste, Snippet};
pub use config::{DEFAULT_BASE_URL, PasteFormat, ServiceConfig};
pub use notice::{Notice, notice_json};
pub use transport::{ContentSource, HttpResponse, HttpTransport, PasteSink};
