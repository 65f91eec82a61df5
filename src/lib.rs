//! stringveil - Build-Time String Literal Protection
//!
//! Replaces literal strings in a compiled application with numeric tokens
//! and moves their content into an encrypted side-table, decrypted on demand
//! at run time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Build Time (one pass)                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  "literal" ──► register ──► AES-256-CTR ──► append to table    │
//! │                    │                                            │
//! │                    ▼                                            │
//! │       Token = (offset << 32) | len   (replaces the literal)    │
//! │                                                                 │
//! │  At the end: key ──► split into word fragments                  │
//! │              table + fragments ──► generated Rust artifacts     │
//! │              (N holder modules + 1 primary module)              │
//! └─────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Run Time                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  token ──► primary module ──► holders (key reassembly, once)   │
//! │                    │                                            │
//! │                    ▼                                            │
//! │       extract span ──► AES-256-CTR decrypt ──► plaintext       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The nonce for each string is derived from its table offset, which is
//! strictly increasing within a build, so the CTR keystream never repeats
//! under one key without any per-item nonce storage.
//!
//! The full 256-bit key never exists as a single readable constant in the
//! emitted artifacts: it is scattered across separately-emitted holder
//! modules and reassembled transiently at run time. This raises the cost of
//! key extraction; it does not cryptographically prevent it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stringveil::{VeilBuilder, VeilConfig};
//!
//! let mut builder = VeilBuilder::new(VeilConfig::new().artifact_name("my-app"));
//!
//! // The literal rewriter registers each string it lifts out
//! let token = builder.register("sk-live-abc123xyz")?;
//!
//! // Seal the build and write the generated modules
//! let artifacts = builder.finish()?;
//! artifacts.write_to(std::path::Path::new("target/generated"))?;
//! ```

mod builder;
pub mod codegen;
mod config;
mod error;
pub mod key;
pub mod runtime;
mod table;

pub use builder::VeilBuilder;
pub use codegen::{ArtifactGenerator, GeneratedArtifact, GeneratedArtifacts};
pub use config::VeilConfig;
pub use error::{VeilError, VeilResult};
pub use runtime::{lookup, try_lookup, MAX_CHUNK_LEN};
pub use table::{StringTable, Token};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
