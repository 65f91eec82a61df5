//! Build orchestration
//!
//! Ties one build together: resolves the secret key from the config, feeds
//! registrations into the encrypted table, and hands the completed table to
//! the artifact generator. One builder per build unit; registrations are
//! serialized by `&mut self` (the literal rewriter makes a single pass over
//! all literals).

use crate::codegen::{ArtifactGenerator, GeneratedArtifacts};
use crate::key::KEY_SIZE;
use crate::table::{StringTable, Token};
use crate::{VeilConfig, VeilResult};

/// One obfuscation build: key, growing table, and artifact emission
pub struct VeilBuilder {
    config: VeilConfig,
    key: [u8; KEY_SIZE],
    table: StringTable,
}

impl VeilBuilder {
    /// Start a build, resolving the key from the config
    ///
    /// Unseeded configs get a fresh random key; the key lives only inside
    /// this builder and the artifacts it emits.
    pub fn new(config: VeilConfig) -> Self {
        let key = config.resolve_key();
        Self::with_key(config, key)
    }

    /// Start a build with a caller-supplied key
    ///
    /// Bypasses the config's key resolution; mainly for deterministic tests
    /// and callers that manage key material themselves.
    pub fn with_key(config: VeilConfig, key: [u8; KEY_SIZE]) -> Self {
        Self {
            config,
            key,
            table: StringTable::new(key),
        }
    }

    /// Register one string literal, returning its replacement token
    ///
    /// This is the interface the literal rewriter calls once per occurrence;
    /// the emitted compiled code passes the token to the generated lookup
    /// entry point.
    pub fn register(&mut self, plaintext: &str) -> VeilResult<Token> {
        self.table.register(plaintext)
    }

    /// The table built so far
    pub fn table(&self) -> &StringTable {
        &self.table
    }

    /// Seal the build and emit the holder and primary artifacts
    pub fn finish(self) -> VeilResult<GeneratedArtifacts> {
        tracing::debug!(
            strings = self.table.len(),
            chunks = self.table.chunk_count(),
            "sealing string table"
        );
        ArtifactGenerator::new(self.config).generate(&self.key, &self.table)
    }
}
