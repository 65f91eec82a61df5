//! Artifact generator for the encrypted string table
//!
//! Emits the run-time side of the system as Rust source text: one holder
//! module per key fragment, each publishing nothing but its own slice of key
//! material, and one primary module exposing the chunked ciphertext table,
//! the write-once fragment assembly, and the lookup entry point.
//!
//! The emitted primary module carries its own copy of the decryption logic,
//! because generated code cannot link back into the build tool. That copy
//! MUST be kept in sync with [`crate::runtime`]; any divergence corrupts
//! every string. Consumers compile the emitted files with the `aes` and
//! `ctr` crates available.
//!
//! Scattering the key across separately-emitted modules raises the cost of
//! extracting it from the final binary; it does not cryptographically
//! prevent extraction.

use crate::key::split_key;
use crate::table::StringTable;
use crate::{VeilConfig, VeilResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed base name of the primary artifact module
///
/// The sanitized build identity is appended to this so multiple build units
/// sharing one output directory cannot collide.
pub const BASE_MODULE_NAME: &str = "veil_data";

/// One generated source file
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    /// Rust module name (also the file stem)
    pub module_name: String,
    /// Complete source text
    pub source: String,
}

impl GeneratedArtifact {
    /// File name this artifact is written as
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.module_name)
    }
}

/// The complete generated artifact set for one build
#[derive(Debug)]
pub struct GeneratedArtifacts {
    /// Primary module: ciphertext table, fragment assembly, lookup entry
    pub primary: GeneratedArtifact,
    /// Fragment holder modules, in fragment order
    pub holders: Vec<GeneratedArtifact>,
}

impl GeneratedArtifacts {
    /// Write all artifacts into `dir`, creating it if needed
    ///
    /// The primary module declares the holders as `mod` children, so they
    /// are written into a `<primary>/` subdirectory where Rust module
    /// resolution expects them. The emitted set forms a self-contained
    /// module tree: the consumer declares the primary file as a module and
    /// everything else resolves from there.
    pub fn write_to(&self, dir: &Path) -> VeilResult<Vec<PathBuf>> {
        let holder_dir = dir.join(&self.primary.module_name);
        fs::create_dir_all(&holder_dir)?;

        let mut paths = Vec::with_capacity(1 + self.holders.len());
        let primary_path = dir.join(self.primary.file_name());
        fs::write(&primary_path, &self.primary.source)?;
        tracing::info!(
            "Emitted {} ({} bytes)",
            primary_path.display(),
            self.primary.source.len()
        );
        paths.push(primary_path);

        for holder in &self.holders {
            let path = holder_dir.join(holder.file_name());
            fs::write(&path, &holder.source)?;
            tracing::info!("Emitted {} ({} bytes)", path.display(), holder.source.len());
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Generator for the holder and primary artifacts
pub struct ArtifactGenerator {
    config: VeilConfig,
}

impl ArtifactGenerator {
    /// Create a new generator
    pub fn new(config: VeilConfig) -> Self {
        Self { config }
    }

    /// Emit the artifact set for a completed table
    ///
    /// The table must be fully populated: tokens handed out before this call
    /// stay valid, strings registered after it are not part of the output.
    pub fn generate(
        &self,
        key: &[u8],
        table: &StringTable,
    ) -> VeilResult<GeneratedArtifacts> {
        let fragments = split_key(key, self.config.fragment_count)?;
        let primary_name = self.primary_module_name();

        let holders: Vec<GeneratedArtifact> = fragments
            .iter()
            .enumerate()
            .map(|(i, words)| GeneratedArtifact {
                module_name: format!("{}_part_{}", primary_name, i),
                source: emit_holder(i, fragments.len(), words),
            })
            .collect();

        let primary = GeneratedArtifact {
            module_name: primary_name.clone(),
            source: emit_primary(&primary_name, table, &holders),
        };

        tracing::info!(
            "Generated {} with {} chunk(s), {} byte(s), {} fragment holder(s)",
            primary_name,
            table.chunk_count(),
            table.len(),
            holders.len()
        );

        Ok(GeneratedArtifacts { primary, holders })
    }

    /// Resolve the primary module name from the configured identity
    fn primary_module_name(&self) -> String {
        match self.config.artifact_name.as_deref().map(sanitize_identity) {
            Some(id) if !id.is_empty() => format!("{}_{}", BASE_MODULE_NAME, id),
            _ => BASE_MODULE_NAME.to_string(),
        }
    }
}

/// Strip a caller-supplied identity down to letters, digits, and underscores
///
/// Everything else is dropped. Uppercase folds to lowercase so the result
/// reads as a Rust module name.
fn sanitize_identity(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Emit one fragment holder module
///
/// A holder publishes exactly one fragment and references nothing else.
fn emit_holder(index: usize, total: usize, words: &[u32]) -> String {
    let mut code = String::new();
    code.push_str("// Generated by stringveil. Do not edit.\n\n");
    code.push_str(&format!("/// Key fragment {} of {}\n", index, total));
    code.push_str(&format!(
        "pub(crate) static WORDS: [u32; {}] = [",
        words.len()
    ));
    let rendered: Vec<String> = words.iter().map(|w| format!("{:#010x}", w)).collect();
    code.push_str(&rendered.join(", "));
    code.push_str("];\n");
    code
}

/// Emit the primary module
fn emit_primary(primary_name: &str, table: &StringTable, holders: &[GeneratedArtifact]) -> String {
    let mut code = String::new();

    code.push_str(&format!(
        "//! Encrypted string table for `{}`.\n//!\n\
         //! Generated by stringveil {}. Do not edit.\n\
         //! Requires the `aes` and `ctr` crates in the consuming build.\n\
         //! The fragment holder modules live in the `{}/` subdirectory.\n\n",
        primary_name,
        crate::VERSION,
        primary_name
    ));

    // Holder child modules, declared in fragment order
    for holder in holders {
        code.push_str(&format!("mod {};\n", holder.module_name));
    }
    code.push_str("\nuse std::sync::OnceLock;\n\n");

    // The ciphertext table comes first; it is plain data, ready at load.
    code.push_str("/// Ciphertext table, one entry per chunk\n");
    code.push_str(&format!(
        "static CHUNKS: [&[u8]; {}] = [\n",
        table.chunk_count()
    ));
    for i in 0..table.chunk_count() {
        push_byte_array(&mut code, table.chunk_bytes(i));
    }
    code.push_str("];\n\n");

    // The fragment table is assembled second, exactly once, in fragment
    // order, by reading each holder's published words.
    code.push_str("/// Key fragment table, assembled write-once on first use\n");
    code.push_str(&format!(
        "static FRAGMENTS: OnceLock<[&'static [u32]; {}]> = OnceLock::new();\n\n",
        holders.len()
    ));
    code.push_str(&format!(
        "fn fragments() -> &'static [&'static [u32]; {}] {{\n    FRAGMENTS.get_or_init(|| {{\n        [\n",
        holders.len()
    ));
    for holder in holders {
        code.push_str(&format!("            &{}::WORDS,\n", holder.module_name));
    }
    code.push_str("        ]\n    })\n}\n\n");

    // Entry point: forwards straight into the embedded lookup.
    code.push_str(
        "/// Decrypt the string identified by `token`\n\
         ///\n\
         /// Returns an empty string on any failure.\n\
         pub fn lookup_str(token: u64) -> String {\n    lookup(token, &CHUNKS, fragments())\n}\n",
    );

    code.push_str(EMBEDDED_RUNTIME);
    code
}

/// Append one chunk as an indented byte-array literal, 16 bytes per line
fn push_byte_array(code: &mut String, bytes: &[u8]) {
    if bytes.is_empty() {
        code.push_str("    &[],\n");
        return;
    }
    code.push_str("    &[\n");
    for line in bytes.chunks(16) {
        code.push_str("        ");
        for b in line {
            code.push_str(&format!("{:#04x}, ", b));
        }
        code.push('\n');
    }
    code.push_str("    ],\n");
}

/// Decryption logic embedded into every primary artifact
///
/// Duplicated from [`crate::runtime`] by necessity; MUST be kept in sync
/// with it. The embedded copy swallows failures into `None` so the entry
/// point degrades to an empty string, never a panic.
const EMBEDDED_RUNTIME: &str = r#"
// ---------------------------------------------------------------------------
// Embedded runtime lookup. Must stay in sync with stringveil::runtime.
// ---------------------------------------------------------------------------

const MAX_CHUNK_LEN: usize = 0x1fff;
const KEY_SIZE: usize = 32;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

fn reassemble_key(fragments: &[&[u32]]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    let mut pos = 0;
    'outer: for fragment in fragments {
        for word in *fragment {
            if pos >= KEY_SIZE {
                break 'outer;
            }
            key[pos..pos + 4].copy_from_slice(&word.to_be_bytes());
            pos += 4;
        }
    }
    key
}

fn derive_nonce(offset: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&offset.to_be_bytes());
    iv
}

fn extract_bytes(chunks: &[&[u8]], offset: usize, length: usize) -> Option<Vec<u8>> {
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let end = offset.checked_add(length)?;
    if end > total {
        return None;
    }
    let mut out = Vec::with_capacity(length);
    let mut pos = offset;
    let mut remaining = length;
    while remaining > 0 {
        let chunk = chunks.get(pos / MAX_CHUNK_LEN)?;
        let chunk_offset = pos % MAX_CHUNK_LEN;
        if chunk_offset >= chunk.len() {
            return None;
        }
        let available = (chunk.len() - chunk_offset).min(remaining);
        out.extend_from_slice(&chunk[chunk_offset..chunk_offset + available]);
        pos += available;
        remaining -= available;
    }
    Some(out)
}

fn lookup(token: u64, table: &[&[u8]], fragments: &[&[u32]]) -> String {
    use ctr::cipher::{KeyIvInit, StreamCipher};

    let decrypt = || -> Option<String> {
        let key = reassemble_key(fragments);
        let offset = (token >> 32) as u32;
        let length = (token & 0xFFFF_FFFF) as usize;
        let mut buf = extract_bytes(table, offset as usize, length)?;
        let nonce = derive_nonce(offset);
        let mut cipher = Aes256Ctr::new_from_slices(&key, &nonce).ok()?;
        cipher.apply_keystream(&mut buf);
        String::from_utf8(buf).ok()
    };
    decrypt().unwrap_or_default()
}
"#;
