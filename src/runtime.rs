//! Runtime string lookup
//!
//! The decryption half of the system: given a token and references to the
//! generated artifact's chunked ciphertext table and key fragments, recover
//! the plaintext. This logic is also embedded verbatim into the primary
//! artifact emitted by [`crate::codegen`], because generated code cannot
//! link back into the build tool. The two copies MUST stay in sync; any
//! divergence corrupts every string.
//!
//! Lookup is reentrant and thread-safe: it reads immutable data, reassembles
//! the key fresh on every call, and performs no I/O.

use crate::key;
use crate::{VeilError, VeilResult};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};

/// AES-256 in CTR mode with a big-endian 128-bit counter
///
/// Length-preserving and padding-free, so ciphertext length always equals
/// the plaintext's UTF-8 byte length.
pub(crate) type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Maximum length in bytes of each ciphertext chunk
///
/// Chunking is purely an emission concern: single oversized arrays run into
/// per-item size limits in generated artifacts, so the logical buffer is cut
/// into segments of at most this many bytes. Byte `i` of the logical buffer
/// lives in chunk `i / MAX_CHUNK_LEN` at offset `i % MAX_CHUNK_LEN`.
pub const MAX_CHUNK_LEN: usize = 0x1fff;

/// Derive the 16-byte CTR IV for a string from its table offset
///
/// Bytes 0-3 hold the offset big-endian, bytes 4-15 stay zero. Offsets are
/// strictly increasing within one build (the table only grows), so no two
/// strings share an IV under the same key. Must be bit-identical on the
/// encrypting and decrypting sides.
pub fn derive_nonce(offset: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&offset.to_be_bytes());
    iv
}

/// Decrypt a single string from the chunked ciphertext table
///
/// # Arguments
/// * `token` - upper 32 bits = byte offset into the logical table,
///   lower 32 bits = ciphertext length in bytes
/// * `table` - the ciphertext chunks, concatenated logically
/// * `fragments` - the scattered key fragments that reassemble into the
///   32-byte table key
///
/// Fails silently: any error (corrupt table, out-of-range token, malformed
/// UTF-8) yields an empty string rather than propagating. Release builds
/// favor availability over surfacing corruption; use [`try_lookup`] when a
/// distinguishable error is needed.
pub fn lookup(token: u64, table: &[&[u8]], fragments: &[&[u32]]) -> String {
    try_lookup(token, table, fragments).unwrap_or_default()
}

/// Decrypt a single string, reporting failures
///
/// Same contract as [`lookup`] but surfaces the failure cause, for tests and
/// diagnostics. Production call sites go through [`lookup`].
pub fn try_lookup(token: u64, table: &[&[u8]], fragments: &[&[u32]]) -> VeilResult<String> {
    let key = key::reassemble_key(fragments);

    let offset = (token >> 32) as u32;
    let length = (token & 0xFFFF_FFFF) as usize;

    let mut buf = extract_bytes(table, offset as usize, length)?;

    let nonce = derive_nonce(offset);
    let mut cipher = Aes256Ctr::new_from_slices(&key, &nonce)
        .map_err(|e| VeilError::Decryption(e.to_string()))?;
    cipher.apply_keystream(&mut buf);

    String::from_utf8(buf).map_err(|e| VeilError::Decryption(format!("invalid UTF-8: {}", e)))
}

/// Extract `length` bytes starting at logical position `offset` from the
/// chunked table, crossing chunk boundaries transparently
fn extract_bytes(chunks: &[&[u8]], offset: usize, length: usize) -> VeilResult<Vec<u8>> {
    // Validate the span before allocating: a corrupt token must not drive a
    // multi-gigabyte allocation attempt.
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let end = offset
        .checked_add(length)
        .ok_or_else(|| VeilError::Decryption("token span overflows".to_string()))?;
    if end > total {
        return Err(VeilError::Decryption(format!(
            "token span {}..{} exceeds table extent {}",
            offset, end, total
        )));
    }

    let mut out = Vec::with_capacity(length);
    let mut pos = offset;
    let mut remaining = length;

    while remaining > 0 {
        let chunk_index = pos / MAX_CHUNK_LEN;
        let chunk_offset = pos % MAX_CHUNK_LEN;

        let chunk = chunks.get(chunk_index).ok_or_else(|| {
            VeilError::Decryption(format!("chunk index {} out of range", chunk_index))
        })?;
        if chunk_offset >= chunk.len() {
            return Err(VeilError::Decryption(format!(
                "offset {} beyond chunk {} extent",
                chunk_offset, chunk_index
            )));
        }

        let available = (chunk.len() - chunk_offset).min(remaining);
        out.extend_from_slice(&chunk[chunk_offset..chunk_offset + available]);
        pos += available;
        remaining -= available;
    }

    Ok(out)
}
