//! Append-only encrypted string table
//!
//! Build-time half of the system: every registered literal is encrypted with
//! AES-256-CTR and appended to one growing logical buffer, and the caller
//! gets back a compact [`Token`] naming the ciphertext span. The table is
//! single-threaded and stateful; it must be fully populated before the chunk
//! queries feed the artifact generator.

use crate::key::KEY_SIZE;
use crate::runtime::{self, Aes256Ctr, MAX_CHUNK_LEN};
use crate::{VeilError, VeilResult};
use ctr::cipher::{KeyIvInit, StreamCipher};

/// Handle replacing one string literal in compiled output
///
/// Packs `(byte_offset << 32) | cipher_length` into a single `u64`. The
/// offset is the logical buffer position at registration time, the length is
/// the ciphertext (= UTF-8 plaintext) byte length. Both fields are bounded
/// to 32 bits; the table enforces the bound at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    offset: u32,
    length: u32,
}

impl Token {
    /// Create a token from its two fields
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// Decode a token from its wire form
    pub fn from_raw(raw: u64) -> Self {
        Self {
            offset: (raw >> 32) as u32,
            length: (raw & 0xFFFF_FFFF) as u32,
        }
    }

    /// Encode the token into its wire form
    pub fn as_raw(&self) -> u64 {
        (u64::from(self.offset) << 32) | u64::from(self.length)
    }

    /// Byte offset into the logical ciphertext buffer
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Ciphertext length in bytes
    pub fn length(&self) -> u32 {
        self.length
    }
}

/// Append-only builder for the encrypted string table
pub struct StringTable {
    key: [u8; KEY_SIZE],
    buffer: Vec<u8>,
}

impl StringTable {
    /// Create an empty table encrypting under the given key
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key,
            buffer: Vec::new(),
        }
    }

    /// Encrypt and append one string, returning its token
    ///
    /// Identical strings are NOT deduplicated: every registration appends
    /// fresh ciphertext at a fresh offset, so duplicate literals never share
    /// ciphertext bytes. The offset doubles as the CTR nonce seed, and the
    /// buffer only grows, so nonces never repeat within a build.
    pub fn register(&mut self, plaintext: &str) -> VeilResult<Token> {
        let bytes = plaintext.as_bytes();
        let offset = self.buffer.len();
        ensure_addressable(offset, bytes.len())?;

        let nonce = runtime::derive_nonce(offset as u32);
        let mut cipher = Aes256Ctr::new_from_slices(&self.key, &nonce)
            .map_err(|e| VeilError::Encryption(e.to_string()))?;

        let mut ciphertext = bytes.to_vec();
        cipher.apply_keystream(&mut ciphertext);
        self.buffer.extend_from_slice(&ciphertext);

        tracing::trace!(offset, length = bytes.len(), "registered string");

        Ok(Token::new(offset as u32, bytes.len() as u32))
    }

    /// Total length of the logical ciphertext buffer in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no strings have been registered yet
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of fixed-size segments needed to store the buffer
    ///
    /// An empty buffer still reports 1 so the emitted storage field is never
    /// a zero-length array; the generated artifact keeps the same shape
    /// whether or not any strings were registered.
    pub fn chunk_count(&self) -> usize {
        if self.buffer.is_empty() {
            1
        } else {
            self.buffer.len().div_ceil(MAX_CHUNK_LEN)
        }
    }

    /// Raw bytes of the `i`-th segment, empty past the buffer's extent
    pub fn chunk_bytes(&self, i: usize) -> &[u8] {
        let start = i * MAX_CHUNK_LEN;
        if start >= self.buffer.len() {
            return &[];
        }
        let end = (start + MAX_CHUNK_LEN).min(self.buffer.len());
        &self.buffer[start..end]
    }

    /// Snapshot of all chunks, in order
    ///
    /// This is the `table` argument the runtime lookup expects.
    pub fn chunks(&self) -> Vec<&[u8]> {
        (0..self.chunk_count()).map(|i| self.chunk_bytes(i)).collect()
    }
}

/// Reject registrations that would push the logical buffer past its 32-bit
/// offset space
///
/// Tokens address the buffer with a 32-bit offset and length; a table larger
/// than that would silently desynchronize every later token, so it is a
/// fatal build error instead.
fn ensure_addressable(offset: usize, added: usize) -> VeilResult<()> {
    let end = offset
        .checked_add(added)
        .ok_or_else(|| VeilError::TableOverflow("buffer length overflows usize".to_string()))?;
    if end > u32::MAX as usize {
        return Err(VeilError::TableOverflow(format!(
            "table would grow to {} bytes, past the {} byte limit",
            end,
            u32::MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; KEY_SIZE] {
        [7u8; KEY_SIZE]
    }

    #[test]
    fn test_token_packing() {
        let token = Token::new(0xDEAD_BEEF, 0x1234_5678);
        assert_eq!(token.as_raw(), 0xDEAD_BEEF_1234_5678);
        assert_eq!(Token::from_raw(token.as_raw()), token);
    }

    #[test]
    fn test_offsets_are_adjacent() {
        let mut table = StringTable::new(test_key());
        let a = table.register("A").unwrap();
        let b = table.register("BB").unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(a.length(), 1);
        assert_eq!(b.offset(), a.offset() + a.length());
        assert_eq!(b.length(), 2);
    }

    #[test]
    fn test_length_is_utf8_bytes() {
        let mut table = StringTable::new(test_key());
        let token = table.register("héllo").unwrap();
        assert_eq!(token.length(), "héllo".len() as u32);
        assert_eq!(table.len(), "héllo".len());
    }

    #[test]
    fn test_duplicates_get_fresh_ciphertext() {
        let mut table = StringTable::new(test_key());
        let a = table.register("secret").unwrap();
        let b = table.register("secret").unwrap();
        assert_ne!(a, b);

        // Different offsets mean different keystreams, so the two
        // ciphertext spans must differ despite identical plaintext
        let buf_a = &table.buffer[a.offset() as usize..(a.offset() + a.length()) as usize];
        let buf_b = &table.buffer[b.offset() as usize..(b.offset() + b.length()) as usize];
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn test_ciphertext_differs_from_plaintext() {
        let mut table = StringTable::new(test_key());
        table.register("hello world").unwrap();
        assert_ne!(&table.buffer, b"hello world");
    }

    #[test]
    fn test_empty_table_chunk_shape() {
        let table = StringTable::new(test_key());
        assert_eq!(table.chunk_count(), 1);
        assert!(table.chunk_bytes(0).is_empty());
        assert!(table.chunk_bytes(5).is_empty());
    }

    #[test]
    fn test_chunk_concatenation_reproduces_buffer() {
        let mut table = StringTable::new(test_key());
        let long = "x".repeat(MAX_CHUNK_LEN + 1000);
        table.register(&long).unwrap();
        table.register("tail").unwrap();

        assert_eq!(table.chunk_count(), 2);
        let mut joined = Vec::new();
        for i in 0..table.chunk_count() {
            joined.extend_from_slice(table.chunk_bytes(i));
        }
        assert_eq!(joined, table.buffer);
        assert_eq!(table.chunk_bytes(0).len(), MAX_CHUNK_LEN);
    }

    #[test]
    fn test_overflow_is_fatal() {
        assert!(ensure_addressable(0, 100).is_ok());
        assert!(ensure_addressable(u32::MAX as usize - 10, 10).is_ok());
        assert!(ensure_addressable(u32::MAX as usize, 1).is_err());
        assert!(ensure_addressable(usize::MAX, 1).is_err());
    }
}
