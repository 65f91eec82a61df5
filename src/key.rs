//! Secret key material and fragment scattering
//!
//! The 256-bit table key never appears as a single constant in the generated
//! output. It is split into word-granular fragments here at build time and
//! reassembled transiently at run time ([`reassemble_key`]). Splitting and
//! reassembly must agree exactly on the byte layout: fragments in index
//! order, words in order, big-endian bytes within each word.

use crate::{VeilError, VeilResult};
use rand::Rng;

/// AES key size in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Number of 32-bit words in the key
pub const KEY_WORDS: usize = KEY_SIZE / 4;

/// Default number of fragments the key is scattered across
pub const FRAGMENT_COUNT: usize = 8;

/// Context string for seed-derived keys
///
/// Versioned so a future layout change cannot silently decrypt old tables.
const SEED_CONTEXT: &str = "stringveil-table-key-v1";

/// Generate a fresh random 256-bit table key
pub fn random_key() -> [u8; KEY_SIZE] {
    rand::thread_rng().gen()
}

/// Derive a 256-bit table key from a caller-supplied seed
///
/// One-way expansion via BLAKE3 in derive-key mode. Deterministic: the same
/// seed always yields the same key, which is the point (reproducible builds)
/// and the cost (no per-build key uniqueness).
pub fn derive_key(seed: &str) -> [u8; KEY_SIZE] {
    blake3::derive_key(SEED_CONTEXT, seed.as_bytes())
}

/// Split a 32-byte key into `fragment_count` word slices
///
/// The key's 8 big-endian 4-byte words are distributed as evenly as
/// possible: `8 / fragment_count` words per fragment, with the first
/// `8 % fragment_count` fragments receiving one extra word. Fragments are
/// contiguous slices of the word sequence, consumed in order.
///
/// The reassembly routine emitted into the generated artifacts depends on
/// this exact ordering.
pub fn split_key(key: &[u8], fragment_count: usize) -> VeilResult<Vec<Vec<u32>>> {
    if key.len() != KEY_SIZE {
        return Err(VeilError::InvalidKey(format!(
            "key must be {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }
    if fragment_count == 0 || fragment_count > KEY_WORDS {
        return Err(VeilError::InvalidKey(format!(
            "fragment count must be 1..={}, got {}",
            KEY_WORDS, fragment_count
        )));
    }

    let words: Vec<u32> = key
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let base = KEY_WORDS / fragment_count;
    let extra = KEY_WORDS % fragment_count;

    let mut fragments = Vec::with_capacity(fragment_count);
    let mut pos = 0;
    for i in 0..fragment_count {
        let take = base + usize::from(i < extra);
        fragments.push(words[pos..pos + take].to_vec());
        pos += take;
    }

    Ok(fragments)
}

/// Reassemble the 32-byte key from scattered word fragments
///
/// Inverse of [`split_key`]: fragments in index order, words in order, each
/// word split into 4 big-endian bytes. Bounded at 32 bytes; excess words are
/// ignored rather than trusted.
pub fn reassemble_key(fragments: &[&[u32]]) -> [u8; KEY_SIZE] {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn as_refs(fragments: &[Vec<u32>]) -> Vec<&[u32]> {
        fragments.iter().map(|f| f.as_slice()).collect()
    }

    #[test]
    fn test_split_reassemble_roundtrip() {
        let key: [u8; KEY_SIZE] = rand::thread_rng().gen();
        for n in 1..=KEY_WORDS {
            let fragments = split_key(&key, n).unwrap();
            assert_eq!(fragments.len(), n);
            assert_eq!(reassemble_key(&as_refs(&fragments)), key);
        }
    }

    #[test]
    fn test_even_split_sizes() {
        let key = [0xABu8; KEY_SIZE];

        // 8 words over 8 fragments: one word each
        let fragments = split_key(&key, 8).unwrap();
        assert!(fragments.iter().all(|f| f.len() == 1));

        // 8 words over 3 fragments: 3, 3, 2
        let fragments = split_key(&key, 3).unwrap();
        let sizes: Vec<usize> = fragments.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2]);

        // 8 words over 5 fragments: 2, 2, 2, 1, 1
        let fragments = split_key(&key, 5).unwrap();
        let sizes: Vec<usize> = fragments.iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 1, 1]);
    }

    #[test]
    fn test_words_are_big_endian_and_ordered() {
        let key: Vec<u8> = (0u8..32).collect();
        let fragments = split_key(&key, 2).unwrap();
        assert_eq!(fragments[0][0], u32::from_be_bytes([0, 1, 2, 3]));
        assert_eq!(fragments[1][0], u32::from_be_bytes([16, 17, 18, 19]));
    }

    #[test]
    fn test_rejects_bad_key_length() {
        assert!(split_key(&[0u8; 16], 8).is_err());
        assert!(split_key(&[0u8; 33], 8).is_err());
    }

    #[test]
    fn test_rejects_bad_fragment_count() {
        let key = [0u8; KEY_SIZE];
        assert!(split_key(&key, 0).is_err());
        assert!(split_key(&key, 9).is_err());
    }

    #[test]
    fn test_reassemble_ignores_excess_words() {
        let key = [0x5Au8; KEY_SIZE];
        let mut fragments = split_key(&key, 8).unwrap();
        fragments.push(vec![0xDEADBEEF]);
        let refs: Vec<&[u32]> = fragments.iter().map(|f| f.as_slice()).collect();
        assert_eq!(reassemble_key(&refs), key);
    }

    #[test]
    fn test_derive_key_deterministic() {
        assert_eq!(derive_key("seed"), derive_key("seed"));
        assert_ne!(derive_key("seed"), derive_key("other"));
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(random_key(), random_key());
    }
}
