//! DNS wire-format names, label hashes and token ids
//!
//! A name is carried in its canonical DNS binary form:
//! ```text
//! [len:1][label bytes]...[len:1][label bytes][0x00]
//! ```
//! The zero-length terminator is the root label and is never user supplied.
//!
//! Labels are carried as `String`, so a label is 1 to 255 bytes of valid
//! UTF-8. Wire names whose label bytes are not UTF-8 decode to
//! `NameError::InvalidEncoding` at the offset of that label.
//!
//! ## Token ids
//!
//! ```text
//! canonical_id = keccak256(label) & !0xffffffff
//! token_id     = canonical_id | generation
//! ```
//! The low 32 bits of a token id carry the generation, bumped by the registry
//! every time a label is registered again after expiry or relinquishment.

use alloy_primitives::{B256, U256};
use tiny_keccak::{Hasher, Keccak};

use crate::error::NameError;

/// Maximum length of a single label in bytes
pub const MAX_LABEL_LENGTH: usize = 255;

/// Bits reserved for the generation counter at the bottom of a token id
pub const GENERATION_BITS: usize = 32;

/// Mask selecting the generation bits of a token id
pub const GENERATION_MASK: U256 = U256::from_limbs([0xffff_ffff, 0, 0, 0]);

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let mut hasher = Keccak::v256();
    hasher.update(data.as_ref());

    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    B256::from(hash)
}

/// Hash of a single label
pub fn label_hash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// Strip the generation bits from a token id (or label hash).
pub fn canonical_id(id: U256) -> U256 {
    id & !GENERATION_MASK
}

/// Generation encoded in the low bits of a token id
pub fn generation_of(token_id: U256) -> u32 {
    // masked to 32 bits, cannot truncate
    (token_id & GENERATION_MASK).as_limbs()[0] as u32
}

/// Derive the token id of `label` at the given generation.
pub fn label_to_token_id(label: &str, generation: u32) -> U256 {
    let hash = U256::from_be_bytes(label_hash(label).0);
    canonical_id(hash) | U256::from(generation)
}

/// Check that a label can appear in an encoded name.
pub fn validate_label(label: &str) -> Result<(), NameError> {
    if label.is_empty() {
        return Err(NameError::LabelEmpty);
    }
    if label.len() > MAX_LABEL_LENGTH {
        return Err(NameError::LabelTooLong { length: label.len() });
    }
    Ok(())
}

/// Encode labels (leftmost first) into DNS wire format.
pub fn encode<S: AsRef<str>>(labels: &[S]) -> Result<Vec<u8>, NameError> {
    let total: usize = labels.iter().map(|l| l.as_ref().len() + 1).sum();
    let mut out = Vec::with_capacity(total + 1);

    for label in labels {
        let label = label.as_ref();
        validate_label(label)?;
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);

    Ok(out)
}

/// Decode a DNS wire-format name into its labels.
///
/// The encoding must end exactly at the root terminator.
pub fn decode(bytes: &[u8]) -> Result<Vec<String>, NameError> {
    let mut labels = Vec::new();
    let mut offset = 0;

    loop {
        let (label, next) = read_label(bytes, offset)?;
        match label {
            Some(label) => {
                labels.push(label);
                offset = next;
            }
            None => {
                if next != bytes.len() {
                    return Err(NameError::InvalidEncoding { offset: next });
                }
                return Ok(labels);
            }
        }
    }
}

/// Extract the leftmost label without decoding the rest of the name.
///
/// Returns the label and the offset of the remainder (the parent name).
pub fn first_label(bytes: &[u8]) -> Result<(String, usize), NameError> {
    match read_label(bytes, 0)? {
        (Some(label), next) => Ok((label, next)),
        (None, _) => Err(NameError::InvalidEncoding { offset: 0 }),
    }
}

/// Read the label starting at `offset`.
///
/// Returns `None` for the root terminator together with the offset just past it.
pub fn read_label(bytes: &[u8], offset: usize) -> Result<(Option<String>, usize), NameError> {
    let len = *bytes
        .get(offset)
        .ok_or(NameError::InvalidEncoding { offset })? as usize;

    if len == 0 {
        return Ok((None, offset + 1));
    }

    let start = offset + 1;
    let end = start + len;
    let raw = bytes
        .get(start..end)
        .ok_or(NameError::InvalidEncoding { offset })?;
    let label = std::str::from_utf8(raw)
        .map_err(|_| NameError::InvalidEncoding { offset: start })?;

    Ok((Some(label.to_owned()), end))
}

/// Split a dotted name ("sub.test.eth") into labels.
///
/// The empty string is the root name. A single trailing dot is accepted.
pub fn parse_dotted(name: &str) -> Result<Vec<String>, NameError> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Ok(Vec::new());
    }

    name.split('.')
        .map(|label| validate_label(label).map(|_| label.to_owned()))
        .collect()
}

/// Join labels back into dotted form.
pub fn to_dotted<S: AsRef<str>>(labels: &[S]) -> String {
    labels
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// ENS namehash of a label sequence (leftmost first).
pub fn namehash<S: AsRef<str>>(labels: &[S]) -> B256 {
    let mut node = B256::ZERO;
    for label in labels.iter().rev() {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(node.as_slice());
        input[32..].copy_from_slice(label_hash(label.as_ref()).as_slice());
        node = keccak256(input);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let encoded = encode(&["test", "eth"]).unwrap();
        assert_eq!(encoded, b"\x04test\x03eth\x00".to_vec());
    }

    #[test]
    fn test_encode_root() {
        let labels: [&str; 0] = [];
        assert_eq!(encode(&labels).unwrap(), vec![0u8]);
        assert!(decode(&[0]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_rejects_empty_label() {
        assert_eq!(encode(&["test", ""]), Err(NameError::LabelEmpty));
    }

    #[test]
    fn test_encode_rejects_long_label() {
        let long = "a".repeat(256);
        assert_eq!(
            encode(&[long.as_str()]),
            Err(NameError::LabelTooLong { length: 256 })
        );

        let max = "a".repeat(255);
        let encoded = encode(&[max.as_str()]).unwrap();
        assert_eq!(encoded[0], 255);
        assert_eq!(decode(&encoded).unwrap(), vec![max]);
    }

    #[test]
    fn test_decode_truncated() {
        // claims 4 bytes, only 2 present
        let result = decode(b"\x04te");
        assert!(matches!(result, Err(NameError::InvalidEncoding { .. })));

        // missing terminator
        let result = decode(b"\x04test");
        assert!(matches!(result, Err(NameError::InvalidEncoding { offset: 5 })));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let result = decode(b"\x03eth\x00\x01");
        assert!(matches!(result, Err(NameError::InvalidEncoding { offset: 5 })));
    }

    #[test]
    fn test_decode_rejects_non_utf8_label() {
        let result = decode(b"\x03eth\x02\xff\xfe\x00");
        assert_eq!(result, Err(NameError::InvalidEncoding { offset: 5 }));
        assert_eq!(decode(b"\x04t\xc3\xa9t\x00").unwrap(), vec!["t\u{e9}t"]);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(matches!(decode(&[]), Err(NameError::InvalidEncoding { offset: 0 })));
    }

    #[test]
    fn test_first_label() {
        let encoded = encode(&["sub", "test", "eth"]).unwrap();
        let (label, rest) = first_label(&encoded).unwrap();
        assert_eq!(label, "sub");
        assert_eq!(rest, 4);
        assert_eq!(decode(&encoded[rest..]).unwrap(), vec!["test", "eth"]);

        assert!(first_label(&[0]).is_err());
    }

    #[test]
    fn test_dotted_roundtrip() {
        let labels = parse_dotted("sub.test.eth").unwrap();
        assert_eq!(labels, vec!["sub", "test", "eth"]);
        assert_eq!(to_dotted(&labels), "sub.test.eth");
        assert_eq!(parse_dotted("eth.").unwrap(), vec!["eth"]);
        assert!(parse_dotted("").unwrap().is_empty());
        assert_eq!(parse_dotted("a..eth"), Err(NameError::LabelEmpty));
    }

    #[test]
    fn test_namehash_known_vectors() {
        // EIP-137 reference values
        assert_eq!(namehash::<&str>(&[]), B256::ZERO);
        assert_eq!(
            hex::encode(namehash(&["eth"])),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash(&["foo", "eth"])),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_label_hash_known_vector() {
        assert_eq!(
            hex::encode(label_hash("eth")),
            "4f5b812789fc606be1b3b16908db13fc7a9adf7ca72641f84d75b47069d3d7f0"
        );
    }

    #[test]
    fn test_token_id_generation() {
        let t0 = label_to_token_id("test", 0);
        let t1 = label_to_token_id("test", 1);

        assert_ne!(t0, t1);
        assert_eq!(canonical_id(t0), canonical_id(t1));
        assert_eq!(generation_of(t0), 0);
        assert_eq!(generation_of(t1), 1);
        assert_eq!(generation_of(label_to_token_id("test", u32::MAX)), u32::MAX);
    }

    #[test]
    fn test_distinct_labels_distinct_ids() {
        assert_ne!(
            canonical_id(label_to_token_id("alice", 0)),
            canonical_id(label_to_token_id("bob", 0))
        );
    }
}
