use alloy::primitives::{hex, U256};

use crate::state::Word;

/// Encodes bytes as a lowercase hex string without a prefix.
///
/// ```
/// use mimir_codec::utils::hex::encode_hex;
///
/// assert_eq!(encode_hex(&[0xde, 0xad]), "dead");
/// ```
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Converts a word to its big-endian byte representation.
pub fn word(value: U256) -> Word {
    value.to_be_bytes::<32>()
}

/// Concatenates the big-endian encodings of `values`, producing a word-aligned memory or
/// calldata image.
///
/// ```
/// use alloy::primitives::U256;
/// use mimir_codec::utils::hex::pack_words;
///
/// let image = pack_words(&[U256::from(1), U256::from(2)]);
/// assert_eq!(image.len(), 64);
/// assert_eq!(image[31], 1);
/// assert_eq!(image[63], 2);
/// ```
pub fn pack_words(values: &[U256]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes::<32>()).collect()
}
