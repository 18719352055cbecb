//! Storage slot addressing.
//!
//! Slot paths resolve to 256-bit addresses using Solidity's storage layout rules. All
//! arithmetic wraps modulo 2^256, as EVM word arithmetic does.

use alloy::primitives::{keccak256, U256};
use tracing::trace;

use crate::pointer::Slot;

/// Resolves a slot path to its storage address.
///
/// ```
/// use alloy::primitives::U256;
/// use mimir_codec::{pointer::Slot, storage::slot_address};
///
/// let slot = Slot::base(U256::from(3)).plus(U256::from(2));
/// assert_eq!(slot_address(&slot), U256::from(5));
/// ```
pub fn slot_address(slot: &Slot) -> U256 {
    let address = match slot {
        Slot::Base { offset } => *offset,
        Slot::Mapping { parent, key, offset } => {
            let mut preimage = key.encode();
            preimage.extend_from_slice(&slot_address(parent).to_be_bytes::<32>());
            U256::from_be_bytes(keccak256(preimage).0).wrapping_add(*offset)
        }
        Slot::Derived { parent, hashed, offset } => {
            let parent = slot_address(parent);
            let base = if *hashed {
                U256::from_be_bytes(keccak256(parent.to_be_bytes::<32>()).0)
            } else {
                parent
            };
            base.wrapping_add(*offset)
        }
    };

    trace!("resolved slot {} to 0x{:064x}", slot_address_printable(slot), address);
    address
}

/// Renders a slot path as an expression showing how its address is derived, e.g.
/// `keccak256(address(0x..), 0x1) + 0x0`.
pub fn slot_address_printable(slot: &Slot) -> String {
    match slot {
        Slot::Base { offset } => format!("0x{offset:x}"),
        Slot::Mapping { parent, key, offset } => {
            format!("keccak256({key}, {}) + 0x{offset:x}", slot_address_printable(parent))
        }
        Slot::Derived { parent, hashed: true, offset } => {
            format!("keccak256({}) + 0x{offset:x}", slot_address_printable(parent))
        }
        Slot::Derived { parent, hashed: false, offset } => {
            format!("{} + 0x{offset:x}", slot_address_printable(parent))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Bytes, I256};

    use super::*;
    use crate::pointer::MappingKey;

    fn hash_words(words: &[U256]) -> U256 {
        let preimage: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes::<32>()).collect();
        U256::from_be_bytes(keccak256(preimage).0)
    }

    #[test]
    fn test_base_slot_is_its_offset() {
        assert_eq!(slot_address(&Slot::base(U256::from(7))), U256::from(7));
    }

    #[test]
    fn test_uint_mapping_entry() {
        let slot = Slot::base(U256::from(1)).mapping_entry(MappingKey::Uint(U256::from(5)));
        assert_eq!(slot_address(&slot), hash_words(&[U256::from(5), U256::from(1)]));
    }

    #[test]
    fn test_address_mapping_entry() {
        let owner = address!("00000000000000000000000000000000deadbeef");
        let slot = Slot::base(U256::ZERO).mapping_entry(MappingKey::Address(owner));
        assert_eq!(slot_address(&slot), hash_words(&[U256::from(0xdeadbeefu64), U256::ZERO]));
    }

    #[test]
    fn test_string_key_hashes_raw_bytes() {
        let slot = Slot::base(U256::from(2)).mapping_entry(MappingKey::String("ab".to_string()));

        let mut preimage = b"ab".to_vec();
        preimage.extend_from_slice(&U256::from(2).to_be_bytes::<32>());
        assert_eq!(slot_address(&slot), U256::from_be_bytes(keccak256(preimage).0));
    }

    #[test]
    fn test_bool_key_matches_uint_one() {
        let base = Slot::base(U256::from(4));
        assert_eq!(
            slot_address(&base.mapping_entry(MappingKey::Bool(true))),
            slot_address(&base.mapping_entry(MappingKey::Uint(U256::from(1))))
        );
    }

    #[test]
    fn test_addressing_is_deterministic_and_key_sensitive() {
        let base = Slot::base(U256::from(9));
        let first = base.mapping_entry(MappingKey::Uint(U256::from(1)));
        assert_eq!(slot_address(&first), slot_address(&first));

        let other_key = base.mapping_entry(MappingKey::Uint(U256::from(2)));
        assert_ne!(slot_address(&first), slot_address(&other_key));

        let other_type = base.mapping_entry(MappingKey::Bytes(Bytes::from(vec![1u8])));
        assert_ne!(slot_address(&first), slot_address(&other_type));

        let negative = base.mapping_entry(MappingKey::Int(I256::MINUS_ONE));
        assert_ne!(slot_address(&negative), slot_address(&first));
    }

    #[test]
    fn test_dynamic_array_contents() {
        let slot = Slot::base(U256::from(3)).hashed().plus(U256::from(2));
        assert_eq!(slot_address(&slot), hash_words(&[U256::from(3)]).wrapping_add(U256::from(2)));
    }

    #[test]
    fn test_nested_mapping() {
        let slot = Slot::base(U256::from(1))
            .mapping_entry(MappingKey::Uint(U256::from(2)))
            .mapping_entry(MappingKey::Uint(U256::from(3)));
        let inner = hash_words(&[U256::from(2), U256::from(1)]);
        assert_eq!(slot_address(&slot), hash_words(&[U256::from(3), inner]));
    }

    #[test]
    fn test_offset_wraps_around() {
        let slot = Slot::Derived {
            parent: std::sync::Arc::new(Slot::base(U256::MAX)),
            hashed: false,
            offset: U256::from(2),
        };
        assert_eq!(slot_address(&slot), U256::from(1));
    }

    #[test]
    fn test_printable_slot() {
        let slot = Slot::base(U256::from(1)).mapping_entry(MappingKey::Uint(U256::from(5)));
        assert_eq!(slot_address_printable(&slot), "keccak256(uint256(5), 0x1) + 0x0");
        assert_eq!(
            slot_address_printable(&Slot::base(U256::from(3)).hashed().plus(U256::from(1))),
            "keccak256(0x3) + 0x1"
        );
    }
}
