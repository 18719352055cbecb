//! The pointer & region model: where a value lives in a [`MachineState`](crate::MachineState).
//!
//! A [`DataPointer`] is only meaningful relative to the snapshot it was built for. Storage
//! pointers carry a [`Slot`] path rather than a resolved address; the address is computed by
//! [`slot_address`](crate::storage::slot_address) when the value is read.

use std::{
    fmt::{self, Display},
    sync::Arc,
};

use alloy::primitives::{Address, Bytes, I256, U256};

use crate::{
    utils::hex::encode_hex,
    value::{ElementaryValue, StringValue},
};

/// A mapping key, tagged with its key type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MappingKey {
    /// Any unsigned integer key (also enums).
    Uint(U256),
    /// Any signed integer key.
    Int(I256),
    /// A boolean key.
    Bool(bool),
    /// An address key (also contracts).
    Address(Address),
    /// A `bytesN` key.
    FixedBytes(Bytes),
    /// A `bytes` key.
    Bytes(Bytes),
    /// A `string` key.
    String(String),
}

impl MappingKey {
    /// The Solidity name of the key type.
    pub fn key_type(&self) -> String {
        match self {
            MappingKey::Uint(_) => "uint256".to_string(),
            MappingKey::Int(_) => "int256".to_string(),
            MappingKey::Bool(_) => "bool".to_string(),
            MappingKey::Address(_) => "address".to_string(),
            MappingKey::FixedBytes(bytes) => format!("bytes{}", bytes.len()),
            MappingKey::Bytes(_) => "bytes".to_string(),
            MappingKey::String(_) => "string".to_string(),
        }
    }

    /// Encodes the key the way Solidity does before hashing it with the mapping's slot: value
    /// types as a padded 32-byte word, `bytes` and `string` keys as their raw contents.
    ///
    /// Booleans hash as the unsigned integers 0 and 1.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MappingKey::Uint(value) => value.to_be_bytes::<32>().to_vec(),
            MappingKey::Int(value) => value.into_raw().to_be_bytes::<32>().to_vec(),
            MappingKey::Bool(value) => U256::from(*value as u8).to_be_bytes::<32>().to_vec(),
            MappingKey::Address(address) => {
                let mut word = vec![0u8; 12];
                word.extend_from_slice(address.as_slice());
                word
            }
            MappingKey::FixedBytes(bytes) => {
                let mut word = bytes.to_vec();
                word.resize(32, 0);
                word
            }
            MappingKey::Bytes(bytes) => bytes.to_vec(),
            MappingKey::String(string) => string.as_bytes().to_vec(),
        }
    }

    /// Builds a key from a decoded elementary value, if that value can key a mapping.
    pub fn from_value(value: &ElementaryValue) -> Option<Self> {
        match value {
            ElementaryValue::Bool(value) => Some(MappingKey::Bool(*value)),
            ElementaryValue::Uint(value) => Some(MappingKey::Uint(*value)),
            ElementaryValue::Int(value) => Some(MappingKey::Int(*value)),
            ElementaryValue::Address(address) | ElementaryValue::Contract(address) => {
                Some(MappingKey::Address(*address))
            }
            ElementaryValue::FixedBytes(bytes) => Some(MappingKey::FixedBytes(bytes.clone())),
            ElementaryValue::Bytes(bytes) => Some(MappingKey::Bytes(bytes.clone())),
            ElementaryValue::String(string) => match string {
                StringValue::Valid(string) => Some(MappingKey::String(string.clone())),
                StringValue::Malformed(bytes) => Some(MappingKey::Bytes(bytes.clone())),
            },
            ElementaryValue::Enum { index, .. } => Some(MappingKey::Uint(U256::from(*index))),
            _ => None,
        }
    }
}

impl Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKey::Uint(value) => write!(f, "uint256({value})"),
            MappingKey::Int(value) => write!(f, "int256({value})"),
            MappingKey::Bool(value) => write!(f, "bool({value})"),
            MappingKey::Address(address) => write!(f, "address({address})"),
            MappingKey::FixedBytes(bytes) => {
                write!(f, "bytes{}(0x{})", bytes.len(), encode_hex(bytes))
            }
            MappingKey::Bytes(bytes) => write!(f, "bytes(0x{})", encode_hex(bytes)),
            MappingKey::String(string) => write!(f, "string({string:?})"),
        }
    }
}

/// A node in a storage slot path. Paths are built from a base slot by mapping lookups and
/// hash-and-offset steps, and resolve to an address through
/// [`slot_address`](crate::storage::slot_address).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// An explicit slot address.
    Base {
        /// The slot address
        offset: U256,
    },
    /// `keccak256(encode(key) ++ address(parent)) + offset`
    Mapping {
        /// The mapping's own slot
        parent: Arc<Slot>,
        /// The key being looked up
        key: MappingKey,
        /// Slots to add after hashing
        offset: U256,
    },
    /// `(hashed ? keccak256(address(parent)) : address(parent)) + offset`
    Derived {
        /// The slot this one is derived from
        parent: Arc<Slot>,
        /// Whether the parent address is hashed first, as for dynamic array contents
        hashed: bool,
        /// Slots to add
        offset: U256,
    },
}

impl Slot {
    /// A slot at an explicit address.
    pub fn base(offset: U256) -> Self {
        Slot::Base { offset }
    }

    /// The slot holding the entry for `key` in the mapping located at this slot.
    pub fn mapping_entry(&self, key: MappingKey) -> Self {
        Slot::Mapping { parent: Arc::new(self.clone()), key, offset: U256::ZERO }
    }

    /// The first slot of the contents of the dynamic array (or long byte string) at this slot.
    pub fn hashed(&self) -> Self {
        Slot::Derived { parent: Arc::new(self.clone()), hashed: true, offset: U256::ZERO }
    }

    /// This slot moved forward by `offset` slots, wrapping modulo 2^256.
    pub fn plus(&self, offset: U256) -> Self {
        let mut slot = self.clone();
        match &mut slot {
            Slot::Base { offset: current } |
            Slot::Mapping { offset: current, .. } |
            Slot::Derived { offset: current, .. } => *current = current.wrapping_add(offset),
        }
        slot
    }
}

/// A byte position inside a storage slot, counting from the most significant byte.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoragePosition {
    /// The slot
    pub slot: Slot,
    /// Byte index within the slot, 0 being the most significant byte
    pub index: usize,
}

/// A run of `length` storage bytes beginning at `from`, possibly spanning several slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageRange {
    /// The first byte
    pub from: StoragePosition,
    /// The number of bytes
    pub length: usize,
}

impl StorageRange {
    /// The whole word at `slot`.
    pub fn word(slot: Slot) -> Self {
        StorageRange { from: StoragePosition { slot, index: 0 }, length: 32 }
    }

    /// `length` bytes at the low-order end of `slot`, where Solidity places the first value
    /// packed into a slot.
    pub fn right_aligned(slot: Slot, length: usize) -> Self {
        let length = length.min(32);
        StorageRange { from: StoragePosition { slot, index: 32 - length }, length }
    }
}

/// An object whose address has already been resolved: the pointer designates where the object
/// itself begins rather than a word containing its address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectPointer {
    /// An object at a memory address
    Memory {
        /// Byte address in memory
        address: usize,
    },
    /// An object in storage, starting at a slot
    Storage {
        /// The object's first slot
        slot: Slot,
    },
    /// An ABI-encoded object in calldata
    Calldata {
        /// Byte address in calldata
        address: usize,
    },
    /// An ABI-encoded object in returndata
    Returndata {
        /// Byte address in returndata
        address: usize,
    },
}

/// Where to read a value from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataPointer {
    /// A stack word, counted from the bottom of the stack. Values occupying two stack words
    /// (calldata byte strings and arrays, external function pointers) continue at `index + 1`.
    Stack {
        /// Stack index
        index: usize,
    },
    /// Bytes that are already known; treated like stack words.
    Literal {
        /// The bytes
        bytes: Bytes,
    },
    /// A memory range
    Memory {
        /// First byte
        start: usize,
        /// Number of bytes
        length: usize,
    },
    /// A storage range
    Storage {
        /// The range
        range: StorageRange,
    },
    /// A calldata range
    Calldata {
        /// First byte
        start: usize,
        /// Number of bytes
        length: usize,
    },
    /// A returndata range
    Returndata {
        /// First byte
        start: usize,
        /// Number of bytes
        length: usize,
    },
    /// A resolved object address
    Object(ObjectPointer),
}

impl DataPointer {
    /// The 32-byte memory word at `start`.
    pub fn memory_word(start: usize) -> Self {
        DataPointer::Memory { start, length: 32 }
    }

    /// The whole storage word at `slot`.
    pub fn storage_word(slot: Slot) -> Self {
        DataPointer::Storage { range: StorageRange::word(slot) }
    }

    /// A 32-byte literal word.
    pub fn literal(value: U256) -> Self {
        DataPointer::Literal { bytes: Bytes::from(value.to_be_bytes::<32>().to_vec()) }
    }
}
