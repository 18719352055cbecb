//! Allocation tables: precomputed layouts of structs and contract state, keyed by type id.
//!
//! The tables are built once per compilation and shared read-only by every decode in a session.
//! The `*Allocation::pack` helpers lay members out the way the Solidity compiler does.

use alloy::primitives::U256;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::DecodingError,
    pointer::{DataPointer, Slot, StoragePosition, StorageRange},
    types::{Location, Type, TypeId},
};

/// A struct member laid out in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMember {
    /// Member name
    pub name: String,
    /// Member type, as declared
    #[serde(rename = "type")]
    pub ty: Type,
    /// Byte offset from the start of the struct
    pub offset: usize,
    /// Byte length of the member's word
    pub length: usize,
}

/// The memory layout of a struct.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStructAllocation {
    /// Members in declaration order
    pub members: Vec<MemoryMember>,
}

impl MemoryStructAllocation {
    /// Lays members out one word each. Mappings have no memory representation and are omitted.
    pub fn pack(members: Vec<(String, Type)>) -> Self {
        let members = members
            .into_iter()
            .filter(|(_, ty)| !matches!(ty, Type::Mapping(_)))
            .enumerate()
            .map(|(i, (name, ty))| MemoryMember { name, ty, offset: i * 32, length: 32 })
            .collect();
        MemoryStructAllocation { members }
    }
}

/// A struct member laid out in storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMember {
    /// Member name
    pub name: String,
    /// Member type, as declared
    #[serde(rename = "type")]
    pub ty: Type,
    /// Slot offset from the struct's first slot
    pub slot: U256,
    /// Byte offset within the slot, counted from the low-order end
    pub offset: usize,
    /// Byte length; 32 for members occupying whole slots
    pub length: usize,
}

/// The storage layout of a struct.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStructAllocation {
    /// Members in declaration order
    pub members: Vec<StorageMember>,
    /// Number of slots the struct occupies
    pub size: U256,
}

/// Packs `(name, type)` pairs into consecutive storage slots, starting a new slot whenever a
/// value does not fit in what remains of the current one. Types occupying whole slots always
/// start and end on a slot boundary.
fn pack_storage(
    members: Vec<(String, Type)>,
    allocations: &Allocations,
) -> Result<(Vec<StorageMember>, U256), DecodingError> {
    let mut slot = U256::ZERO;
    let mut used = 0usize;
    let mut packed = Vec::with_capacity(members.len());

    for (name, ty) in members {
        match allocations.storage_size(&ty)? {
            StorageLength::Bytes(length) => {
                if used + length > 32 {
                    slot += U256::from(1);
                    used = 0;
                }
                packed.push(StorageMember { name, ty, slot, offset: used, length });
                used += length;
            }
            StorageLength::Words(words) => {
                if used > 0 {
                    slot += U256::from(1);
                    used = 0;
                }
                packed.push(StorageMember { name, ty, slot, offset: 0, length: 32 });
                slot = slot.saturating_add(words);
            }
        }
    }

    if used > 0 {
        slot += U256::from(1);
    }
    Ok((packed, slot))
}

impl StorageStructAllocation {
    /// Lays members out as the compiler does for storage structs. Nested structs must already
    /// be present in `allocations`.
    pub fn pack(
        members: Vec<(String, Type)>,
        allocations: &Allocations,
    ) -> Result<Self, DecodingError> {
        let (members, size) = pack_storage(members, allocations)?;
        Ok(StorageStructAllocation { members, size: size.max(U256::from(1)) })
    }
}

/// A struct member in an ABI-encoded tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiMember {
    /// Member name
    pub name: String,
    /// Member type, as declared
    #[serde(rename = "type")]
    pub ty: Type,
    /// Byte offset of the member's head from the start of the tuple
    pub offset: usize,
    /// Byte length of the member's head
    pub length: usize,
}

/// The ABI layout of a struct.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiStructAllocation {
    /// Members in declaration order
    pub members: Vec<AbiMember>,
    /// Total length of the members' heads
    pub length: usize,
    /// Whether the struct contains a dynamically sized member
    pub dynamic: bool,
}

impl AbiStructAllocation {
    /// Lays out member heads consecutively. Nested structs must already be present in
    /// `allocations`.
    pub fn pack(
        members: Vec<(String, Type)>,
        allocations: &Allocations,
    ) -> Result<Self, DecodingError> {
        let mut offset = 0;
        let mut dynamic = false;
        let mut packed = Vec::with_capacity(members.len());

        for (name, ty) in members {
            let size = allocations.abi_size(&ty)?;
            dynamic |= size.dynamic;
            packed.push(AbiMember { name, ty, offset, length: size.length });
            offset += size.length;
        }

        Ok(AbiStructAllocation { members: packed, length: offset, dynamic })
    }
}

/// A contract state variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVariable {
    /// Variable name
    pub name: String,
    /// Variable type
    #[serde(rename = "type")]
    pub ty: Type,
    /// Slot the variable starts at
    pub slot: U256,
    /// Byte offset within the slot, counted from the low-order end
    pub offset: usize,
    /// Byte length; 32 for variables occupying whole slots
    pub length: usize,
}

/// The storage layout of a contract's state variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAllocation {
    /// Variables in declaration order, base contracts first
    pub variables: Vec<StateVariable>,
}

impl ContractAllocation {
    /// Lays state variables out from slot 0, packing like struct members.
    pub fn pack(
        variables: Vec<(String, Type)>,
        allocations: &Allocations,
    ) -> Result<Self, DecodingError> {
        let (members, _) = pack_storage(variables, allocations)?;
        Ok(ContractAllocation {
            variables: members
                .into_iter()
                .map(|member| StateVariable {
                    name: member.name,
                    ty: member.ty,
                    slot: member.slot,
                    offset: member.offset,
                    length: member.length,
                })
                .collect(),
        })
    }
}

/// How much storage a value occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageLength {
    /// A value packed within a single slot
    Bytes(usize),
    /// A value occupying whole slots
    Words(U256),
}

/// How much of an ABI-encoded tuple's head a value occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbiSize {
    /// Whether the value is dynamically encoded, with an offset in the head
    pub dynamic: bool,
    /// Length of the value's head, in bytes
    pub length: usize,
}

/// All allocation tables of a compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocations {
    /// Memory layouts of structs
    pub memory: HashMap<TypeId, MemoryStructAllocation>,
    /// Storage layouts of structs
    pub storage: HashMap<TypeId, StorageStructAllocation>,
    /// ABI layouts of structs
    pub abi: HashMap<TypeId, AbiStructAllocation>,
    /// State variable layouts of contracts
    pub state: HashMap<TypeId, ContractAllocation>,
}

fn not_found(id: &TypeId) -> DecodingError {
    debug!("no allocation found for type {}", id);
    DecodingError::UserDefinedTypeNotFound { id: id.clone() }
}

impl Allocations {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// The memory layout of struct `id`.
    pub fn memory_struct(&self, id: &TypeId) -> Result<&MemoryStructAllocation, DecodingError> {
        self.memory.get(id).ok_or_else(|| not_found(id))
    }

    /// The storage layout of struct `id`.
    pub fn storage_struct(&self, id: &TypeId) -> Result<&StorageStructAllocation, DecodingError> {
        self.storage.get(id).ok_or_else(|| not_found(id))
    }

    /// The ABI layout of struct `id`.
    pub fn abi_struct(&self, id: &TypeId) -> Result<&AbiStructAllocation, DecodingError> {
        self.abi.get(id).ok_or_else(|| not_found(id))
    }

    /// The state variable layout of contract `id`.
    pub fn contract(&self, id: &TypeId) -> Result<&ContractAllocation, DecodingError> {
        self.state.get(id).ok_or_else(|| not_found(id))
    }

    /// The type of state variable `name` of contract `contract`, with a storage pointer to it.
    pub fn state_variable(&self, contract: &TypeId, name: &str) -> Option<(Type, DataPointer)> {
        let variable =
            self.state.get(contract)?.variables.iter().find(|variable| variable.name == name)?;

        let length = variable.length.min(32);
        let index = 32usize.saturating_sub(variable.offset + length);
        let pointer = DataPointer::Storage {
            range: StorageRange {
                from: StoragePosition { slot: Slot::base(variable.slot), index },
                length,
            },
        };
        Some((variable.ty.with_location(Location::Storage), pointer))
    }

    /// The storage footprint of `ty`.
    pub fn storage_size(&self, ty: &Type) -> Result<StorageLength, DecodingError> {
        if let Some(length) = ty.elementary_size() {
            return Ok(StorageLength::Bytes(length));
        }

        match ty {
            Type::Array(array) => {
                let Some(length) = array.length else {
                    return Ok(StorageLength::Words(U256::from(1)));
                };

                match self.storage_size(&array.base)? {
                    StorageLength::Bytes(size) => {
                        let per_slot = U256::from(32 / size.clamp(1, 32));
                        Ok(StorageLength::Words(length.div_ceil(per_slot)))
                    }
                    StorageLength::Words(words) => {
                        Ok(StorageLength::Words(length.saturating_mul(words)))
                    }
                }
            }
            Type::Struct(structure) => {
                Ok(StorageLength::Words(self.storage_struct(&structure.id)?.size))
            }
            _ => Ok(StorageLength::Words(U256::from(1))),
        }
    }

    /// The ABI head footprint of `ty`.
    pub fn abi_size(&self, ty: &Type) -> Result<AbiSize, DecodingError> {
        match ty {
            Type::Bytes { .. } | Type::String { .. } => Ok(AbiSize { dynamic: true, length: 32 }),
            Type::Array(array) => {
                let Some(length) = array.length else {
                    return Ok(AbiSize { dynamic: true, length: 32 });
                };

                let base = self.abi_size(&array.base)?;
                if base.dynamic {
                    return Ok(AbiSize { dynamic: true, length: 32 });
                }

                let length = usize::try_from(length)
                    .ok()
                    .and_then(|length| length.checked_mul(base.length))
                    .ok_or(DecodingError::OverlongArrayOrString { length })?;
                Ok(AbiSize { dynamic: false, length })
            }
            Type::Struct(structure) => {
                let allocation = self.abi_struct(&structure.id)?;
                if allocation.dynamic {
                    Ok(AbiSize { dynamic: true, length: 32 })
                } else {
                    Ok(AbiSize { dynamic: false, length: allocation.length })
                }
            }
            Type::Mapping(_) => Err(DecodingError::UnsupportedType { name: ty.to_string() }),
            _ => Ok(AbiSize { dynamic: false, length: 32 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_packing() {
        let allocations = Allocations::new();
        let allocation = StorageStructAllocation::pack(
            vec![
                ("a".to_string(), Type::Uint { bits: 128 }),
                ("b".to_string(), Type::Address { payable: false }),
                ("c".to_string(), Type::Uint { bits: 96 }),
                ("d".to_string(), Type::uint256()),
                ("e".to_string(), Type::Bool),
            ],
            &allocations,
        )
        .expect("failed to pack");

        let placed: Vec<(U256, usize)> =
            allocation.members.iter().map(|m| (m.slot, m.offset)).collect();
        assert_eq!(
            placed,
            vec![
                (U256::ZERO, 0),
                (U256::from(1), 0),
                (U256::from(1), 20),
                (U256::from(2), 0),
                (U256::from(3), 0),
            ]
        );
        assert_eq!(allocation.size, U256::from(4));
    }

    #[test]
    fn test_storage_size_of_arrays() {
        let allocations = Allocations::new();
        let small = Type::static_array(Type::Uint { bits: 8 }, 33, Location::Storage);
        assert_eq!(allocations.storage_size(&small), Ok(StorageLength::Words(U256::from(2))));

        let wide = Type::static_array(Type::Uint { bits: 192 }, 3, Location::Storage);
        assert_eq!(allocations.storage_size(&wide), Ok(StorageLength::Words(U256::from(3))));

        let dynamic = Type::dynamic_array(Type::Bool, Location::Storage);
        assert_eq!(allocations.storage_size(&dynamic), Ok(StorageLength::Words(U256::from(1))));
    }

    #[test]
    fn test_missing_struct_is_not_found() {
        let allocations = Allocations::new();
        let ty = Type::structure("42", "Missing", Location::Storage);
        assert_eq!(
            allocations.storage_size(&ty),
            Err(DecodingError::UserDefinedTypeNotFound { id: TypeId::from("42") })
        );
    }

    #[test]
    fn test_abi_sizes() {
        let mut allocations = Allocations::new();
        let point = AbiStructAllocation::pack(
            vec![("x".to_string(), Type::uint256()), ("y".to_string(), Type::uint256())],
            &allocations,
        )
        .expect("failed to pack");
        assert_eq!(point.length, 64);
        assert!(!point.dynamic);
        allocations.abi.insert(TypeId::from("1"), point);

        let points = Type::static_array(
            Type::structure("1", "Point", Location::Calldata),
            3,
            Location::Calldata,
        );
        assert_eq!(allocations.abi_size(&points), Ok(AbiSize { dynamic: false, length: 192 }));

        let names = Type::static_array(
            Type::String { location: Some(Location::Calldata) },
            2,
            Location::Calldata,
        );
        assert_eq!(allocations.abi_size(&names), Ok(AbiSize { dynamic: true, length: 32 }));
    }

    #[test]
    fn test_state_variable_pointer() {
        let mut allocations = Allocations::new();
        let contract = ContractAllocation::pack(
            vec![
                ("owner".to_string(), Type::Address { payable: false }),
                ("paused".to_string(), Type::Bool),
                ("total".to_string(), Type::uint256()),
            ],
            &allocations,
        )
        .expect("failed to pack");
        allocations.state.insert(TypeId::from("Token"), contract);

        let (ty, pointer) =
            allocations.state_variable(&TypeId::from("Token"), "paused").expect("should exist");
        assert_eq!(ty, Type::Bool);
        assert_eq!(
            pointer,
            DataPointer::Storage {
                range: StorageRange {
                    from: StoragePosition { slot: Slot::base(U256::ZERO), index: 11 },
                    length: 1,
                }
            }
        );

        let (_, pointer) =
            allocations.state_variable(&TypeId::from("Token"), "total").expect("should exist");
        assert_eq!(pointer, DataPointer::storage_word(Slot::base(U256::from(1))));
        assert!(allocations.state_variable(&TypeId::from("Token"), "missing").is_none());
    }

    #[test]
    fn test_memory_pack_skips_mappings() {
        let allocation = MemoryStructAllocation::pack(vec![
            ("a".to_string(), Type::uint256()),
            ("m".to_string(), Type::mapping(Type::uint256(), Type::uint256())),
            ("b".to_string(), Type::Bool),
        ]);
        let names: Vec<&str> = allocation.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(allocation.members[1].offset, 32);
    }
}
