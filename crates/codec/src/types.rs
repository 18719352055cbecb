//! Type descriptors for the values the engine decodes.
//!
//! A [`Type`] is immutable and self-describing: together with the allocation tables and a
//! pointer it is everything the decoder needs to interpret raw bytes.

use std::fmt::{self, Display};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// The stable identifier of a user-defined type (struct, enum or contract), as assigned by the
/// compiler.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub String);

impl From<&str> for TypeId {
    fn from(id: &str) -> Self {
        TypeId(id.to_string())
    }
}

impl From<String> for TypeId {
    fn from(id: String) -> Self {
        TypeId(id)
    }
}

impl From<u64> for TypeId {
    fn from(id: u64) -> Self {
        TypeId(id.to_string())
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The data location of a reference type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Linear, byte-addressed memory
    Memory,
    /// Contract storage, addressed by 256-bit slots
    Storage,
    /// Call input data (ABI-encoded)
    Calldata,
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => write!(f, "memory"),
            Location::Storage => write!(f, "storage"),
            Location::Calldata => write!(f, "calldata"),
        }
    }
}

/// Whether a function type refers to an external (address + selector) or an internal
/// (program counter) function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// An external function reference
    External,
    /// An internal function reference
    Internal,
}

/// The declared state mutability of a function type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    /// `pure`
    Pure,
    /// `view`
    View,
    /// Neither `view` nor `payable`
    #[default]
    Nonpayable,
    /// `payable`
    Payable,
}

/// The flavour of a contract type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    /// `contract`
    #[default]
    Contract,
    /// `interface`
    Interface,
    /// `library`
    Library,
}

/// An enum type. The options list is the enum's declared members, in order; an empty list means
/// the definition is unavailable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    /// Identifier of the enum definition
    pub id: TypeId,
    /// Name of the enum
    pub name: String,
    /// Identifier of the contract (or file) defining the enum
    pub defining_scope: Option<TypeId>,
    /// The declared options
    pub options: Vec<String>,
}

/// A struct type. Member layout lives in the allocation tables, keyed by `id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    /// Identifier of the struct definition
    pub id: TypeId,
    /// Name of the struct
    pub name: String,
    /// Identifier of the contract (or file) defining the struct
    pub defining_scope: Option<TypeId>,
    /// Data location, if known
    pub location: Option<Location>,
}

/// A contract type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractType {
    /// Identifier of the contract definition
    pub id: TypeId,
    /// Name of the contract
    pub name: String,
    /// Identifier of the defining source unit
    pub defining_scope: Option<TypeId>,
    /// Whether the contract can receive ether
    pub payable: bool,
    /// Contract, interface or library
    pub kind: ContractKind,
}

/// A function type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    /// External or internal
    pub visibility: Visibility,
    /// Declared mutability
    pub mutability: Mutability,
}

/// A static (`length` set) or dynamic array type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    /// Element type
    pub base: Box<Type>,
    /// Declared length of a static array; `None` for dynamic arrays
    pub length: Option<U256>,
    /// Data location, if known
    pub location: Option<Location>,
}

/// A mapping type. Mappings only ever live in storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingType {
    /// Key type
    pub key: Box<Type>,
    /// Value type
    pub value: Box<Type>,
}

/// A Solidity type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// `bool`
    Bool,
    /// `uintN`
    Uint {
        /// bit width, a multiple of 8 up to 256
        bits: usize,
    },
    /// `intN`
    Int {
        /// bit width, a multiple of 8 up to 256
        bits: usize,
    },
    /// `fixedMxN`
    Fixed {
        /// bit width
        bits: usize,
        /// decimal places
        places: u32,
    },
    /// `ufixedMxN`
    Ufixed {
        /// bit width
        bits: usize,
        /// decimal places
        places: u32,
    },
    /// `address` or `address payable`
    Address {
        /// whether the address is payable
        payable: bool,
    },
    /// `bytesN`
    FixedBytes {
        /// byte length, 1 to 32
        length: usize,
    },
    /// `bytes`
    Bytes {
        /// data location, if known
        location: Option<Location>,
    },
    /// `string`
    String {
        /// data location, if known
        location: Option<Location>,
    },
    /// A user-defined enum
    Enum(EnumType),
    /// A contract, interface or library
    Contract(ContractType),
    /// A function reference
    Function(FunctionType),
    /// An array
    Array(ArrayType),
    /// A mapping
    Mapping(MappingType),
    /// A user-defined struct
    Struct(StructType),
}

impl Type {
    /// `uint256`
    pub fn uint256() -> Self {
        Type::Uint { bits: 256 }
    }

    /// A dynamic array of `base` in `location`.
    pub fn dynamic_array(base: Type, location: Location) -> Self {
        Type::Array(ArrayType { base: Box::new(base), length: None, location: Some(location) })
    }

    /// A static array of `length` elements of `base` in `location`.
    pub fn static_array(base: Type, length: usize, location: Location) -> Self {
        Type::Array(ArrayType {
            base: Box::new(base),
            length: Some(U256::from(length)),
            location: Some(location),
        })
    }

    /// A struct reference in `location`.
    pub fn structure(id: impl Into<TypeId>, name: &str, location: Location) -> Self {
        Type::Struct(StructType {
            id: id.into(),
            name: name.to_string(),
            defining_scope: None,
            location: Some(location),
        })
    }

    /// A mapping from `key` to `value`.
    pub fn mapping(key: Type, value: Type) -> Self {
        Type::Mapping(MappingType { key: Box::new(key), value: Box::new(value) })
    }

    /// Whether values of this type are reference types, i.e. their representation in a
    /// region may point elsewhere.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Bytes { .. } |
                Type::String { .. } |
                Type::Array(_) |
                Type::Mapping(_) |
                Type::Struct(_)
        )
    }

    /// The data location of a reference type, if it is known. Mappings are always in storage.
    pub fn location(&self) -> Option<Location> {
        match self {
            Type::Bytes { location } | Type::String { location } => *location,
            Type::Array(array) => array.location,
            Type::Struct(structure) => structure.location,
            Type::Mapping(_) => Some(Location::Storage),
            _ => None,
        }
    }

    /// Returns a copy of this type re-tagged with `location`. Elementary types and mappings are
    /// returned unchanged.
    pub fn with_location(&self, location: Location) -> Type {
        let mut ty = self.clone();
        match &mut ty {
            Type::Bytes { location: tagged } | Type::String { location: tagged } => {
                *tagged = Some(location)
            }
            Type::Array(array) => array.location = Some(location),
            Type::Struct(structure) => structure.location = Some(location),
            _ => {}
        }
        ty
    }

    /// Whether this is `bytes`, `string`, or an array without a declared length.
    pub fn is_dynamically_sized(&self) -> bool {
        match self {
            Type::Bytes { .. } | Type::String { .. } => true,
            Type::Array(array) => array.length.is_none(),
            _ => false,
        }
    }

    /// The number of bytes an elementary value occupies when packed (in storage). Returns `None`
    /// for reference types.
    pub fn elementary_size(&self) -> Option<usize> {
        match self {
            Type::Bool => Some(1),
            Type::Uint { bits } |
            Type::Int { bits } |
            Type::Fixed { bits, .. } |
            Type::Ufixed { bits, .. } => Some(bits / 8),
            Type::Address { .. } | Type::Contract(_) => Some(20),
            Type::FixedBytes { length } => Some(*length),
            Type::Enum(_) => Some(1),
            Type::Function(function) => match function.visibility {
                Visibility::External => Some(24),
                Visibility::Internal => Some(8),
            },
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Uint { bits } => write!(f, "uint{bits}"),
            Type::Int { bits } => write!(f, "int{bits}"),
            Type::Fixed { bits, places } => write!(f, "fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => write!(f, "ufixed{bits}x{places}"),
            Type::Address { payable: true } => write!(f, "address payable"),
            Type::Address { payable: false } => write!(f, "address"),
            Type::FixedBytes { length } => write!(f, "bytes{length}"),
            Type::Bytes { .. } => write!(f, "bytes"),
            Type::String { .. } => write!(f, "string"),
            Type::Enum(enumeration) => write!(f, "enum {}", enumeration.name),
            Type::Contract(contract) => write!(f, "contract {}", contract.name),
            Type::Function(function) => match function.visibility {
                Visibility::External => write!(f, "function external"),
                Visibility::Internal => write!(f, "function internal"),
            },
            Type::Array(array) => match array.length {
                Some(length) => write!(f, "{}[{length}]", array.base),
                None => write!(f, "{}[]", array.base),
            },
            Type::Mapping(mapping) => write!(f, "mapping({} => {})", mapping.key, mapping.value),
            Type::Struct(structure) => write!(f, "struct {}", structure.name),
        }
    }
}
