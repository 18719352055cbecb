//! Decodes raw EVM machine state into typed Solidity values.
//!
//! This crate turns stack words, memory, storage and call/return data into a tree of
//! [`DecodedValue`]s according to a [`Type`] and the compiler's allocation tables. Storage words
//! the snapshot lacks are requested from the host through a resumable [`Decoding`], so the same
//! engine serves hosts that answer from memory and hosts that fetch from a node.

/// Error types for the decoder
pub mod error;

/// Precomputed struct and contract layouts
pub mod allocation;

/// The pointer and region model
pub mod pointer;

/// Machine-state snapshots
pub mod state;

/// Storage slot addressing
pub mod storage;

/// Solidity type descriptors
pub mod types;

/// Hex helpers
pub mod utils;

/// The decoded value tree
pub mod value;

mod decode;
mod interfaces;
mod read;
mod suspend;

// re-export the public interface
pub use allocation::{
    AbiMember, AbiSize, AbiStructAllocation, Allocations, ContractAllocation, MemoryMember,
    MemoryStructAllocation, StateVariable, StorageLength, StorageMember, StorageStructAllocation,
};
pub use decode::Decoder;
pub use error::{DecodingError, Error};
pub use interfaces::{DecoderOptions, DecoderOptionsBuilder, DecoderSettings, Visited};
pub use pointer::{DataPointer, MappingKey, ObjectPointer, Slot, StoragePosition, StorageRange};
pub use state::{MachineState, Word};
pub use storage::{slot_address, slot_address_printable};
pub use suspend::{Decoding, Request, Step, StorageHost};
pub use types::{
    ArrayType, ContractKind, ContractType, EnumType, FunctionType, Location, MappingType,
    Mutability, StructType, Type, TypeId, Visibility,
};
pub use value::{DecodedValue, ElementaryValue, NamedValue, StringValue, Value};
