use alloy::primitives::{Bytes, U256};
use serde::Serialize;

use crate::{suspend::Request, types::TypeId};

/// Recoverable decoding errors. These never abort a decode: they are embedded in the decoded
/// value tree as error nodes at the position of the value that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodingError {
    /// A pointer does not fit the addressable range of its region
    #[error("pointer 0x{raw:x} is too large to address")]
    OverlargePointer {
        /// The pointer as read
        raw: U256,
    },
    /// A string, byte string or array length is too large to materialize
    #[error("length {length} is too long to read")]
    OverlongArrayOrString {
        /// The length as read
        length: U256,
    },
    /// No allocation or definition exists for a user-defined type
    #[error("no allocation found for user-defined type {id}")]
    UserDefinedTypeNotFound {
        /// The type's identifier
        id: TypeId,
    },
    /// A stack pointer does not address a live stack word
    #[error("stack index {index} is out of range for a stack of depth {depth}")]
    StackOutOfRange {
        /// The requested index, from the bottom of the stack
        index: usize,
        /// The number of words on the stack
        depth: usize,
    },
    /// A boolean holds something other than 0 or 1
    #[error("boolean word 0x{raw:x} is neither 0 nor 1")]
    BoolOutOfRange {
        /// The value as read
        raw: U256,
    },
    /// An enum holds an index past its last option
    #[error("value {raw} is out of range for enum {id}")]
    EnumOutOfRange {
        /// The enum's identifier
        id: TypeId,
        /// The value as read
        raw: U256,
    },
    /// The bytes around an elementary value are not clean
    #[error("non-zero padding around value {raw}")]
    PaddingError {
        /// The whole padded value
        raw: Bytes,
    },
    /// The type cannot be decoded from the pointer's region
    #[error("type {name} cannot be decoded from this location")]
    UnsupportedType {
        /// The type's name
        name: String,
    },
}

/// Unrecoverable errors that abort the whole decode.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host answered a request with something other than one word
    #[error("malformed reply to {request}: expected 32 bytes, got {length}")]
    MalformedReply {
        /// The request being answered
        request: Request,
        /// The length of the reply
        length: usize,
    },
    /// A reply arrived while the decode was not waiting on one
    #[error("received a reply while no request was pending")]
    UnexpectedReply,
    /// The decode has already finished
    #[error("decoding has already completed")]
    Completed,
    /// The decode needed a storage word and no host was available to supply it
    #[error("no host available to serve {request}")]
    Unavailable {
        /// The request that could not be served
        request: Request,
    },
    /// A host or internal failure
    #[error("Internal error: {0}")]
    Eyre(#[from] eyre::Report),
    /// A recoverable error on its way to the nearest error node
    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),
}
