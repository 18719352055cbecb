//! The decode engine.
//!
//! Decoding is type-directed and recursive. [`decode_value`] is the hub every nested value goes
//! through: it reads elementary values directly, follows reference values into their region's
//! object decoder, and turns any recoverable [`DecodingError`] into an error node so that one
//! unreadable value never discards its siblings.

mod abi;
mod basic;
mod memory;
mod stack;
mod storage;

use std::rc::Rc;

use alloy::primitives::U256;
use async_recursion::async_recursion;
use futures::FutureExt;
use tracing::{debug, trace};

use crate::{
    allocation::Allocations,
    error::{DecodingError, Error},
    interfaces::{DecoderOptions, DecoderSettings},
    pointer::{DataPointer, ObjectPointer, Slot},
    read,
    state::MachineState,
    suspend::{Decoding, Mailbox},
    types::{Type, TypeId},
    value::{DecodedValue, Value},
};

use self::abi::AbiRegion;

/// Everything shared by the decodes of one session.
pub(crate) struct DecoderContext<'a> {
    pub(crate) state: &'a MachineState,
    pub(crate) allocations: &'a Allocations,
    pub(crate) settings: DecoderSettings,
    pub(crate) mailbox: Rc<Mailbox>,
}

impl DecoderContext<'_> {
    /// Reads the bytes `pointer` designates.
    pub(crate) async fn read(&self, pointer: &DataPointer) -> Result<Vec<u8>, Error> {
        read::read(self.state, &self.mailbox, &self.settings, pointer).await
    }

    /// Reads the whole storage word at `slot`.
    pub(crate) async fn read_slot(&self, slot: &Slot) -> U256 {
        U256::from_be_bytes(read::read_slot(self.state, &self.mailbox, slot).await)
    }

    /// Checks a length read from a region against the configured limit.
    pub(crate) fn check_length(&self, length: U256) -> Result<usize, DecodingError> {
        if length > U256::from(self.settings.max_dynamic_length) {
            debug!("length {} exceeds the configured maximum", length);
            return Err(DecodingError::OverlongArrayOrString { length });
        }
        usize::try_from(length).map_err(|_| DecodingError::OverlongArrayOrString { length })
    }

    /// Checks a length read from a linear region against the limit and against the region
    /// itself: `length` items of `stride` bytes starting at `data` must end within the last,
    /// possibly zero-filled, word of `region`. Empty values always pass.
    pub(crate) fn check_region_length(
        &self,
        length: U256,
        data: usize,
        stride: usize,
        region: &[u8],
    ) -> Result<usize, DecodingError> {
        let checked = self.check_length(length)?;
        if checked == 0 {
            return Ok(0);
        }

        let end = checked.checked_mul(stride).and_then(|size| size.checked_add(data));
        match end {
            Some(end) if end <= region.len().saturating_add(31) => Ok(checked),
            _ => {
                debug!("length {} at 0x{:x} runs past the end of its region", length, data);
                Err(DecodingError::OverlongArrayOrString { length })
            }
        }
    }
}

/// Interprets a word read from a region as a byte address in a linear region.
pub(crate) fn as_offset(raw: U256) -> Result<usize, DecodingError> {
    usize::try_from(raw).map_err(|_| DecodingError::OverlargePointer { raw })
}

/// Adds two addresses, reporting an overlarge pointer on overflow.
pub(crate) fn offset_add(base: usize, offset: usize) -> Result<usize, DecodingError> {
    base.checked_add(offset).ok_or_else(|| DecodingError::OverlargePointer {
        raw: U256::from(base).saturating_add(U256::from(offset)),
    })
}

/// Converts a recoverable error into an error node for `ty`; unrecoverable errors propagate.
pub(crate) fn recover(
    ty: &Type,
    result: Result<DecodedValue, Error>,
) -> Result<DecodedValue, Error> {
    match result {
        Err(Error::Decoding(error)) => {
            debug!("decoding {} failed: {}", ty, error);
            Ok(DecodedValue::error(ty.clone(), error))
        }
        result => result,
    }
}

/// Decodes a value of type `ty` from wherever `pointer` designates.
#[async_recursion(?Send)]
pub(crate) async fn decode_value<'a>(
    ctx: &'a DecoderContext<'a>,
    ty: &'a Type,
    pointer: &'a DataPointer,
    options: &'a DecoderOptions,
) -> Result<DecodedValue, Error> {
    trace!("decoding {} at {:?}", ty, pointer);

    let result = match pointer {
        DataPointer::Stack { index } => stack::decode_stack(ctx, ty, *index, options).await,
        DataPointer::Literal { bytes } => stack::decode_literal(ctx, ty, bytes, options).await,
        DataPointer::Object(object) => decode_object(ctx, ty, object, options).await,
        DataPointer::Memory { .. } => memory::decode_memory(ctx, ty, pointer, options).await,
        DataPointer::Storage { range } => {
            storage::decode_storage(ctx, ty, pointer, range, options).await
        }
        DataPointer::Calldata { start, .. } => {
            abi::decode_abi(ctx, ty, pointer, AbiRegion::Calldata, *start, options).await
        }
        DataPointer::Returndata { start, .. } => {
            abi::decode_abi(ctx, ty, pointer, AbiRegion::Returndata, *start, options).await
        }
    };

    recover(ty, result)
}

/// Decodes the object an [`ObjectPointer`] designates.
pub(crate) async fn decode_object(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    object: &ObjectPointer,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    match object {
        ObjectPointer::Memory { address } => {
            memory::decode_memory_object(ctx, ty, *address, options).await
        }
        ObjectPointer::Storage { slot } => {
            storage::decode_storage_object(ctx, ty, slot, options).await
        }
        ObjectPointer::Calldata { address } => {
            abi::decode_abi_object(ctx, ty, AbiRegion::Calldata, *address, options).await
        }
        ObjectPointer::Returndata { address } => {
            abi::decode_abi_object(ctx, ty, AbiRegion::Returndata, *address, options).await
        }
    }
}

/// The empty value a mapping decodes to whenever it is traversed rather than looked up.
pub(crate) fn empty_mapping(ty: &Type) -> DecodedValue {
    DecodedValue::value(ty.clone(), Value::Mapping)
}

/// Checks whether the object at `position` is already being decoded further up, returning a
/// back-reference node if so.
pub(crate) fn check_circular(
    ty: &Type,
    position: usize,
    options: &DecoderOptions,
) -> Option<DecodedValue> {
    let depth = options.visited.position(position)?;
    debug!("circular reference to {} at 0x{:x}, {} levels up", ty, position, depth + 1);
    Some(DecodedValue::value(ty.clone(), Value::Circular { reference: depth + 1 }))
}

/// The [`Decoder`] decodes typed values out of one machine-state snapshot.
///
/// Each call returns a [`Decoding`], a resumable computation that pauses whenever it needs a
/// storage word the snapshot does not contain.
///
/// ```
/// use alloy::primitives::U256;
/// use mimir_codec::{
///     utils::hex::pack_words, Allocations, DataPointer, Decoder, Location, MachineState, Type,
/// };
///
/// let memory = pack_words(&[U256::from(32), U256::from(1), U256::from(7)]);
/// let state = MachineState::new().with_memory(memory);
/// let allocations = Allocations::new();
/// let decoder = Decoder::new(&state, &allocations);
///
/// let ty = Type::dynamic_array(Type::uint256(), Location::Memory);
/// let value = decoder
///     .decode(ty, DataPointer::memory_word(0))
///     .run_to_completion()
///     .expect("failed to decode");
/// assert_eq!(value.to_string(), "[7]");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    state: &'a MachineState,
    allocations: &'a Allocations,
    settings: DecoderSettings,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder with the default settings.
    pub fn new(state: &'a MachineState, allocations: &'a Allocations) -> Self {
        Self::with_settings(state, allocations, DecoderSettings::default())
    }

    /// Creates a decoder with explicit settings.
    pub fn with_settings(
        state: &'a MachineState,
        allocations: &'a Allocations,
        settings: DecoderSettings,
    ) -> Self {
        Decoder { state, allocations, settings }
    }

    /// Decodes a value of type `ty` at `pointer`.
    pub fn decode(&self, ty: Type, pointer: DataPointer) -> Decoding<'a> {
        self.decode_with_options(ty, pointer, DecoderOptions::default())
    }

    /// Decodes a value of type `ty` at `pointer` with explicit options.
    pub fn decode_with_options(
        &self,
        ty: Type,
        pointer: DataPointer,
        options: DecoderOptions,
    ) -> Decoding<'a> {
        let mailbox = Rc::new(Mailbox::default());
        let ctx = DecoderContext {
            state: self.state,
            allocations: self.allocations,
            settings: self.settings,
            mailbox: mailbox.clone(),
        };

        let computation =
            async move { decode_value(&ctx, &ty, &pointer, &options).await }.boxed_local();
        Decoding::new(computation, mailbox)
    }

    /// Decodes state variable `name` of contract `contract`, if the contract has one.
    pub fn decode_variable(&self, contract: &TypeId, name: &str) -> Option<Decoding<'a>> {
        let (ty, pointer) = self.allocations.state_variable(contract, name)?;
        Some(self.decode(ty, pointer))
    }
}
