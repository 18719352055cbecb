use alloy::primitives::U256;
use tracing::trace;

use super::{as_offset, basic, decode_value, offset_add, DecoderContext};
use crate::{
    error::{DecodingError, Error},
    interfaces::DecoderOptions,
    pointer::DataPointer,
    read::read_bytes,
    types::{Location, Type},
    value::{DecodedValue, NamedValue, Value},
};

/// The ABI-encoded regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbiRegion {
    Calldata,
    Returndata,
}

impl AbiRegion {
    fn bytes<'a>(&self, ctx: &'a DecoderContext<'_>) -> &'a [u8] {
        match self {
            AbiRegion::Calldata => &ctx.state.calldata[..],
            AbiRegion::Returndata => &ctx.state.returndata[..],
        }
    }

    fn pointer(&self, start: usize, length: usize) -> DataPointer {
        match self {
            AbiRegion::Calldata => DataPointer::Calldata { start, length },
            AbiRegion::Returndata => DataPointer::Returndata { start, length },
        }
    }

    fn word(&self, ctx: &DecoderContext<'_>, start: usize) -> U256 {
        U256::from_be_slice(&read_bytes(self.bytes(ctx), start, 32))
    }
}

/// Decodes the value whose head is at `start`. Static values are encoded in place; dynamic
/// values have an offset in their head, relative to the enclosing tuple.
pub(crate) async fn decode_abi(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    pointer: &DataPointer,
    region: AbiRegion,
    start: usize,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    if matches!(ty, Type::Mapping(_)) {
        return Err(DecodingError::UnsupportedType { name: ty.to_string() }.into());
    }

    if !ty.is_reference() {
        let bytes = ctx.read(pointer).await?;
        let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
        return Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)));
    }

    let address = if ctx.allocations.abi_size(ty)?.dynamic {
        let offset = as_offset(region.word(ctx, start))?;
        offset_add(options.abi_pointer_base, offset)?
    } else {
        start
    };

    decode_abi_object(ctx, ty, region, address, &options.without_length()).await
}

/// Decodes the reference-typed object starting at `address`. With a length override, dynamic
/// values have no length word and `address` is where their data starts.
pub(crate) async fn decode_abi_object(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    region: AbiRegion,
    address: usize,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    trace!("decoding {} at {:?} 0x{:x}", ty, region, address);

    match ty {
        Type::Bytes { .. } | Type::String { .. } => {
            let (length, data) = match options.length_override {
                Some(length) => (U256::from(length), address),
                None => (region.word(ctx, address), offset_add(address, 32)?),
            };
            let length = ctx.check_region_length(length, data, 1, region.bytes(ctx))?;

            let bytes = read_bytes(region.bytes(ctx), data, length);
            let value = basic::decode_byte_string(ty, bytes)?;
            Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
        }
        Type::Array(array) => {
            let element_type = array.base.with_location(Location::Calldata);
            let head = ctx.allocations.abi_size(&element_type)?.length;

            let (length, data) = match (array.length, options.length_override) {
                (Some(length), _) => (ctx.check_length(length)?, address),
                (None, length_override) => {
                    let (length, data) = match length_override {
                        Some(length) => (U256::from(length), address),
                        None => (region.word(ctx, address), offset_add(address, 32)?),
                    };
                    (ctx.check_region_length(length, data, head, region.bytes(ctx))?, data)
                }
            };
            let child_options = options.within_tuple(data);

            let mut elements = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                let start = offset_add(data, index.saturating_mul(head))?;
                let pointer = region.pointer(start, head);
                elements.push(decode_value(ctx, &element_type, &pointer, &child_options).await?);
            }

            Ok(DecodedValue::value(ty.clone(), Value::Array(elements)))
        }
        Type::Struct(structure) => {
            let allocation = ctx.allocations.abi_struct(&structure.id)?;
            let child_options = options.within_tuple(address);

            let mut members = Vec::with_capacity(allocation.members.len());
            for member in &allocation.members {
                let member_type = member.ty.with_location(Location::Calldata);
                let pointer = region.pointer(offset_add(address, member.offset)?, member.length);
                let value = decode_value(ctx, &member_type, &pointer, &child_options).await?;
                members.push(NamedValue { name: member.name.clone(), value });
            }

            Ok(DecodedValue::value(ty.clone(), Value::Struct(members)))
        }
        Type::Mapping(_) => Err(DecodingError::UnsupportedType { name: ty.to_string() }.into()),
        _ => {
            let bytes = read_bytes(region.bytes(ctx), address, 32);
            let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
            Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
        }
    }
}
