use alloy::primitives::U256;
use tracing::trace;

use super::{
    as_offset, basic, check_circular, decode_value, empty_mapping, offset_add, DecoderContext,
};
use crate::{
    error::Error,
    interfaces::DecoderOptions,
    pointer::DataPointer,
    read::read_bytes,
    types::{Location, Type},
    value::{DecodedValue, NamedValue, Value},
};

/// Decodes a value held in a memory range: elementary values directly, reference values by
/// following the pointer word.
pub(crate) async fn decode_memory(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    pointer: &DataPointer,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    if matches!(ty, Type::Mapping(_)) {
        return Ok(empty_mapping(ty));
    }

    let bytes = ctx.read(pointer).await?;
    if !ty.is_reference() {
        let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
        return Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)));
    }

    let address = as_offset(U256::from_be_slice(&bytes))?;
    decode_memory_object(ctx, ty, address, options).await
}

/// Decodes the reference-typed object starting at memory `address`.
pub(crate) async fn decode_memory_object(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    address: usize,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    trace!("decoding {} at memory 0x{:x}", ty, address);

    match ty {
        Type::Bytes { .. } | Type::String { .. } => {
            let length = U256::from_be_slice(&read_bytes(&ctx.state.memory, address, 32));
            let data = offset_add(address, 32)?;
            let length = ctx.check_region_length(length, data, 1, &ctx.state.memory)?;
            let bytes = read_bytes(&ctx.state.memory, data, length);
            let value = basic::decode_byte_string(ty, bytes)?;
            Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
        }
        Type::Array(array) => {
            if let Some(circular) = check_circular(ty, address, options) {
                return Ok(circular);
            }

            let (length, start) = match array.length {
                Some(length) => (ctx.check_length(length)?, address),
                None => {
                    let length = U256::from_be_slice(&read_bytes(&ctx.state.memory, address, 32));
                    let start = offset_add(address, 32)?;
                    (ctx.check_region_length(length, start, 32, &ctx.state.memory)?, start)
                }
            };

            let child_options = options.visiting(address);
            let element_type = array.base.with_location(Location::Memory);
            let mut elements = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                let element = offset_add(start, index.saturating_mul(32))?;
                let pointer = DataPointer::memory_word(element);
                elements.push(decode_value(ctx, &element_type, &pointer, &child_options).await?);
            }

            Ok(DecodedValue::value(ty.clone(), Value::Array(elements)))
        }
        Type::Struct(structure) => {
            if let Some(circular) = check_circular(ty, address, options) {
                return Ok(circular);
            }

            let allocation = ctx.allocations.memory_struct(&structure.id)?;
            let child_options = options.visiting(address);

            let mut members = Vec::with_capacity(allocation.members.len());
            for member in &allocation.members {
                let member_type = member.ty.with_location(Location::Memory);
                let pointer = DataPointer::Memory {
                    start: offset_add(address, member.offset)?,
                    length: member.length,
                };
                let value = decode_value(ctx, &member_type, &pointer, &child_options).await?;
                members.push(NamedValue { name: member.name.clone(), value });
            }

            Ok(DecodedValue::value(ty.clone(), Value::Struct(members)))
        }
        Type::Mapping(_) => Ok(empty_mapping(ty)),
        _ => {
            let bytes = read_bytes(&ctx.state.memory, address, 32);
            let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
            Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
        }
    }
}
