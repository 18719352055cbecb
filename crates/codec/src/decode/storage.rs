use alloy::primitives::U256;
use tracing::trace;

use super::{basic, decode_value, empty_mapping, DecoderContext};
use crate::{
    allocation::StorageLength,
    error::{DecodingError, Error},
    interfaces::DecoderOptions,
    pointer::{DataPointer, Slot, StoragePosition, StorageRange},
    read::read_range,
    types::{Location, Type},
    value::{DecodedValue, NamedValue, Value},
};

/// Decodes a value held in a storage range. Reference values are stored in place, so the range
/// only contributes its starting slot.
pub(crate) async fn decode_storage(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    pointer: &DataPointer,
    range: &StorageRange,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    if ty.is_reference() {
        let slot = range.from.slot.plus(U256::from(range.from.index / 32));
        return decode_storage_object(ctx, ty, &slot, options).await;
    }

    let bytes = ctx.read(pointer).await?;
    let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
    Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
}

/// The storage range of element `index` of an array whose elements start at `start`.
fn element_range(start: &Slot, size: StorageLength, index: usize) -> StorageRange {
    match size {
        StorageLength::Bytes(size) => {
            let size = size.clamp(1, 32);
            let per_slot = 32 / size;
            let position = index % per_slot;
            StorageRange {
                from: StoragePosition {
                    slot: start.plus(U256::from(index / per_slot)),
                    index: 32 - (position + 1) * size,
                },
                length: size,
            }
        }
        StorageLength::Words(words) => {
            StorageRange::word(start.plus(words.wrapping_mul(U256::from(index))))
        }
    }
}

/// Decodes the contents of a `bytes` or `string` stored at `slot`. Short values (up to 31
/// bytes) share the slot with their length; long values are stored from `keccak256(slot)`.
async fn decode_byte_string(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    slot: &Slot,
) -> Result<DecodedValue, Error> {
    let word = ctx.read_slot(slot).await;
    let bytes = word.to_be_bytes::<32>();

    let contents = if bytes[31] & 1 == 0 {
        let length = (bytes[31] / 2) as usize;
        if length > 31 {
            let length = U256::from(length);
            return Err(DecodingError::OverlongArrayOrString { length }.into());
        }
        bytes[..length].to_vec()
    } else {
        let length = ctx.check_length(word >> 1usize)?;
        let range =
            StorageRange { from: StoragePosition { slot: slot.hashed(), index: 0 }, length };
        read_range(ctx.state, &ctx.mailbox, &ctx.settings, &range).await?
    };

    let value = basic::decode_byte_string(ty, contents)?;
    Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
}

/// Decodes the reference-typed object whose first slot is `slot`.
pub(crate) async fn decode_storage_object(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    slot: &Slot,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    trace!("decoding {} at storage {:?}", ty, slot);

    match ty {
        Type::Bytes { .. } | Type::String { .. } => decode_byte_string(ctx, ty, slot).await,
        Type::Array(array) => {
            let (length, start) = match array.length {
                Some(length) => (length, slot.clone()),
                None => (ctx.read_slot(slot).await, slot.hashed()),
            };
            let length = ctx.check_length(length)?;

            let element_type = array.base.with_location(Location::Storage);
            let size = ctx.allocations.storage_size(&element_type)?;
            let child_options = options.without_length();

            let mut elements = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                let pointer = DataPointer::Storage { range: element_range(&start, size, index) };
                elements.push(decode_value(ctx, &element_type, &pointer, &child_options).await?);
            }

            Ok(DecodedValue::value(ty.clone(), Value::Array(elements)))
        }
        Type::Struct(structure) => {
            let allocation = ctx.allocations.storage_struct(&structure.id)?;
            let child_options = options.without_length();

            let mut members = Vec::with_capacity(allocation.members.len());
            for member in &allocation.members {
                let member_type = member.ty.with_location(Location::Storage);
                let member_slot = slot.plus(member.slot);
                let range = if member.length >= 32 || member_type.is_reference() {
                    StorageRange::word(member_slot)
                } else {
                    StorageRange {
                        from: StoragePosition {
                            slot: member_slot,
                            index: 32usize.saturating_sub(member.offset + member.length),
                        },
                        length: member.length,
                    }
                };

                let pointer = DataPointer::Storage { range };
                let value = decode_value(ctx, &member_type, &pointer, &child_options).await?;
                members.push(NamedValue { name: member.name.clone(), value });
            }

            Ok(DecodedValue::value(ty.clone(), Value::Struct(members)))
        }
        Type::Mapping(_) => Ok(empty_mapping(ty)),
        _ => {
            let size = ty.elementary_size().unwrap_or(32);
            let pointer =
                DataPointer::Storage { range: StorageRange::right_aligned(slot.clone(), size) };
            let bytes = ctx.read(&pointer).await?;
            let value = basic::decode_basic(ty, &bytes, &ctx.settings)?;
            Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_element_ranges() {
        let start = Slot::base(U256::from(10));

        let first = element_range(&start, StorageLength::Bytes(8), 0);
        assert_eq!(first.from.slot, Slot::base(U256::from(10)));
        assert_eq!(first.from.index, 24);

        let fourth = element_range(&start, StorageLength::Bytes(8), 3);
        assert_eq!(fourth.from.index, 0);

        let fifth = element_range(&start, StorageLength::Bytes(8), 4);
        assert_eq!(fifth.from.slot, Slot::base(U256::from(11)));
        assert_eq!(fifth.from.index, 24);
    }

    #[test]
    fn test_unpackable_elements_take_whole_slots() {
        let start = Slot::base(U256::ZERO);
        let third = element_range(&start, StorageLength::Bytes(20), 2);
        assert_eq!(third.from.slot, Slot::base(U256::from(2)));
        assert_eq!(third.from.index, 12);

        let second = element_range(&start, StorageLength::Words(U256::from(3)), 1);
        assert_eq!(second, StorageRange::word(Slot::base(U256::from(3))));
    }
}
