use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use tracing::trace;

use super::{
    abi::{decode_abi_object, AbiRegion},
    as_offset, basic, empty_mapping,
    memory::decode_memory_object,
    storage::decode_storage_object,
    DecoderContext,
};
use crate::{
    error::{DecodingError, Error},
    interfaces::{DecoderOptions, DecoderSettings},
    pointer::Slot,
    read::read_stack,
    state::Word,
    types::{Location, Type, Visibility},
    utils::hex::encode_hex,
    value::{DecodedValue, ElementaryValue, Value},
};

/// Whether a value of this type occupies two stack words rather than one.
fn is_double_word(ty: &Type) -> bool {
    match ty {
        Type::Function(function) => function.visibility == Visibility::External,
        _ => ty.location() == Some(Location::Calldata) && ty.is_dynamically_sized(),
    }
}

/// Decodes the value held in the stack word at `index`, plus the word above it for values
/// occupying two words.
pub(crate) async fn decode_stack(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    index: usize,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    let first = read_stack(ctx.state, index)?;
    let second = || read_stack(ctx.state, index.saturating_add(1));
    decode_words(ctx, ty, first, second, options).await
}

/// Decodes a literal as if its bytes were on the stack. Literals shorter than a whole number of
/// words are left-padded with zeros.
pub(crate) async fn decode_literal(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    bytes: &Bytes,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error> {
    let padding = (32 - bytes.len() % 32) % 32;
    let mut padded = vec![0u8; padding];
    padded.extend_from_slice(bytes);

    let words: Vec<Word> = padded
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect();

    let word = |index: usize| {
        words.get(index).copied().ok_or(DecodingError::StackOutOfRange {
            index,
            depth: words.len(),
        })
    };
    decode_words(ctx, ty, word(0)?, || word(1), options).await
}

async fn decode_words<F>(
    ctx: &DecoderContext<'_>,
    ty: &Type,
    first: Word,
    second: F,
    options: &DecoderOptions,
) -> Result<DecodedValue, Error>
where
    F: FnOnce() -> Result<Word, DecodingError>,
{
    trace!("decoding {} from stack word 0x{}", ty, encode_hex(&first));
    let raw = U256::from_be_bytes(first);

    if is_double_word(ty) {
        let second = second()?;

        if let Type::Function(_) = ty {
            let value = ElementaryValue::ExternalFunction {
                address: Address::from_slice(&first[12..]),
                selector: FixedBytes::from_slice(&second[28..]),
            };
            return Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)));
        }

        let address = as_offset(raw)?;
        let length = ctx.check_length(U256::from_be_bytes(second))?;
        let options = DecoderOptions { length_override: Some(length), ..options.clone() };
        return decode_abi_object(ctx, ty, AbiRegion::Calldata, address, &options).await;
    }

    if matches!(ty, Type::Mapping(_)) {
        return Ok(empty_mapping(ty));
    }

    if !ty.is_reference() {
        // the compiler cleans sub-word values lazily, so stack words may carry dirty high bits
        let settings = DecoderSettings { permissive_padding: true, ..ctx.settings };
        let value = basic::decode_basic(ty, &first, &settings)?;
        return Ok(DecodedValue::value(ty.clone(), Value::Elementary(value)));
    }

    match ty.location() {
        Some(Location::Memory) => decode_memory_object(ctx, ty, as_offset(raw)?, options).await,
        Some(Location::Storage) => {
            decode_storage_object(ctx, ty, &Slot::base(raw), options).await
        }
        Some(Location::Calldata) => {
            let options = options.without_length();
            decode_abi_object(ctx, ty, AbiRegion::Calldata, as_offset(raw)?, &options).await
        }
        None => Err(DecodingError::UnsupportedType { name: ty.to_string() }.into()),
    }
}
