use alloy::primitives::{Address, Bytes, FixedBytes, I256, U256};
use tracing::trace;

use crate::{
    error::DecodingError,
    interfaces::DecoderSettings,
    types::{Type, Visibility},
    value::{ElementaryValue, StringValue},
};

/// Whether the value sits in the high-order bytes of its word rather than the low-order bytes.
fn is_left_aligned(ty: &Type) -> bool {
    match ty {
        Type::FixedBytes { .. } => true,
        Type::Function(function) => function.visibility == Visibility::External,
        _ => false,
    }
}

fn is_signed(ty: &Type) -> bool {
    matches!(ty, Type::Int { .. } | Type::Fixed { .. })
}

fn sign_extend(bytes: &[u8]) -> I256 {
    let fill = if bytes.first().is_some_and(|b| b & 0x80 != 0) { 0xff } else { 0x00 };
    let mut word = [fill; 32];
    word[32 - bytes.len()..].copy_from_slice(bytes);
    I256::from_raw(U256::from_be_bytes(word))
}

/// Decodes an elementary value from the bytes holding it: either exactly the value's own bytes,
/// as packed in storage, or a padded word.
pub(crate) fn decode_basic(
    ty: &Type,
    bytes: &[u8],
    settings: &DecoderSettings,
) -> Result<ElementaryValue, DecodingError> {
    let size =
        ty.elementary_size().ok_or(DecodingError::UnsupportedType { name: ty.to_string() })?;
    trace!("decoding {} from {} bytes", ty, bytes.len());

    // short input is treated as if it were left-padded with zeros
    let mut padded;
    let bytes = if bytes.len() < size {
        padded = vec![0u8; size - bytes.len()];
        padded.extend_from_slice(bytes);
        padded.as_slice()
    } else {
        bytes
    };

    let (value, padding) = if is_left_aligned(ty) {
        (&bytes[..size], &bytes[size..])
    } else {
        let split = bytes.len() - size;
        (&bytes[split..], &bytes[..split])
    };

    if !settings.permissive_padding {
        let expected = if is_signed(ty) && value.first().is_some_and(|b| b & 0x80 != 0) {
            0xff
        } else {
            0x00
        };
        if padding.iter().any(|b| *b != expected) {
            return Err(DecodingError::PaddingError { raw: Bytes::copy_from_slice(bytes) });
        }
    }

    let decoded = match ty {
        Type::Bool => match U256::from_be_slice(value) {
            raw if raw == U256::ZERO => ElementaryValue::Bool(false),
            raw if raw == U256::from(1) => ElementaryValue::Bool(true),
            raw => return Err(DecodingError::BoolOutOfRange { raw }),
        },
        Type::Uint { .. } => ElementaryValue::Uint(U256::from_be_slice(value)),
        Type::Int { .. } => ElementaryValue::Int(sign_extend(value)),
        Type::Fixed { places, .. } => {
            ElementaryValue::Fixed { raw: sign_extend(value), places: *places }
        }
        Type::Ufixed { places, .. } => {
            ElementaryValue::Ufixed { raw: U256::from_be_slice(value), places: *places }
        }
        Type::Address { .. } => ElementaryValue::Address(Address::from_slice(value)),
        Type::Contract(_) => ElementaryValue::Contract(Address::from_slice(value)),
        Type::FixedBytes { .. } => ElementaryValue::FixedBytes(Bytes::copy_from_slice(value)),
        Type::Enum(enumeration) => {
            let raw = U256::from_be_slice(value);
            if enumeration.options.is_empty() {
                return Err(DecodingError::UserDefinedTypeNotFound { id: enumeration.id.clone() });
            }

            let (index, name) = u8::try_from(raw)
                .ok()
                .and_then(|index| Some((index, enumeration.options.get(usize::from(index))?)))
                .ok_or(DecodingError::EnumOutOfRange { id: enumeration.id.clone(), raw })?;
            ElementaryValue::Enum { index, name: name.clone() }
        }
        Type::Function(function) => match function.visibility {
            Visibility::External => ElementaryValue::ExternalFunction {
                address: Address::from_slice(&value[..20]),
                selector: FixedBytes::from_slice(&value[20..24]),
            },
            Visibility::Internal => ElementaryValue::InternalFunction {
                constructor_pc: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
                deployed_pc: u32::from_be_bytes([value[4], value[5], value[6], value[7]]),
            },
        },
        _ => return Err(DecodingError::UnsupportedType { name: ty.to_string() }),
    };

    Ok(decoded)
}

/// Decodes the contents of a `bytes` or `string` value.
pub(crate) fn decode_byte_string(
    ty: &Type,
    bytes: Vec<u8>,
) -> Result<ElementaryValue, DecodingError> {
    match ty {
        Type::Bytes { .. } => Ok(ElementaryValue::Bytes(Bytes::from(bytes))),
        Type::String { .. } => Ok(ElementaryValue::String(StringValue::from(bytes.as_slice()))),
        _ => Err(DecodingError::UnsupportedType { name: ty.to_string() }),
    }
}
