//! Region readers: translate a pointer into raw bytes.
//!
//! Only storage reads can suspend; every other region is fully present in the snapshot.

mod memory;
mod stack;
mod storage;

pub(crate) use memory::read_bytes;
pub(crate) use stack::read_stack;
pub(crate) use storage::{read_range, read_slot};

use crate::{
    error::{DecodingError, Error},
    interfaces::DecoderSettings,
    pointer::DataPointer,
    state::MachineState,
    suspend::Mailbox,
};

/// Reads the raw bytes a pointer designates. Object pointers designate where an object starts,
/// not a run of bytes, and cannot be read directly.
pub(crate) async fn read(
    state: &MachineState,
    mailbox: &Mailbox,
    settings: &DecoderSettings,
    pointer: &DataPointer,
) -> Result<Vec<u8>, Error> {
    match pointer {
        DataPointer::Stack { index } => Ok(read_stack(state, *index)?.to_vec()),
        DataPointer::Literal { bytes } => Ok(bytes.to_vec()),
        DataPointer::Memory { start, length } => Ok(read_bytes(&state.memory, *start, *length)),
        DataPointer::Calldata { start, length } => {
            Ok(read_bytes(&state.calldata, *start, *length))
        }
        DataPointer::Returndata { start, length } => {
            Ok(read_bytes(&state.returndata, *start, *length))
        }
        DataPointer::Storage { range } => read_range(state, mailbox, settings, range).await,
        DataPointer::Object(_) => {
            Err(DecodingError::UnsupportedType { name: "object pointer".to_string() }.into())
        }
    }
}
