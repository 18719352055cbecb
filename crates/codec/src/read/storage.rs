use alloy::primitives::U256;
use tracing::trace;

use crate::{
    error::{DecodingError, Error},
    interfaces::DecoderSettings,
    pointer::{Slot, StorageRange},
    state::{MachineState, Word},
    storage::slot_address,
    suspend::{Mailbox, Request},
};

/// Reads the word at `slot`, suspending if neither the snapshot nor an earlier reply has it.
pub(crate) async fn read_slot(state: &MachineState, mailbox: &Mailbox, slot: &Slot) -> Word {
    let address = slot_address(slot);
    if let Some(word) = state.storage.get(&address) {
        trace!("read slot 0x{:x} from snapshot", address);
        return *word;
    }

    mailbox.request(Request::Storage { slot: address }).await
}

/// Reads a run of storage bytes that may span several consecutive slots.
pub(crate) async fn read_range(
    state: &MachineState,
    mailbox: &Mailbox,
    settings: &DecoderSettings,
    range: &StorageRange,
) -> Result<Vec<u8>, Error> {
    if range.length == 0 {
        return Ok(Vec::new());
    }

    let first = range.from.slot.plus(U256::from(range.from.index / 32));
    let index = range.from.index % 32;

    let end = index.checked_add(range.length).ok_or(DecodingError::OverlargePointer {
        raw: U256::from(range.from.index).saturating_add(U256::from(range.length)),
    })?;
    let words = end.div_ceil(32);
    if words as u64 > settings.max_storage_range_words {
        return Err(DecodingError::OverlargePointer { raw: U256::from(words) }.into());
    }
    trace!("reading {} bytes across {} storage words", range.length, words);

    let mut bytes = Vec::with_capacity(words * 32);
    for offset in 0..words {
        let word = read_slot(state, mailbox, &first.plus(U256::from(offset))).await;
        bytes.extend_from_slice(&word);
    }

    Ok(bytes[index..end].to_vec())
}
