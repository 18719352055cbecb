use alloy::primitives::{Bytes, U256};
use hashbrown::HashMap;

/// A single 32-byte EVM word.
pub type Word = [u8; 32];

/// The [`MachineState`] struct is a read-only snapshot of the EVM regions a decoding session
/// reads from.
///
/// Memory, calldata and returndata are always complete: reads past their end are zero-filled.
/// Storage is partial: slots missing from `storage` are requested from the host while decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MachineState {
    /// Stack words, bottom of the stack first.
    pub stack: Vec<Word>,

    /// Linear memory.
    pub memory: Vec<u8>,

    /// Storage words known ahead of time, keyed by resolved slot address.
    pub storage: HashMap<U256, Word>,

    /// Input data of the current call.
    pub calldata: Bytes,

    /// Data returned by the most recent call.
    pub returndata: Bytes,
}

impl MachineState {
    /// Creates an empty [`MachineState`].
    ///
    /// ```
    /// use mimir_codec::MachineState;
    ///
    /// let state = MachineState::new();
    /// assert!(state.stack.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a word onto the top of the stack.
    pub fn with_stack_word(mut self, value: U256) -> Self {
        self.stack.push(value.to_be_bytes::<32>());
        self
    }

    /// Replaces memory.
    pub fn with_memory(mut self, memory: impl Into<Vec<u8>>) -> Self {
        self.memory = memory.into();
        self
    }

    /// Pre-populates a storage slot.
    ///
    /// ```
    /// use alloy::primitives::U256;
    /// use mimir_codec::MachineState;
    ///
    /// let state = MachineState::new().with_storage(U256::from(1), U256::from(42));
    /// assert_eq!(state.storage.len(), 1);
    /// ```
    pub fn with_storage(mut self, slot: U256, value: U256) -> Self {
        self.storage.insert(slot, value.to_be_bytes::<32>());
        self
    }

    /// Replaces calldata.
    pub fn with_calldata(mut self, calldata: impl Into<Bytes>) -> Self {
        self.calldata = calldata.into();
        self
    }

    /// Replaces returndata.
    pub fn with_returndata(mut self, returndata: impl Into<Bytes>) -> Self {
        self.returndata = returndata.into();
        self
    }
}
