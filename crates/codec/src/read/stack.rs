use tracing::trace;

use crate::{error::DecodingError, state::MachineState, state::Word};

/// Reads the stack word at `index`, counted from the bottom of the stack.
pub(crate) fn read_stack(state: &MachineState, index: usize) -> Result<Word, DecodingError> {
    trace!("reading stack[{}]", index);
    state
        .stack
        .get(index)
        .copied()
        .ok_or(DecodingError::StackOutOfRange { index, depth: state.stack.len() })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;

    #[test]
    fn test_read_stack() {
        let state =
            MachineState::new().with_stack_word(U256::from(1)).with_stack_word(U256::from(2));
        assert_eq!(read_stack(&state, 1), Ok(U256::from(2).to_be_bytes::<32>()));
        assert_eq!(
            read_stack(&state, 2),
            Err(DecodingError::StackOutOfRange { index: 2, depth: 2 })
        );
    }
}
