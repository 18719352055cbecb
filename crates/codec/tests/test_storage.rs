//! Integration tests for decoding storage values from a prepopulated snapshot.

mod integration_tests {
    use alloy::primitives::{Address, U256};
    use mimir_codec::{
        slot_address, Allocations, ContractAllocation, DataPointer, DecodedValue, Decoder,
        ElementaryValue, Error, Location, MachineState, MappingKey, Slot, StorageLength,
        StorageStructAllocation, StringValue, Type, TypeId, Value,
    };

    /// A short string slot: contents left-aligned, twice the length in the low byte.
    fn short_string(contents: &[u8]) -> U256 {
        let mut word = [0u8; 32];
        word[..contents.len()].copy_from_slice(contents);
        word[31] = (contents.len() * 2) as u8;
        U256::from_be_bytes(word)
    }

    fn decode(
        state: &MachineState,
        allocations: &Allocations,
        ty: Type,
        pointer: DataPointer,
    ) -> DecodedValue {
        Decoder::new(state, allocations)
            .decode(ty, pointer)
            .run_to_completion()
            .expect("failed to decode")
    }

    #[test]
    fn test_short_storage_string() {
        let state = MachineState::new().with_storage(U256::from(2), short_string(b"hello"));
        let allocations = Allocations::new();

        let value = decode(
            &state,
            &allocations,
            Type::String { location: Some(Location::Storage) },
            DataPointer::storage_word(Slot::base(U256::from(2))),
        );
        assert_eq!(
            value.as_elementary(),
            Some(&ElementaryValue::String(StringValue::Valid("hello".to_string())))
        );
    }

    #[test]
    fn test_long_storage_string() {
        let contents = "a".repeat(40);
        let data = slot_address(&Slot::base(U256::from(3)).hashed());

        let mut tail = [0u8; 32];
        tail[..8].copy_from_slice(&contents.as_bytes()[32..]);
        let state = MachineState::new()
            .with_storage(U256::from(3), U256::from(40 * 2 + 1))
            .with_storage(data, U256::from_be_slice(&contents.as_bytes()[..32]))
            .with_storage(data.wrapping_add(U256::from(1)), U256::from_be_bytes(tail));
        let allocations = Allocations::new();

        let value = decode(
            &state,
            &allocations,
            Type::String { location: Some(Location::Storage) },
            DataPointer::storage_word(Slot::base(U256::from(3))),
        );
        assert_eq!(
            value.as_elementary(),
            Some(&ElementaryValue::String(StringValue::Valid(contents)))
        );
    }

    #[test]
    fn test_storage_dynamic_array() {
        let data = slot_address(&Slot::base(U256::from(4)).hashed());
        let state = MachineState::new()
            .with_storage(U256::from(4), U256::from(2))
            .with_storage(data, U256::from(100))
            .with_storage(data.wrapping_add(U256::from(1)), U256::from(200));
        let allocations = Allocations::new();

        let value = decode(
            &state,
            &allocations,
            Type::dynamic_array(Type::uint256(), Location::Storage),
            DataPointer::storage_word(Slot::base(U256::from(4))),
        );
        assert_eq!(value.to_string(), "[100, 200]");
    }

    #[test]
    fn test_packed_storage_array() {
        // four uint64 elements share one slot, first element in the low-order bytes
        let packed = U256::from(1) |
            (U256::from(2) << 64usize) |
            (U256::from(3) << 128usize) |
            (U256::from(4) << 192usize);
        let state = MachineState::new()
            .with_storage(U256::from(6), packed)
            .with_storage(U256::from(7), U256::from(5));
        let allocations = Allocations::new();

        let value = decode(
            &state,
            &allocations,
            Type::static_array(Type::Uint { bits: 64 }, 5, Location::Storage),
            DataPointer::storage_word(Slot::base(U256::from(6))),
        );
        assert_eq!(value.to_string(), "[1, 2, 3, 4, 5]");
    }

    #[test]
    fn test_storage_mapping_decodes_empty_without_reading() {
        let state = MachineState::new();
        let allocations = Allocations::new();

        let value = decode(
            &state,
            &allocations,
            Type::mapping(Type::uint256(), Type::uint256()),
            DataPointer::storage_word(Slot::base(U256::ZERO)),
        );
        assert!(matches!(value, DecodedValue::Value { value: Value::Mapping, .. }));
    }

    #[test]
    fn test_mapping_entry_lookup() {
        let slot = Slot::base(U256::from(1)).mapping_entry(MappingKey::Uint(U256::from(7)));
        let state = MachineState::new().with_storage(slot_address(&slot), U256::from(99));
        let allocations = Allocations::new();

        let value = decode(&state, &allocations, Type::uint256(), DataPointer::storage_word(slot));
        assert_eq!(value.as_uint(), Some(U256::from(99)));
    }

    #[test]
    fn test_packed_storage_struct() {
        let mut allocations = Allocations::new();
        let allocation = StorageStructAllocation::pack(
            vec![
                ("a".to_string(), Type::Uint { bits: 128 }),
                ("b".to_string(), Type::Uint { bits: 64 }),
                ("c".to_string(), Type::uint256()),
            ],
            &allocations,
        )
        .expect("failed to pack");
        assert_eq!(allocation.size, U256::from(2));
        allocations.storage.insert(TypeId::from("packed"), allocation);
        assert_eq!(
            allocations.storage_size(&Type::structure("packed", "Packed", Location::Storage)),
            Ok(StorageLength::Words(U256::from(2)))
        );

        let state = MachineState::new()
            .with_storage(U256::from(10), U256::from(11) | (U256::from(22) << 128usize))
            .with_storage(U256::from(11), U256::from(33));

        let value = decode(
            &state,
            &allocations,
            Type::structure("packed", "Packed", Location::Storage),
            DataPointer::storage_word(Slot::base(U256::from(10))),
        );
        assert_eq!(value.to_string(), "{ a: 11, b: 22, c: 33 }");
    }

    #[test]
    fn test_decode_state_variables() {
        let mut allocations = Allocations::new();
        let contract = ContractAllocation::pack(
            vec![
                ("owner".to_string(), Type::Address { payable: false }),
                ("count".to_string(), Type::Uint { bits: 64 }),
                ("name".to_string(), Type::String { location: None }),
            ],
            &allocations,
        )
        .expect("failed to pack");
        allocations.state.insert(TypeId::from("token"), contract);

        let owner = Address::repeat_byte(0x11);
        let state = MachineState::new()
            .with_storage(
                U256::ZERO,
                U256::from_be_slice(owner.as_slice()) | (U256::from(42) << 160usize),
            )
            .with_storage(U256::from(1), short_string(b"mimir"));
        let decoder = Decoder::new(&state, &allocations);
        let id = TypeId::from("token");

        let decode_variable = |name: &str| {
            decoder
                .decode_variable(&id, name)
                .expect("unknown variable")
                .run_to_completion()
                .expect("failed to decode")
        };

        assert_eq!(
            decode_variable("owner").as_elementary(),
            Some(&ElementaryValue::Address(owner))
        );
        assert_eq!(decode_variable("count").as_uint(), Some(U256::from(42)));
        assert_eq!(
            decode_variable("name").as_elementary(),
            Some(&ElementaryValue::String(StringValue::Valid("mimir".to_string())))
        );
        assert!(decoder.decode_variable(&id, "missing").is_none());
        assert!(decoder.decode_variable(&TypeId::from("other"), "owner").is_none());
    }

    #[test]
    fn test_missing_slot_without_host_is_unavailable() {
        let state = MachineState::new();
        let allocations = Allocations::new();

        let result = Decoder::new(&state, &allocations)
            .decode(Type::uint256(), DataPointer::storage_word(Slot::base(U256::from(8))))
            .run_to_completion();
        assert!(matches!(result, Err(Error::Unavailable { .. })));
    }
}
