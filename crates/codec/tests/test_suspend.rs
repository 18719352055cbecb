//! Integration tests for suspending and resuming storage decodes.

mod integration_tests {
    use alloy::primitives::{Bytes, U256};
    use async_trait::async_trait;
    use hashbrown::HashMap;
    use mimir_codec::{
        utils::hex::word, Allocations, DataPointer, Decoder, Error, Location, MachineState,
        Request, Slot, Step, StorageHost, Type,
    };

    fn reply(value: U256) -> Bytes {
        Bytes::from(word(value).to_vec())
    }

    /// Answers each slot with its address plus 100.
    fn answer(request: &Request) -> U256 {
        match request {
            Request::Storage { slot } => slot.wrapping_add(U256::from(100)),
        }
    }

    struct SnapshotHost {
        storage: HashMap<U256, U256>,
    }

    #[async_trait(?Send)]
    impl StorageHost for SnapshotHost {
        async fn fetch(&self, request: &Request) -> eyre::Result<Bytes> {
            let Request::Storage { slot } = request;
            Ok(reply(self.storage.get(slot).copied().unwrap_or_default()))
        }
    }

    #[test]
    fn test_each_missing_slot_suspends_once() {
        let ty = Type::static_array(Type::uint256(), 3, Location::Storage);
        let pointer = DataPointer::storage_word(Slot::base(U256::from(5)));
        let allocations = Allocations::new();

        let empty = MachineState::new();
        let mut decoding = Decoder::new(&empty, &allocations).decode(ty.clone(), pointer.clone());

        let mut requests = Vec::new();
        let mut step = decoding.step().expect("failed to step");
        let suspended = loop {
            match step {
                Step::Complete(value) => break value,
                Step::Request(request) => {
                    assert_eq!(decoding.pending(), Some(&request));
                    requests.push(request);
                    step = decoding.resume(reply(answer(&request))).expect("failed to resume");
                }
            }
        };

        assert_eq!(decoding.suspensions(), 3);
        assert!(decoding.is_finished());
        assert_eq!(
            requests,
            vec![
                Request::Storage { slot: U256::from(5) },
                Request::Storage { slot: U256::from(6) },
                Request::Storage { slot: U256::from(7) },
            ]
        );

        let full = MachineState::new()
            .with_storage(U256::from(5), U256::from(105))
            .with_storage(U256::from(6), U256::from(106))
            .with_storage(U256::from(7), U256::from(107));
        let prepopulated = Decoder::new(&full, &allocations)
            .decode(ty, pointer)
            .run_to_completion()
            .expect("failed to decode");
        assert_eq!(suspended, prepopulated);
        assert_eq!(suspended.to_string(), "[105, 106, 107]");
    }

    #[test]
    fn test_cached_slots_are_not_requested() {
        let ty = Type::static_array(Type::uint256(), 3, Location::Storage);
        let pointer = DataPointer::storage_word(Slot::base(U256::from(5)));
        let allocations = Allocations::new();

        let partial = MachineState::new().with_storage(U256::from(6), U256::from(106));
        let mut decoding = Decoder::new(&partial, &allocations).decode(ty, pointer);

        let mut requests = Vec::new();
        let mut step = decoding.step().expect("failed to step");
        let value = loop {
            match step {
                Step::Complete(value) => break value,
                Step::Request(request) => {
                    requests.push(request);
                    step = decoding.resume(reply(answer(&request))).expect("failed to resume");
                }
            }
        };

        assert_eq!(
            requests,
            vec![Request::Storage { slot: U256::from(5) }, Request::Storage { slot: U256::from(7) }]
        );
        assert_eq!(decoding.suspensions(), 2);
        assert_eq!(value.to_string(), "[105, 106, 107]");
    }

    #[test]
    fn test_shared_slot_is_requested_once() {
        let state = MachineState::new();
        let allocations = Allocations::new();

        let decoding = Decoder::new(&state, &allocations).decode(
            Type::static_array(Type::Uint { bits: 128 }, 2, Location::Storage),
            DataPointer::storage_word(Slot::base(U256::ZERO)),
        );

        let mut requests = 0;
        let value = decoding
            .run_with(|_| {
                requests += 1;
                Ok(reply(U256::from(1) | (U256::from(2) << 128usize)))
            })
            .expect("failed to decode");
        assert_eq!(requests, 1);
        assert_eq!(value.to_string(), "[1, 2]");
    }

    #[test]
    fn test_step_while_waiting_repeats_the_request() {
        let state = MachineState::new();
        let allocations = Allocations::new();
        let mut decoding = Decoder::new(&state, &allocations)
            .decode(Type::uint256(), DataPointer::storage_word(Slot::base(U256::from(9))));

        let first = decoding.step().expect("failed to step");
        let second = decoding.step().expect("failed to step");
        assert_eq!(first, second);
        assert_eq!(decoding.suspensions(), 1);
    }

    #[test]
    fn test_malformed_reply_aborts() {
        let state = MachineState::new();
        let allocations = Allocations::new();
        let mut decoding = Decoder::new(&state, &allocations)
            .decode(Type::uint256(), DataPointer::storage_word(Slot::base(U256::from(9))));

        let request = match decoding.step().expect("failed to step") {
            Step::Request(request) => request,
            step => panic!("unexpected step {step:?}"),
        };

        let result = decoding.resume(vec![0u8; 31]);
        assert!(matches!(
            result,
            Err(Error::MalformedReply { request: failed, length: 31 }) if failed == request
        ));
        assert!(decoding.is_finished());
        assert!(matches!(decoding.step(), Err(Error::Completed)));
    }

    #[test]
    fn test_unexpected_reply() {
        let state = MachineState::new().with_storage(U256::from(9), U256::from(1));
        let allocations = Allocations::new();
        let mut decoding = Decoder::new(&state, &allocations)
            .decode(Type::uint256(), DataPointer::storage_word(Slot::base(U256::from(9))));

        assert!(matches!(decoding.resume(reply(U256::ZERO)), Err(Error::UnexpectedReply)));
        assert!(matches!(decoding.step(), Ok(Step::Complete(_))));
    }

    #[tokio::test]
    async fn test_drive_with_host() {
        let owner = Slot::base(U256::from(2)).hashed();
        let data = mimir_codec::slot_address(&owner);
        let host = SnapshotHost {
            storage: HashMap::from([
                (U256::from(2), U256::from(2)),
                (data, U256::from(7)),
                (data.wrapping_add(U256::from(1)), U256::from(8)),
            ]),
        };

        let state = MachineState::new();
        let allocations = Allocations::new();
        let value = Decoder::new(&state, &allocations)
            .decode(
                Type::dynamic_array(Type::uint256(), Location::Storage),
                DataPointer::storage_word(Slot::base(U256::from(2))),
            )
            .drive(&host)
            .await
            .expect("failed to decode");
        assert_eq!(value.to_string(), "[7, 8]");
    }
}
