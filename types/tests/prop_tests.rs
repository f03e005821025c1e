use proptest::prelude::*;

use chainvote_types::{
    Candidate, CandidateId, Election, ElectionBasic, ElectionId, ElectionWindow, Timestamp, TxHash,
    VoterAddress,
};

proptest! {
    /// Display then parse yields the same hash.
    #[test]
    fn tx_hash_text_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let parsed: TxHash = hash.to_string().parse().unwrap();
        prop_assert_eq!(parsed, hash);
    }

    /// TxHash::is_zero is true only for all-zero bytes.
    #[test]
    fn tx_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// TxHash survives bincode, which is how the LMDB backend persists it.
    #[test]
    fn tx_hash_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let encoded = bincode::serialize(&hash).unwrap();
        let decoded: TxHash = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, hash);
    }

    /// Address display is always 0x + 40 lowercase hex and parses back.
    #[test]
    fn voter_address_shape(bytes in prop::array::uniform20(0u8..)) {
        let addr = VoterAddress::from_bytes(bytes);
        prop_assert_eq!(addr.as_str().len(), 42);
        let parsed: VoterAddress = addr.as_str().to_uppercase().replacen("0X", "0x", 1).parse().unwrap();
        prop_assert_eq!(parsed, addr);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// An election with an end time never accepts votes at or after it.
    #[test]
    fn no_votes_after_end(end in 1u64..1_000_000, offset in 0u64..1_000_000) {
        let election = Election {
            id: ElectionId(1),
            title: String::new(),
            description: String::new(),
            start_at: None,
            end_at: Some(Timestamp::new(end)),
            closed: false,
            candidates: vec![],
            tally_block: 0,
        };
        let now = Timestamp::new(end + offset);
        prop_assert_eq!(election.window_at(now), ElectionWindow::Ended);
        prop_assert!(!election.accepts_votes_at(now));
    }

    /// Merging ledger state never reopens a closed election.
    #[test]
    fn merge_keeps_closed(cached_closed: bool, ledger_closed: bool) {
        let mut election = Election {
            id: ElectionId(3),
            title: "cached".into(),
            description: "kept".into(),
            start_at: None,
            end_at: None,
            closed: cached_closed,
            candidates: vec![],
            tally_block: 0,
        };
        let basic = ElectionBasic {
            id: ElectionId(3),
            title: "ledger".into(),
            description: String::new(),
            start_at: None,
            end_at: None,
            closed: ledger_closed,
            candidate_count: 0,
        };
        election.merge_ledger_state(&basic, vec![], 0);
        prop_assert_eq!(election.closed, cached_closed || ledger_closed);
        prop_assert_eq!(election.description.as_str(), "kept");
    }

    /// Tallies applied in any order leave the counts read at the latest block.
    #[test]
    fn tally_follows_latest_block(blocks in prop::collection::vec(1u64..1000, 1..20)) {
        let mut election = Election {
            id: ElectionId(4),
            title: String::new(),
            description: String::new(),
            start_at: None,
            end_at: None,
            closed: false,
            candidates: vec![],
            tally_block: 0,
        };
        for &block in &blocks {
            let count = Candidate {
                id: CandidateId(1),
                name: "Ada".into(),
                party: String::new(),
                vote_count: block,
            };
            election.apply_tally(&[count], block);
        }
        let latest = blocks.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(election.tally_block, latest);
        prop_assert_eq!(election.total_votes(), latest);
    }
}
