//! Property tests: arbitrary entry sets survive a pack/unpack round trip.

use std::collections::HashMap;

use proptest::prelude::*;

use zipwright::{Rewrite, archives_equivalent, unpack};

fn entry_sets() -> impl Strategy<Value = HashMap<String, Vec<u8>>> {
    proptest::collection::hash_map(
        "[a-z][a-z0-9_]{0,11}",
        proptest::collection::vec(any::<u8>(), 0..1024),
        1..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pack_unpack_round_trip(entries in entry_sets()) {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        let out = dir.path().join("out");

        let mut rewrite = Rewrite::create().destination(&archive);
        for (name, data) in &entries {
            rewrite = rewrite.add_entry(name.clone(), data.clone());
        }
        let result = rewrite.execute().unwrap();
        prop_assert_eq!(result.entries_added, entries.len());

        unpack(&archive, &out).unwrap();
        for (name, data) in &entries {
            let restored = std::fs::read(out.join(name)).unwrap();
            prop_assert_eq!(&restored, data);
        }
    }

    #[test]
    fn prop_repack_is_equivalent(entries in entry_sets()) {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.zip");
        let second = dir.path().join("second.zip");

        for target in [&first, &second] {
            let mut names: Vec<&String> = entries.keys().collect();
            names.sort();
            let mut rewrite = Rewrite::create().destination(target);
            for name in names {
                rewrite = rewrite.add_entry(name.clone(), entries[name].clone());
            }
            rewrite.execute().unwrap();
        }

        prop_assert!(archives_equivalent(&first, &second).unwrap());
    }
}
