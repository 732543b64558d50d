//! Property tests for key encodings, hashing and time truncation.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use planb::codec::reader::write_ordered_i64;
use planb::codec::{RangeKeySerde, SessionKeySerde, TemporalKeySerde};
use planb::{
    HashFactory, IntegerHashFactory, KeyRange, KeySerde, LongHashFactory, TemporalKey,
    TemporalPrecision,
};

use crate::common::Session;

fn instant(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

// Years 1900..2200
fn millis() -> impl Strategy<Value = i64> {
    -2_208_988_800_000i64..7_258_118_400_000i64
}

proptest! {
    #[test]
    fn ordered_encoding_preserves_order(a in any::<i64>(), b in any::<i64>()) {
        let (mut ea, mut eb) = (Vec::new(), Vec::new());
        write_ordered_i64(&mut ea, a);
        write_ordered_i64(&mut eb, b);
        prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
    }

    #[test]
    fn range_keys_sort_by_start(a in any::<i64>(), b in any::<i64>(), len in 0i64..1000) {
        let ra = KeyRange::new(a, a.saturating_add(len)).unwrap();
        let rb = KeyRange::new(b, b.saturating_add(len)).unwrap();
        let (mut ea, mut eb) = (Vec::new(), Vec::new());
        RangeKeySerde.write_key(&ra, &mut ea).unwrap();
        RangeKeySerde.write_key(&rb, &mut eb).unwrap();
        prop_assert_eq!(ea.cmp(&eb), (a, ra.to()).cmp(&(b, rb.to())));
    }

    #[test]
    fn sessions_of_one_key_sort_by_start(
        key in "[a-z]{1,12}",
        a in millis(),
        b in millis(),
    ) {
        let serde = SessionKeySerde::new(TemporalPrecision::Millisecond);
        let sa = Session::at(key.clone(), instant(a));
        let sb = Session::at(key, instant(b));
        let (mut ea, mut eb) = (Vec::new(), Vec::new());
        serde.write_key(&sa, &mut ea).unwrap();
        serde.write_key(&sb, &mut eb).unwrap();
        prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
    }

    #[test]
    fn counter_keys_share_their_key_prefix(key in "[a-z]{1,12}", slot in any::<u16>()) {
        let mut prefix = Vec::new();
        TemporalKeySerde.write_prefix(&key, &mut prefix).unwrap();
        let mut encoded = Vec::new();
        TemporalKeySerde.write_key(&TemporalKey::new(key, slot), &mut encoded).unwrap();
        prop_assert!(encoded.starts_with(&prefix));
        prop_assert_eq!(encoded.len(), prefix.len() + 2);
    }

    #[test]
    fn hashes_are_deterministic_and_fixed_width(
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        for factory in [&LongHashFactory as &dyn HashFactory, &IntegerHashFactory] {
            let h = factory.create(&bytes);
            prop_assert_eq!(h, factory.create(&bytes));
            prop_assert_eq!(h.to_bytes().len(), factory.hash_length());
        }
    }

    #[test]
    fn truncation_is_idempotent_and_never_later(ms in millis()) {
        for precision in [
            TemporalPrecision::Day,
            TemporalPrecision::Hour,
            TemporalPrecision::Minute,
            TemporalPrecision::Second,
            TemporalPrecision::Millisecond,
        ] {
            let once = precision.truncate(instant(ms)).unwrap();
            prop_assert!(once <= instant(ms));
            prop_assert_eq!(precision.truncate(once).unwrap(), once);
        }
    }
}
