//! Round-trip properties of every value and key codec.
//!
//! Each case runs against a real environment so dictionary references are
//! written and resolved through LMDB.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use planb::codec::{
    CountSerde, RangeKeySerde, SessionKeySerde, StateValueSerde, TemporalKeySerde,
    VariableValSerde,
};
use planb::{KeyRange, Serde, StateValue, TemporalKey, TemporalPrecision};

use crate::common::*;

const INLINE_THRESHOLD: usize = 16;

fn encode<T, S: Serde<T> + ?Sized>(t: &TestEnv, serde: &S, value: &T) -> Vec<u8> {
    t.env
        .write(|w| {
            let mut out = Vec::new();
            serde.write(w, value, &mut out)?;
            Ok(out)
        })
        .unwrap()
}

fn decode<T, S: Serde<T> + ?Sized>(t: &TestEnv, serde: &S, bytes: &[u8]) -> T {
    t.env.read(|txn| serde.read(txn, bytes)).unwrap()
}

fn val_serde(t: &TestEnv) -> Arc<VariableValSerde> {
    Arc::new(VariableValSerde::new(Arc::clone(&t.dictionary), INLINE_THRESHOLD))
}

fn float_edges() -> impl Strategy<Value = f64> {
    prop::sample::select(vec![
        f64::NAN,
        -f64::NAN,
        0.0,
        -0.0,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::MIN_POSITIVE,
        f64::EPSILON,
        f64::MAX,
        f64::MIN,
        5e-324,
    ])
}

/// Values whose encoding fits the inline threshold.
fn inline_val() -> impl Strategy<Value = Val> {
    prop_oneof![
        Just(Val::Null),
        any::<bool>().prop_map(Val::Boolean),
        any::<i64>().prop_map(Val::Long),
        any::<f64>().prop_map(Val::Double),
        float_edges().prop_map(Val::Double),
        any::<i64>().prop_map(Val::Date),
        "[a-z0-9]{0,15}".prop_map(Val::String),
        prop::collection::vec(any::<u8>(), 0..=15).prop_map(Val::Bytes),
    ]
}

/// Values whose encoding exceeds the inline threshold.
fn spilled_val() -> impl Strategy<Value = Val> {
    prop_oneof![
        "\\PC{32,120}".prop_map(Val::String),
        prop::collection::vec(any::<u8>(), 32..300).prop_map(Val::Bytes),
    ]
}

fn precision() -> impl Strategy<Value = TemporalPrecision> {
    prop::sample::select(vec![
        TemporalPrecision::Day,
        TemporalPrecision::Hour,
        TemporalPrecision::Minute,
        TemporalPrecision::Second,
        TemporalPrecision::Millisecond,
        TemporalPrecision::Nanosecond,
    ])
}

// Years 1900..2200 with nanosecond detail
fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (-2_208_988_800i64..7_258_118_400i64, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn inline_vals_round_trip(val in inline_val()) {
        let t = TestEnv::new();
        let serde = val_serde(&t);
        let bytes = encode(&t, serde.as_ref(), &val);
        prop_assert!(!serde.uses_lookup(&bytes));
        prop_assert_eq!(decode::<Val, _>(&t, serde.as_ref(), &bytes), val);
        prop_assert_eq!(t.dictionary_len(), 0);
    }

    #[test]
    fn spilled_vals_round_trip_through_dictionary(val in spilled_val()) {
        let t = TestEnv::new();
        let serde = val_serde(&t);
        let bytes = encode(&t, serde.as_ref(), &val);
        prop_assert!(serde.uses_lookup(&bytes));
        prop_assert_eq!(bytes.len(), 1 + t.dictionary.hash_length());
        prop_assert_eq!(decode::<Val, _>(&t, serde.as_ref(), &bytes), val);
        prop_assert_eq!(t.dictionary_len(), 1);
    }

    #[test]
    fn state_values_round_trip(
        millis in -2_208_988_800_000i64..7_258_118_400_000i64,
        val in prop_oneof![inline_val(), spilled_val()],
    ) {
        let t = TestEnv::new();
        let serde = StateValueSerde::new(val_serde(&t));
        let insert_time = DateTime::from_timestamp_millis(millis).unwrap();
        let state = StateValue::new(insert_time, val);
        let bytes = encode(&t, &serde, &state);
        prop_assert_eq!(StateValueSerde::insert_time(&bytes).unwrap(), insert_time);
        prop_assert_eq!(decode::<StateValue, _>(&t, &serde, &bytes), state);
    }

    #[test]
    fn session_keys_round_trip_at_their_precision(
        key in "\\PC{0,40}",
        start in instant(),
        len_nanos in 0i64..86_400_000_000_000,
        precision in precision(),
    ) {
        let t = TestEnv::new();
        let serde = SessionKeySerde::new(precision);
        let end = start + Duration::nanoseconds(len_nanos);
        let session = Session::new(key.clone(), start, end).unwrap();
        let expected = Session::new(
            key,
            precision.truncate(start).unwrap(),
            precision.truncate(end).unwrap(),
        )
        .unwrap();

        let bytes = encode(&t, &serde, &session);
        prop_assert_eq!(decode::<Session, _>(&t, &serde, &bytes), expected.clone());
        prop_assert_eq!(encode(&t, &serde, &expected), bytes);
    }

    #[test]
    fn temporal_keys_round_trip(key in "\\PC{0,40}", slot in any::<u16>()) {
        let t = TestEnv::new();
        let temporal_key = TemporalKey::new(key, slot);
        let bytes = encode(&t, &TemporalKeySerde, &temporal_key);
        prop_assert_eq!(decode::<TemporalKey, _>(&t, &TemporalKeySerde, &bytes), temporal_key);
    }

    #[test]
    fn range_keys_round_trip(a in any::<i64>(), b in any::<i64>()) {
        let t = TestEnv::new();
        let range = KeyRange::new(a.min(b), a.max(b)).unwrap();
        let bytes = encode(&t, &RangeKeySerde, &range);
        prop_assert_eq!(bytes.len(), RangeKeySerde::LEN);
        prop_assert_eq!(decode::<KeyRange, _>(&t, &RangeKeySerde, &bytes), range);
    }

    #[test]
    fn counts_round_trip(count in any::<i64>()) {
        let t = TestEnv::new();
        let bytes = encode(&t, &CountSerde, &count);
        prop_assert_eq!(decode::<i64, _>(&t, &CountSerde, &bytes), count);
    }
}

#[test]
fn test_session_times_below_precision_are_dropped() {
    let t = TestEnv::new();
    let serde = SessionKeySerde::new(TemporalPrecision::Millisecond);
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 20, 9).unwrap()
        + Duration::nanoseconds(151_771_038);
    let session = Session::at("k", start);

    let bytes = encode(&t, &serde, &session);
    let stored: Session = decode(&t, &serde, &bytes);

    let millis = Utc.with_ymd_and_hms(2024, 6, 1, 10, 20, 9).unwrap()
        + Duration::milliseconds(151);
    assert_eq!(stored.start(), millis);
    assert_eq!(stored.end(), millis);
    assert_ne!(stored, session);
}

#[test]
fn test_double_edges_keep_their_bits() {
    let t = TestEnv::new();
    let serde = val_serde(&t);
    for d in [f64::NAN, -0.0, f64::NEG_INFINITY] {
        let bytes = encode(&t, serde.as_ref(), &Val::Double(d));
        match decode::<Val, _>(&t, serde.as_ref(), &bytes) {
            Val::Double(back) => assert_eq!(back.to_bits(), d.to_bits()),
            other => panic!("expected a double, got {:?}", other),
        }
    }
}
