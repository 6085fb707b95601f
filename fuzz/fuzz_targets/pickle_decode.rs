//! Fuzz target for unpickling
//!
//! # Strategy
//!
//! - Raw: arbitrary blobs under an arbitrary key (exercises the MAC gate)
//! - Sealed: arbitrary field bytes sealed under the key, so the MAC passes
//!   and every field decoder sees hostile input
//!
//! # Invariants
//!
//! - Unpickling NEVER panics
//! - Anything that unpickles repickles to the same blob

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quire_core::{Account, InboundGroupSession, OutboundGroupSession, Pickle, Session, pickle};

#[derive(Debug, Arbitrary)]
enum Input {
    Raw { key: Vec<u8>, blob: Vec<u8> },
    Sealed { key: Vec<u8>, fields: Vec<u8> },
}

fn check<T: Pickle>(blob: &[u8], key: &[u8]) {
    if let Ok(entity) = T::from_pickle(blob, key) {
        assert_eq!(entity.pickle(key), blob, "pickle is not canonical");
    }
}

fuzz_target!(|input: Input| {
    let (key, blob) = match input {
        Input::Raw { key, blob } => (key, blob),
        Input::Sealed { key, fields } => {
            let blob = pickle::seal(&key, &fields);
            (key, blob)
        },
    };

    check::<Account>(&blob, &key);
    check::<Session>(&blob, &key);
    check::<OutboundGroupSession>(&blob, &key);
    check::<InboundGroupSession>(&blob, &key);
});
