//! Fuzz target for the group hash ratchet
//!
//! # Strategy
//!
//! - Arbitrary 128-byte states at arbitrary starting indices
//! - Random sequences of single steps and forward jumps
//! - Jumps across every part boundary, including index wraparound
//!
//! # Invariants
//!
//! - `advance_to(n)` matches stepping one at a time
//! - Two jumps to the same index land on the same state
//! - Message keys at different indices differ

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quire_crypto::{HashRatchet, RATCHET_LENGTH};

#[derive(Debug, Arbitrary)]
struct Scenario {
    state: [u8; RATCHET_LENGTH],
    start: u32,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Advance,
    /// Jump by a bounded distance so stepwise comparison stays cheap
    Jump { distance: u16 },
    /// Jump to an arbitrary index, compared against a two-hop jump
    JumpTo { target: u32 },
}

fuzz_target!(|scenario: Scenario| {
    let mut ratchet = HashRatchet::from_bytes(&scenario.state, scenario.start);

    for operation in scenario.operations.into_iter().take(64) {
        let before = ratchet.clone();

        match operation {
            Operation::Advance => {
                ratchet.advance();
                assert_eq!(ratchet.index(), before.index().wrapping_add(1));
            },
            Operation::Jump { distance } => {
                let distance = u32::from(distance % 512);
                let target = before.index().wrapping_add(distance);

                let mut stepped = before.clone();
                for _ in 0..distance {
                    stepped.advance();
                }
                ratchet.advance_to(target);

                assert_eq!(ratchet.index(), target);
                assert_eq!(ratchet.to_bytes(), stepped.to_bytes(), "jump diverged from steps");
            },
            Operation::JumpTo { target } => {
                if target < before.index() {
                    continue;
                }
                let midpoint = before.index() + (target - before.index()) / 2;

                let mut two_hop = before.clone();
                two_hop.advance_to(midpoint);
                two_hop.advance_to(target);
                ratchet.advance_to(target);

                assert_eq!(ratchet.to_bytes(), two_hop.to_bytes(), "jump is path dependent");
            },
        }

        if ratchet.index() != before.index() {
            assert_ne!(
                ratchet.cipher_keys().encrypt(&[0u8; 16]),
                before.cipher_keys().encrypt(&[0u8; 16]),
                "distinct indices share a key"
            );
        }
    }
});
