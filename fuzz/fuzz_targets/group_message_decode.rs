//! Fuzz target for group message and checkpoint decoding
//!
//! # Invariants
//!
//! - Decoders NEVER panic
//! - Any accepted input re-encodes to exactly the same bytes
//! - Sessions built from decoded checkpoints report the checkpoint's index
//!   and provenance

#![no_main]

use libfuzzer_sys::fuzz_target;
use quire_core::InboundGroupSession;
use quire_proto::{ExportedSessionKey, GroupMessage, GroupSessionBackup, SessionKey};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = GroupMessage::decode(data) {
        assert_eq!(message.encode(), data);
    }

    if let Ok(session_key) = SessionKey::decode(data) {
        assert_eq!(session_key.encode(), data);

        if let Ok(session) = InboundGroupSession::new(&session_key) {
            assert!(session.is_verified());
            assert_eq!(session.first_known_index(), session_key.message_index);
        }
    }

    if let Ok(exported) = ExportedSessionKey::decode(data) {
        assert_eq!(exported.encode(), data);

        if let Ok(session) = InboundGroupSession::import(&exported) {
            assert!(!session.is_verified());
            assert_eq!(session.export_at_first_known_index().encode(), data);
        }
    }

    if let Ok(backup) = GroupSessionBackup::decode(data) {
        assert_eq!(backup.encode(), data);
    }
});
