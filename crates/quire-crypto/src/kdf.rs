//! Key derivation using HKDF-SHA-256 and HMAC-SHA-256

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Expand input key material into `N` bytes with HKDF-SHA-256.
///
/// `salt` of `None` is equivalent to a salt of 32 zero bytes. `N` must not
/// exceed 8160 bytes (255 SHA-256 blocks); every caller in this workspace
/// asks for at most 128.
pub fn hkdf_expand<const N: usize>(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; N] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; N];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("HKDF-SHA256 output length is bounded well below 255 blocks");
    };

    okm
}

/// HMAC-SHA-256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(data);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf_is_deterministic() {
        let a: [u8; 64] = hkdf_expand(None, b"input key material", b"info");
        let b: [u8; 64] = hkdf_expand(None, b"input key material", b"info");
        assert_eq!(a, b);
    }

    #[test]
    fn hkdf_info_separates_domains() {
        let a: [u8; 32] = hkdf_expand(None, b"ikm", b"OLM_ROOT");
        let b: [u8; 32] = hkdf_expand(None, b"ikm", b"OLM_RATCHET");
        assert_ne!(a, b);
    }

    #[test]
    fn hkdf_salt_changes_output() {
        let a: [u8; 32] = hkdf_expand(Some(b"salt-a"), b"ikm", b"info");
        let b: [u8; 32] = hkdf_expand(Some(b"salt-b"), b"ikm", b"info");
        assert_ne!(a, b);
    }

    #[test]
    fn hkdf_prefix_is_stable_across_lengths() {
        let short: [u8; 32] = hkdf_expand(None, b"ikm", b"info");
        let long: [u8; 80] = hkdf_expand(None, b"ikm", b"info");
        assert_eq!(short, long[..32]);
    }

    #[test]
    fn hmac_matches_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            mac,
            [
                0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
                0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
                0x64, 0xec, 0x38, 0x43,
            ]
        );
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256(b""),
            [
                0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
                0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
                0x78, 0x52, 0xb8, 0x55,
            ]
        );
    }
}
