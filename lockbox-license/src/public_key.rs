//! Embedded premium key verification material.
//!
//! The key ships with the binary as an asset under `keys/`. Rotating the key
//! means adding a new `premium-vN.der`, pointing the constants below at it,
//! and bumping [`PREMIUM_PUBLIC_KEY_VERSION`].

use base64::{engine::general_purpose::STANDARD, Engine};

/// Version tag of the embedded key.
pub const PREMIUM_PUBLIC_KEY_VERSION: u32 = 1;

/// RSA-2048 public key (X.509 SubjectPublicKeyInfo, DER) that signs premium keys.
pub const PREMIUM_PUBLIC_KEY_DER: &[u8] = include_bytes!("../keys/premium-v1.der");

const PEM_LINE_WIDTH: usize = 64;

/// Wraps SubjectPublicKeyInfo DER bytes in `PUBLIC KEY` PEM armor.
pub(crate) fn spki_der_to_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::with_capacity(encoded.len() + encoded.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN PUBLIC KEY-----\n");
    // base64 output is ASCII, so byte chunks are valid str slices
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}
