//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use lockbox_license::{ConfigStore, MemoryConfigStore, PremiumKeyVerifier, StoreError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};

/// Fixed RSA-2048 key pair used to mint test tokens.
pub const TEST_SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/test-signing-key.pem");
pub const TEST_PUBLIC_KEY_DER: &[u8] = include_bytes!("../fixtures/test-public-key.der");

/// An unrelated key pair, for wrong-key tests.
pub const OTHER_SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/other-signing-key.pem");
pub const OTHER_PUBLIC_KEY_DER: &[u8] = include_bytes!("../fixtures/other-public-key.der");

pub const ONE_DAY_SECS: i64 = 24 * 60 * 60;

/// Verifier for tokens signed with [`TEST_SIGNING_KEY_PEM`].
pub fn test_verifier() -> PremiumKeyVerifier {
    PremiumKeyVerifier::from_public_key_der(TEST_PUBLIC_KEY_DER).unwrap()
}

/// Signs `claims` as an RS256 token with the test key.
pub fn sign_claims(claims: &Value) -> String {
    sign_claims_with(TEST_SIGNING_KEY_PEM, claims)
}

/// Signs `claims` as an RS256 token with the given PEM private key.
pub fn sign_claims_with(signing_key_pem: &[u8], claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(signing_key_pem).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

/// Claims for a perpetual key naming a company.
pub fn standard_claims() -> Value {
    json!({
        "jti": "a3f1c2d4-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "company": "Analytical Engines Ltd",
        "iat": 1_700_000_000,
    })
}

/// Creates a signed key that never expires.
pub fn make_perpetual_key() -> String {
    sign_claims(&standard_claims())
}

/// Creates a signed key expiring at `exp` (seconds since epoch).
pub fn make_key_expiring_at(exp: i64) -> String {
    let mut claims = standard_claims();
    claims["exp"] = json!(exp);
    sign_claims(&claims)
}

/// Creates a signed key that expired a day ago.
pub fn make_expired_key() -> String {
    make_key_expiring_at(chrono::Utc::now().timestamp() - ONE_DAY_SECS)
}

/// Creates a signed key that expires in a year.
pub fn make_annual_key() -> String {
    make_key_expiring_at(chrono::Utc::now().timestamp() + 365 * ONE_DAY_SECS)
}

/// Flips a single bit of the decoded signature and re-encodes the token.
pub fn flip_signature_bit(token: &str, bit: usize) -> String {
    let (message, signature) = token.rsplit_once('.').unwrap();
    let mut sig = URL_SAFE_NO_PAD.decode(signature).unwrap();
    let idx = bit % (sig.len() * 8);
    sig[idx / 8] ^= 1 << (idx % 8);
    format!("{message}.{}", URL_SAFE_NO_PAD.encode(sig))
}

/// Replaces the payload segment, keeping the original header and signature.
pub fn swap_payload(token: &str, payload: &Value) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{payload_b64}.{}", parts[0], parts[2])
}

/// Store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryConfigStore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl ConfigStore for FlakyStore {
    fn read_string(&self, key: &str) -> Result<String, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("settings unreadable")));
        }
        self.inner.read_string(key)
    }

    fn write_string(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write_string(key, value)
    }
}

/// Store that parks every write until the test releases it.
pub struct GatedStore {
    inner: MemoryConfigStore,
    entered: tokio::sync::mpsc::UnboundedSender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedStore {
    /// Returns the store, a receiver signalled when a write starts, and a
    /// sender that lets one parked write proceed.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner: MemoryConfigStore::new(),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        (store, entered_rx, release_tx)
    }
}

impl ConfigStore for GatedStore {
    fn read_string(&self, key: &str) -> Result<String, StoreError> {
        self.inner.read_string(key)
    }

    fn write_string(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let _ = self.entered.send(());
        self.release.lock().unwrap().recv().unwrap();
        self.inner.write_string(key, value)
    }
}
