//! Steam Guard codes
//!
//! Login codes (5 characters from the Steam Guard alphabet) and tag-scoped
//! confirmation keys, both HMAC-SHA1 over a big-endian time buffer.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::config::Credentials;
use crate::error::{AgentError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Login code alphabet used by the mobile authenticator
const CODE_CHARS: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";

/// Secrets are accepted with or without base64 padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Login codes rotate every 30 seconds
const CODE_PERIOD_SECS: u64 = 30;

/// Confirmation tags longer than this are truncated by the platform
const MAX_TAG_LEN: usize = 32;

/// Time-scoped code generator
pub trait KeyGenerator: Send + Sync {
    /// Current platform time in unix seconds
    fn current_time(&self) -> u64;

    /// Confirmation key for `tag` at `time`
    fn generate_confirmation_key(&self, identity_secret: &str, time: u64, tag: &str) -> Result<String>;

    /// Login code for the current time window
    fn generate_login_code(&self, shared_secret: &str) -> Result<String>;
}

/// Local Steam Guard implementation
#[derive(Debug, Clone, Default)]
pub struct SteamGuard {
    /// Seconds added to local time to match server time
    time_offset: i64,
}

impl SteamGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_offset(time_offset: i64) -> Self {
        Self { time_offset }
    }

    /// Login code for an explicit unix time
    pub fn login_code_at(&self, shared_secret: &str, time: u64) -> Result<String> {
        let secret = decode_secret(shared_secret)?;
        let window = time / CODE_PERIOD_SECS;

        let mut mac = HmacSha1::new_from_slice(&secret)
            .map_err(|e| AgentError::Config(format!("Invalid shared secret: {}", e)))?;
        mac.update(&window.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        // Dynamic truncation (RFC 4226)
        let offset = (hash[19] & 0x0f) as usize;
        let mut full_code = u32::from_be_bytes([
            hash[offset] & 0x7f,
            hash[offset + 1],
            hash[offset + 2],
            hash[offset + 3],
        ]);

        let mut code = String::with_capacity(5);
        for _ in 0..5 {
            let idx = (full_code % CODE_CHARS.len() as u32) as usize;
            code.push(CODE_CHARS[idx] as char);
            full_code /= CODE_CHARS.len() as u32;
        }
        Ok(code)
    }
}

impl KeyGenerator for SteamGuard {
    fn current_time(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        (now + self.time_offset).max(0) as u64
    }

    fn generate_confirmation_key(&self, identity_secret: &str, time: u64, tag: &str) -> Result<String> {
        let secret = decode_secret(identity_secret)?;

        let tag = &tag.as_bytes()[..tag.len().min(MAX_TAG_LEN)];
        let mut buf = Vec::with_capacity(8 + tag.len());
        buf.extend_from_slice(&time.to_be_bytes());
        buf.extend_from_slice(tag);

        let mut mac = HmacSha1::new_from_slice(&secret)
            .map_err(|e| AgentError::Config(format!("Invalid identity secret: {}", e)))?;
        mac.update(&buf);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn generate_login_code(&self, shared_secret: &str) -> Result<String> {
        self.login_code_at(shared_secret, self.current_time())
    }
}

/// Secrets are usually base64; 40-character hex secrets are accepted too.
/// Anything else is used as raw key bytes.
fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    if secret.len() == 40 && secret.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(secret)
            .map_err(|e| AgentError::Config(format!("Invalid hex secret: {}", e)));
    }

    match LENIENT_BASE64.decode(secret.trim()) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!("Secret is not base64 ({}), using raw bytes", e);
            Ok(secret.as_bytes().to_vec())
        }
    }
}

/// Code generator bound to the agent's secrets
#[derive(Clone)]
pub struct ConfirmationCodes {
    generator: Arc<dyn KeyGenerator>,
    shared_secret: Option<String>,
    identity_secret: Option<String>,
}

impl ConfirmationCodes {
    pub fn new(generator: Arc<dyn KeyGenerator>, credentials: &Credentials) -> Self {
        Self {
            generator,
            shared_secret: credentials.shared_secret().map(str::to_string),
            identity_secret: credentials.identity_secret().map(str::to_string),
        }
    }

    pub fn current_time(&self) -> u64 {
        self.generator.current_time()
    }

    /// Fresh login code, or `None` when no shared secret is configured
    pub fn login_code(&self) -> Result<Option<String>> {
        self.shared_secret
            .as_deref()
            .map(|secret| self.generator.generate_login_code(secret))
            .transpose()
    }

    /// Tag-scoped confirmation key; requires an identity secret
    pub fn confirmation_key(&self, time: u64, tag: &str) -> Result<String> {
        let secret = self.identity_secret.as_deref().ok_or_else(|| {
            AgentError::Config(
                "identity_secret is required to generate confirmation codes".to_string(),
            )
        })?;
        self.generator.generate_confirmation_key(secret, time, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "c2VjcmV0LXNlY3JldC1zZWNyZXQ=";

    #[test]
    fn test_login_code_shape() {
        let guard = SteamGuard::new();
        let code = guard.login_code_at(SECRET, 1_700_000_000).unwrap();
        assert_eq!(code.len(), 5);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
    }

    #[test]
    fn test_login_code_stable_within_window() {
        let guard = SteamGuard::new();
        // 1_700_000_010 and 1_700_000_019 share a 30s window
        let a = guard.login_code_at(SECRET, 1_700_000_010).unwrap();
        let b = guard.login_code_at(SECRET, 1_700_000_019).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_confirmation_key_matches_hmac() {
        let guard = SteamGuard::new();
        let key = guard.generate_confirmation_key(SECRET, 1_700_000_000, "conf").unwrap();

        let mut mac = HmacSha1::new_from_slice(&BASE64.decode(SECRET).unwrap()).unwrap();
        let mut buf = 1_700_000_000u64.to_be_bytes().to_vec();
        buf.extend_from_slice(b"conf");
        mac.update(&buf);
        assert_eq!(key, BASE64.encode(mac.finalize().into_bytes()));
    }

    #[test]
    fn test_confirmation_key_depends_on_tag() {
        let guard = SteamGuard::new();
        let conf = guard.generate_confirmation_key(SECRET, 1_700_000_000, "conf").unwrap();
        let allow = guard.generate_confirmation_key(SECRET, 1_700_000_000, "allow").unwrap();
        assert_ne!(conf, allow);
    }

    #[test]
    fn test_hex_secret_accepted() {
        let guard = SteamGuard::new();
        let hex_secret = "00112233445566778899aabbccddeeff00112233";
        let bytes = hex::decode(hex_secret).unwrap();
        let as_base64 = BASE64.encode(&bytes);

        // same key bytes either way
        assert_eq!(
            guard.login_code_at(hex_secret, 1_700_000_000).unwrap(),
            guard.login_code_at(&as_base64, 1_700_000_000).unwrap()
        );
        assert_eq!(decode_secret(hex_secret).unwrap(), bytes);
    }

    #[test]
    fn test_unpadded_and_raw_secrets() {
        let guard = SteamGuard::new();
        let padded = guard.login_code_at(SECRET, 1_700_000_000).unwrap();
        let unpadded = guard
            .login_code_at(SECRET.trim_end_matches('='), 1_700_000_000)
            .unwrap();
        assert_eq!(padded, unpadded);

        // not base64 at all: still produces a code from the raw bytes
        let raw = guard.login_code_at("s", 1_700_000_000).unwrap();
        assert_eq!(raw.len(), 5);
    }

    #[test]
    fn test_confirmation_key_requires_identity_secret() {
        let creds = Credentials::new("u", "p").unwrap();
        let codes = ConfirmationCodes::new(Arc::new(SteamGuard::new()), &creds);
        assert!(matches!(
            codes.confirmation_key(0, "conf"),
            Err(AgentError::Config(_))
        ));
        assert_eq!(codes.login_code().unwrap(), None);
    }

    #[test]
    fn test_login_code_with_shared_secret() {
        let creds = Credentials::new("u", "p").unwrap().with_shared_secret(SECRET);
        let codes = ConfirmationCodes::new(Arc::new(SteamGuard::new()), &creds);
        let code = codes.login_code().unwrap().unwrap();
        assert_eq!(code.len(), 5);
    }
}
