//! Bearer credential lifecycle: decode, expiry check, persistence.
//!
//! Credentials are decoded without signature verification. The client only
//! needs the claims to know who the user is and when the session ends; the
//! server remains the authority on whether a token is actually accepted.

use crate::domain::{Claims, StoragePtr};
use crate::error::{StorefrontError, StorefrontResult};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// Long-lived storage key holding the bearer credential.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Long-lived storage key holding the subject id derived from the credential.
pub const USER_ID_KEY: &str = "id";

const BEARER_PREFIX: &str = "Bearer ";

// JWT payloads are normally unpadded, but padded input is accepted too.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================
// Subject resolution
// ============================================================

/// Reads one candidate claim as a subject identifier.
#[derive(Debug, Clone, Copy)]
pub struct SubjectExtractor {
    // ---
    pub claim: &'static str,
}

impl SubjectExtractor {
    // ---
    /// Numeric ids and numeric strings are accepted. Zero counts as absent.
    pub fn extract(&self, claims: &Claims) -> Option<u64> {
        // ---
        let id = match claims.extra.get(self.claim)? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (id != 0).then_some(id)
    }
}

/// Candidate subject claims, highest priority first.
///
/// "Present" means present and usable: a claim that exists but does not hold
/// a non-zero numeric id (e.g. `sub: "abc"`) is skipped and the next
/// candidate is consulted, so a non-numeric `sub` does not hide a valid `id`.
pub const SUBJECT_EXTRACTORS: [SubjectExtractor; 4] = [
    SubjectExtractor { claim: "userId" },
    SubjectExtractor { claim: "sub" },
    SubjectExtractor { claim: "id" },
    SubjectExtractor { claim: "user_id" },
];

/// First subject id found in priority order, else `None` (unauthenticated).
pub fn subject_id(claims: &Claims) -> Option<u64> {
    // ---
    SUBJECT_EXTRACTORS
        .iter()
        .find_map(|extractor| extractor.extract(claims))
}

// ============================================================
// Decode and expiry
// ============================================================

/// Decodes the payload segment of a credential.
///
/// # Errors
/// Returns [`StorefrontError::MalformedCredential`] if the credential is not
/// three dot-separated segments, or if the payload is not base64url JSON.
pub fn decode(credential: &str) -> StorefrontResult<Claims> {
    // ---
    let token = credential
        .trim()
        .strip_prefix(BEARER_PREFIX)
        .unwrap_or(credential.trim());

    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(StorefrontError::MalformedCredential(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| StorefrontError::MalformedCredential(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| StorefrontError::MalformedCredential(format!("payload is not JSON: {e}")))
}

/// True if the claims carry no expiry, or the expiry is at or before `now`.
pub fn is_expired_at(claims: &Claims, now: i64) -> bool {
    // ---
    match claims.exp {
        Some(exp) => exp <= now,
        None => true,
    }
}

/// [`is_expired_at`] against the current wall clock.
pub fn is_expired(claims: &Claims) -> bool {
    // ---
    is_expired_at(claims, chrono::Utc::now().timestamp())
}

/// Expiry check straight from the credential string. Undecodable credentials
/// are expired.
pub fn credential_is_expired(credential: &str) -> bool {
    // ---
    decode(credential).map_or(true, |claims| is_expired(&claims))
}

/// Decodes and requires an unexpired credential.
///
/// # Errors
/// [`StorefrontError::MalformedCredential`] or [`StorefrontError::ExpiredCredential`].
pub fn validate(credential: &str) -> StorefrontResult<Claims> {
    // ---
    let claims = decode(credential)?;
    if is_expired(&claims) {
        return Err(StorefrontError::ExpiredCredential);
    }
    Ok(claims)
}

// ============================================================
// Persistence
// ============================================================

/// Credential persistence on the long-lived client storage.
#[derive(Clone)]
pub struct TokenStore {
    // ---
    storage: StoragePtr,
}

impl TokenStore {
    // ---
    pub fn new(storage: StoragePtr) -> Self {
        // ---
        Self { storage }
    }

    /// The stored credential, if any.
    pub fn load(&self) -> StorefrontResult<Option<String>> {
        // ---
        self.storage
            .get(ACCESS_TOKEN_KEY)
            .map_err(StorefrontError::storage)
    }

    /// The denormalized subject id, readable without decoding.
    pub fn stored_user_id(&self) -> Option<u64> {
        // ---
        match self.storage.get(USER_ID_KEY) {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(e) => {
                tracing::warn!("Failed to read stored user id: {:#}", e);
                None
            }
        }
    }

    /// Stores the credential and, when known, the subject id alongside it.
    ///
    /// If `user_id` is not given it is resolved from the credential's claims.
    pub fn persist(&self, credential: &str, user_id: Option<u64>) -> StorefrontResult<()> {
        // ---
        let user_id = user_id.or_else(|| decode(credential).ok().as_ref().and_then(subject_id));

        self.storage
            .set(ACCESS_TOKEN_KEY, credential)
            .map_err(StorefrontError::storage)?;

        let written = match user_id {
            Some(id) => self.storage.set(USER_ID_KEY, &id.to_string()),
            None => self.storage.remove(USER_ID_KEY),
        };

        if let Err(e) = written {
            // Never leave a credential behind without its matching id.
            let _ = self.storage.remove(ACCESS_TOKEN_KEY);
            return Err(StorefrontError::storage(e));
        }

        tracing::debug!("Persisted credential for user {:?}", user_id);
        Ok(())
    }

    /// Removes both the credential and the denormalized subject id.
    ///
    /// Both removals are attempted even if the first one fails.
    pub fn clear(&self) -> StorefrontResult<()> {
        // ---
        let token = self.storage.remove(ACCESS_TOKEN_KEY);
        let id = self.storage.remove(USER_ID_KEY);
        token.and(id).map_err(StorefrontError::storage)
    }
}

// ============================================================
// Tests
// ============================================================
