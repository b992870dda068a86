// AgentDeck Engine — GitHub Token Store
// AES-256-GCM with a random key kept in the OS keychain. The ciphertext lives
// in engine_config; the plaintext token is only handed to the update engine
// and only ever shown redacted.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use log::{error, info};
use std::sync::Arc;

use crate::atoms::constants::{ENC_PREFIX, GITHUB_TOKEN_KEY, TOKEN_VAULT_SERVICE, TOKEN_VAULT_USER};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::TokenStatus;
use crate::engine::store::EngineStore;

/// Source of the 32-byte vault key.
pub trait VaultKeySource: Send + Sync {
    fn vault_key(&self) -> EngineResult<Vec<u8>>;
}

/// Key held in the OS keychain, created on first use.
pub struct KeychainKey;

impl VaultKeySource for KeychainKey {
    fn vault_key(&self) -> EngineResult<Vec<u8>> {
        let entry = keyring::Entry::new(TOKEN_VAULT_SERVICE, TOKEN_VAULT_USER)
            .map_err(|e| EngineError::Keyring(format!("Keyring init failed: {}", e)))?;

        match entry.get_password() {
            Ok(key_b64) => base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &key_b64)
                .map_err(|e| EngineError::Keyring(format!("Failed to decode vault key: {}", e))),
            Err(keyring::Error::NoEntry) => {
                use rand::Rng;
                let mut key = vec![0u8; 32];
                rand::thread_rng().fill(&mut key[..]);
                let key_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &key);
                entry.set_password(&key_b64).map_err(|e| {
                    error!("[credentials] Failed to store vault key: {}", e);
                    EngineError::Keyring(format!("Failed to store vault key in keychain: {}", e))
                })?;
                info!("[credentials] Created new token vault key in OS keychain");
                Ok(key)
            }
            Err(e) => {
                error!("[credentials] OS keychain error: {}", e);
                Err(EngineError::Keyring(e.to_string()))
            }
        }
    }
}

/// Fixed in-memory key, for headless environments and tests.
pub struct StaticKey(pub Vec<u8>);

impl VaultKeySource for StaticKey {
    fn vault_key(&self) -> EngineResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

// ── Encrypt / Decrypt ──────────────────────────────────────────────────────

/// Returns "enc:" + base64(nonce || ciphertext+tag).
fn encrypt_token(token: &str, key: &[u8]) -> EngineResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| EngineError::Crypto("vault key must be 32 bytes".into()))?;

    let mut nonce_bytes = [0u8; 12];
    use rand::Rng;
    rand::thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, token.as_bytes())
        .map_err(|e| EngineError::Crypto(format!("AES-256-GCM encryption failed: {}", e)))?;

    let mut packed = Vec::with_capacity(12 + ciphertext.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext);

    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &packed);
    Ok(format!("{}{}", ENC_PREFIX, encoded))
}

fn decrypt_token(stored: &str, key: &[u8]) -> EngineResult<String> {
    let Some(encoded) = stored.strip_prefix(ENC_PREFIX) else {
        return Err(EngineError::Crypto("stored token is not encrypted".into()));
    };

    let packed = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|e| EngineError::Crypto(format!("Base64 decode failed: {}", e)))?;
    if packed.len() < 12 + 16 {
        return Err(EngineError::Crypto("Ciphertext too short".into()));
    }

    let (nonce_bytes, ciphertext) = packed.split_at(12);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| EngineError::Crypto("vault key must be 32 bytes".into()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EngineError::Crypto("token decryption failed (vault key changed?)".into()))?;
    String::from_utf8(plaintext).map_err(|e| EngineError::Crypto(format!("token is not UTF-8: {}", e)))
}

/// Show only the last four characters.
pub fn redact(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

// ── Token store ────────────────────────────────────────────────────────────

pub struct TokenStore {
    store: Arc<EngineStore>,
    keys: Box<dyn VaultKeySource>,
}

impl TokenStore {
    pub fn new(store: Arc<EngineStore>, keys: Box<dyn VaultKeySource>) -> Self {
        TokenStore { store, keys }
    }

    /// Store a token. An empty or whitespace-only token clears it.
    pub fn save(&self, token: &str) -> EngineResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return self.clear();
        }
        let key = self.keys.vault_key()?;
        self.store.set_config(GITHUB_TOKEN_KEY, &encrypt_token(token, &key)?)?;
        info!("[credentials] GitHub token saved ({})", redact(token));
        Ok(())
    }

    pub fn clear(&self) -> EngineResult<()> {
        self.store.delete_config(GITHUB_TOKEN_KEY)?;
        info!("[credentials] GitHub token cleared");
        Ok(())
    }

    /// The plaintext token, or `None` in unauthenticated mode.
    pub fn token(&self) -> EngineResult<Option<String>> {
        match self.store.get_config(GITHUB_TOKEN_KEY)? {
            Some(stored) => {
                let key = self.keys.vault_key()?;
                Ok(Some(decrypt_token(&stored, &key)?))
            }
            None => Ok(None),
        }
    }

    pub fn status(&self) -> EngineResult<TokenStatus> {
        Ok(match self.token()? {
            Some(token) => TokenStatus { configured: true, redacted: Some(redact(&token)) },
            None => TokenStatus { configured: false, redacted: None },
        })
    }
}
