/*
    cipher.rs - Namespace payload encryption

    Encrypts content payloads travelling between peers using ChaCha20-Poly1305.
    Each namespace has a shared secret; the working key is derived with
    HKDF-SHA256 salted by the namespace id.

    Wire layout: nonce (12 bytes) || ciphertext+tag
    AAD:         namespace id || owner id

    Security properties:
    - Authenticated encryption (AEAD)
    - Unique random nonce per payload
    - Payload bound to the namespace and the peer that encrypted it
    - Secrets zeroized on drop
*/

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use zeroize::Zeroizing;

use crate::core_table::content::Content;
use crate::core_table::errors::CipherError;
use crate::core_table::key::{NamespaceId, PeerId};
use crate::core_table::traits::ContentCipher;

/// Nonce length for ChaCha20-Poly1305
const NONCE_LEN: usize = 12;

/// HKDF info string for content keys
const KEY_INFO: &[u8] = b"meshtable/content/v1";

/// Secret shared by the members of one namespace
pub type NamespaceSecret = [u8; 32];

/// ChaCha20-Poly1305 cipher keyed per namespace
#[derive(Default)]
pub struct GroupCipher {
    secrets: RwLock<HashMap<NamespaceId, Zeroizing<NamespaceSecret>>>,
}

impl GroupCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or rotate) the secret for a namespace
    pub fn insert_secret(&self, namespace: NamespaceId, secret: NamespaceSecret) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace, Zeroizing::new(secret));
    }

    /// Builder form of `insert_secret`
    pub fn with_secret(self, namespace: NamespaceId, secret: NamespaceSecret) -> Self {
        self.insert_secret(namespace, secret);
        self
    }

    /// Forget a namespace secret (leaving a group)
    pub fn remove_secret(&self, namespace: &NamespaceId) -> bool {
        self.secrets.write().unwrap_or_else(PoisonError::into_inner).remove(namespace).is_some()
    }

    /// Secret for the nil namespace, used for entries only this peer reads
    pub fn set_self_secret(&self, secret: NamespaceSecret) {
        self.insert_secret(NamespaceId::nil(), secret);
    }

    pub fn has_secret(&self, namespace: &NamespaceId) -> bool {
        self.secrets.read().unwrap_or_else(PoisonError::into_inner).contains_key(namespace)
    }

    /// Fresh random secret
    pub fn generate_secret() -> NamespaceSecret {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        secret
    }

    fn cipher_for(&self, namespace: NamespaceId) -> Result<ChaCha20Poly1305, CipherError> {
        let secrets = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
        let secret = secrets.get(&namespace).ok_or(CipherError::MissingKey(namespace))?;

        let hk = Hkdf::<Sha256>::new(Some(namespace.as_bytes()), secret.as_slice());
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(KEY_INFO, okm.as_mut_slice())
            .map_err(|e| CipherError::Encryption(format!("Key derivation failed: {}", e)))?;

        Ok(ChaCha20Poly1305::new(Key::from_slice(okm.as_slice())))
    }

    fn aad(namespace: NamespaceId, owner: PeerId) -> [u8; 32] {
        let mut aad = [0u8; 32];
        aad[..16].copy_from_slice(namespace.as_bytes());
        aad[16..].copy_from_slice(owner.as_bytes());
        aad
    }
}

impl ContentCipher for GroupCipher {
    fn encrypt(
        &self,
        owner: PeerId,
        namespace: NamespaceId,
        content: &Content,
    ) -> Result<Vec<u8>, CipherError> {
        let cipher = self.cipher_for(namespace)?;
        let plaintext = Zeroizing::new(bincode::serialize(content)?);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let aad = Self::aad(namespace, owner);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: &plaintext, aad: &aad })
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(
        &self,
        sender: PeerId,
        namespace: NamespaceId,
        payload: &[u8],
    ) -> Result<Content, CipherError> {
        if payload.len() < NONCE_LEN {
            return Err(CipherError::Decryption("Invalid ciphertext length".to_string()));
        }

        let cipher = self.cipher_for(namespace)?;
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let aad = Self::aad(namespace, sender);

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad: &aad })
                .map_err(|e| CipherError::Decryption(e.to_string()))?,
        );

        Ok(bincode::deserialize(&plaintext)?)
    }
}
