//! Hole card sealing.
//!
//! The backend seals each player's hole cards with the player's account
//! identifier as passphrase, in the salted format produced by `openssl enc`
//! and CryptoJS: base64 of `"Salted__" || salt || AES-256-CBC(json)`, with
//! key and IV derived by MD5 `EVP_BytesToKey`. The account identifier also
//! travels to the backend in the clear, so this hides cards from casual
//! onlookers rather than from an adversary.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use md5::{Digest, Md5};

use crate::model::{AccountId, Card};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Opens sealed hole cards for the account that owns them.
pub trait CardCipher: Send + Sync {
    /// The cards hidden in `sealed`, or `None` if they cannot be read with
    /// `key`.
    fn open(&self, sealed: &str, key: &AccountId) -> Option<Vec<Card>>;
}

/// The passphrase format the backend uses.
#[derive(Debug, Default, Copy, Clone)]
pub struct SaltedAes;

impl SaltedAes {
    /// Seal `cards` for the owner of `key` with a random salt.
    pub fn seal(&self, cards: &[Card], key: &AccountId) -> String {
        self.seal_with_salt(cards, key, rand::random())
    }

    pub fn seal_with_salt(&self, cards: &[Card], key: &AccountId, salt: [u8; SALT_LEN]) -> String {
        // Serializing a slice of plain string structs cannot fail.
        let plain = serde_json::to_vec(cards).unwrap_or_default();
        let (k, iv) = derive_key_iv(key.as_str().as_bytes(), &salt);
        let mut buf = vec![0u8; plain.len() + BLOCK_LEN];
        buf[..plain.len()].copy_from_slice(&plain);
        let sealed_len = match Aes256CbcEnc::new_from_slices(&k, &iv) {
            Ok(enc) => match enc.encrypt_padded_mut::<Pkcs7>(&mut buf, plain.len()) {
                Ok(ct) => ct.len(),
                Err(_) => 0,
            },
            Err(_) => 0,
        };
        let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + sealed_len);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&buf[..sealed_len]);
        STANDARD.encode(out)
    }
}

impl CardCipher for SaltedAes {
    fn open(&self, sealed: &str, key: &AccountId) -> Option<Vec<Card>> {
        let raw = STANDARD.decode(sealed.trim()).ok()?;
        if raw.len() < MAGIC.len() + SALT_LEN + BLOCK_LEN || &raw[..MAGIC.len()] != MAGIC {
            debug!("sealed cards are not in salted format");
            return None;
        }
        let salt = &raw[MAGIC.len()..MAGIC.len() + SALT_LEN];
        let mut body = raw[MAGIC.len() + SALT_LEN..].to_vec();
        let (k, iv) = derive_key_iv(key.as_str().as_bytes(), salt);
        let plain = Aes256CbcDec::new_from_slices(&k, &iv)
            .ok()?
            .decrypt_padded_mut::<Pkcs7>(&mut body)
            .ok()?;
        match serde_json::from_slice(plain) {
            Ok(cards) => Some(cards),
            Err(e) => {
                debug!("opened cards are not readable: {}", e);
                None
            }
        }
    }
}

// OpenSSL's EVP_BytesToKey with MD5 and a single iteration.
fn derive_key_iv(pass: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN);
    let mut prev: Vec<u8> = Vec::new();
    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&prev);
        hasher.update(pass);
        hasher.update(salt);
        prev = hasher.finalize().to_vec();
        material.extend_from_slice(&prev);
    }
    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}
