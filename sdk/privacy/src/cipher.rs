//! Secret delivery
//!
//! Delivers a one-time blinding secret to the holder of a reading key
//! without an interactive channel.
//!
//! ```text
//! Flow:
//! 1. Sender draws ephemeral scalar e, E = e·BASE8
//! 2. Shared point K = e·R (R = recipient reading public key)
//! 3. pack(K) = key[0..16] ∥ iv[16..32]
//! 4. cipher_bytes = AES-128-CBC(key, iv, secret as 32 bytes big-endian)
//! 5. Output = pack(E) ∥ cipher_bytes (64 bytes)
//! ```
//!
//! Secrets are below Q (< 2^252), so the top 5 bits of a correct plaintext are
//! always zero. Decryption checks that sentinel. It is not a MAC: a wrong key
//! slips through about once in 32 attempts, and callers that need
//! authenticity must check the recovered secret against something else
//! (e.g. the output commitment).

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::curve::{PACKED_POINT_LENGTH, Point, base_mul, decode_hex, scalar_mul};
use crate::error::{PrivacyError, Result};
use crate::field::{Scalar, random_scalar, scalar_to_biguint, secret_from_biguint};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Size of the encrypted secret block
pub const SECRET_LENGTH: usize = 32;

/// Size of a serialized [`SecretCiphertext`]
pub const CIPHERTEXT_LENGTH: usize = PACKED_POINT_LENGTH + SECRET_LENGTH;

const AES_KEY_LENGTH: usize = 16;

/// Mask over the first plaintext byte; these bits are zero for any secret < Q
const SENTINEL_MASK: u8 = 0xf8;

/// An encrypted secret (published alongside an output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCiphertext {
    /// Packed ephemeral public key
    pub packed_ephemeral: [u8; PACKED_POINT_LENGTH],
    /// AES-128-CBC output
    pub cipher_bytes: [u8; SECRET_LENGTH],
}

impl SecretCiphertext {
    /// `packed_ephemeral ∥ cipher_bytes`
    pub fn to_bytes(&self) -> [u8; CIPHERTEXT_LENGTH] {
        let mut out = [0u8; CIPHERTEXT_LENGTH];
        out[..PACKED_POINT_LENGTH].copy_from_slice(&self.packed_ephemeral);
        out[PACKED_POINT_LENGTH..].copy_from_slice(&self.cipher_bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CIPHERTEXT_LENGTH {
            return Err(PrivacyError::MalformedInput(format!(
                "ciphertext must be {CIPHERTEXT_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        let mut packed_ephemeral = [0u8; PACKED_POINT_LENGTH];
        let mut cipher_bytes = [0u8; SECRET_LENGTH];
        packed_ephemeral.copy_from_slice(&bytes[..PACKED_POINT_LENGTH]);
        cipher_bytes.copy_from_slice(&bytes[PACKED_POINT_LENGTH..]);

        Ok(Self {
            packed_ephemeral,
            cipher_bytes,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&decode_hex(s)?)
    }

    /// Unpack the ephemeral public key, which must be a non-identity
    /// point of the prime-order subgroup
    pub fn ephemeral_public_key(&self) -> Result<Point> {
        let point = Point::unpack(&self.packed_ephemeral)?;
        if point.is_identity() || !point.is_in_subgroup() {
            return Err(PrivacyError::FieldRange(
                "ephemeral key is not in the prime-order subgroup".into(),
            ));
        }
        Ok(point)
    }
}

/// Encrypt `secret` for the holder of `reading_public_key`
pub fn encrypt_secret<R: RngCore + CryptoRng>(
    secret: &Scalar,
    reading_public_key: &Point,
    rng: &mut R,
) -> Result<SecretCiphertext> {
    let ephemeral = random_scalar(rng);
    encrypt_secret_with_ephemeral(secret, reading_public_key, &ephemeral)
}

/// Deterministic variant of [`encrypt_secret`] with a caller-chosen ephemeral scalar
pub fn encrypt_secret_with_ephemeral(
    secret: &Scalar,
    reading_public_key: &Point,
    ephemeral: &Scalar,
) -> Result<SecretCiphertext> {
    let shared = scalar_mul(reading_public_key, ephemeral);
    let buf = seal(&shared, secret_to_bytes(secret))?;

    Ok(SecretCiphertext {
        packed_ephemeral: base_mul(ephemeral).pack(),
        cipher_bytes: buf,
    })
}

/// Recover the secret with the recipient's reading private key
pub fn decrypt_secret(ciphertext: &SecretCiphertext, reading_private_key: &Scalar) -> Result<Scalar> {
    let ephemeral = ciphertext.ephemeral_public_key()?;
    let shared = scalar_mul(&ephemeral, reading_private_key);
    let buf = open(&shared, ciphertext.cipher_bytes)?;

    if buf[0] & SENTINEL_MASK != 0 {
        return Err(PrivacyError::DecryptionIntegrity);
    }

    secret_from_biguint(&BigUint::from_bytes_be(&buf))
}

/// AES-128-CBC encrypt one secret block under the shared point
fn seal(shared: &Point, mut block: [u8; SECRET_LENGTH]) -> Result<[u8; SECRET_LENGTH]> {
    let (key, iv) = split_shared_point(shared);
    Aes128CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| PrivacyError::MalformedInput(format!("cipher init: {e}")))?
        .encrypt_padded_mut::<NoPadding>(&mut block, SECRET_LENGTH)
        .map_err(|_| PrivacyError::MalformedInput("secret block length".into()))?;
    Ok(block)
}

fn open(shared: &Point, mut block: [u8; SECRET_LENGTH]) -> Result<[u8; SECRET_LENGTH]> {
    let (key, iv) = split_shared_point(shared);
    Aes128CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| PrivacyError::MalformedInput(format!("cipher init: {e}")))?
        .decrypt_padded_mut::<NoPadding>(&mut block)
        .map_err(|_| PrivacyError::MalformedInput("cipher block length".into()))?;
    Ok(block)
}

fn split_shared_point(shared: &Point) -> ([u8; AES_KEY_LENGTH], [u8; AES_KEY_LENGTH]) {
    let packed = shared.pack();
    let mut key = [0u8; AES_KEY_LENGTH];
    let mut iv = [0u8; AES_KEY_LENGTH];
    key.copy_from_slice(&packed[..AES_KEY_LENGTH]);
    iv.copy_from_slice(&packed[AES_KEY_LENGTH..]);
    (key, iv)
}

/// 32 bytes big-endian, zero-padded on the left
fn secret_to_bytes(secret: &Scalar) -> [u8; SECRET_LENGTH] {
    let bytes = scalar_to_biguint(secret).to_bytes_be();
    let mut out = [0u8; SECRET_LENGTH];
    out[SECRET_LENGTH - bytes.len()..].copy_from_slice(&bytes);
    out
}
