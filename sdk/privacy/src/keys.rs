//! Key hierarchy
//!
//! ```text
//! wallet signature (r ∥ s ∥ v)
//!     |
//!     seed = H(r mod P, s mod P)
//!     |
//!     +---> spending key  s_sp = seed mod Q        S = s_sp·BASE8
//!     |
//!     +---> reading key   s_rd = H(seed) mod Q     R = s_rd·BASE8
//!
//! stealth (child) keys, blinding r:
//!     sender:     S' = r·S              (public key only)
//!     recipient:  s' = s_sp·r mod Q     (private key)
//!     s'·BASE8 == S'
//! ```
//!
//! Root keys are derived once per session and only ever held in memory.

use std::fmt;

use ark_ff::Zero;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::curve::{PACKED_POINT_LENGTH, Point, base_mul, decode_hex, scalar_mul};
use crate::error::{PrivacyError, Result};
use crate::field::{
    FieldElement, Scalar, random_scalar, reduce_field, reduce_field_to_sub_order,
};
use crate::hash::FieldHasher;

/// Message a wallet signs to derive its shielded keys
pub const KEY_DERIVATION_MESSAGE: &str =
    "Sign this message to derive your shielded pool keys.\n\nOnly sign this message on a trusted client.";

/// `r ∥ s ∥ v`
pub const SIGNATURE_LENGTH: usize = 65;

/// A private scalar and its public point
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    private_key: Scalar,
    public_key: Point,
}

impl Keypair {
    /// Build a keypair, rejecting the zero scalar
    pub fn from_private_key(private_key: Scalar) -> Result<Self> {
        if private_key.is_zero() {
            return Err(PrivacyError::FieldRange("private key must be non-zero".into()));
        }
        Ok(Self {
            private_key,
            public_key: base_mul(&private_key),
        })
    }

    /// Generate a random keypair
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let private_key = random_scalar(rng);
        Self {
            private_key,
            public_key: base_mul(&private_key),
        }
    }

    pub fn private_key(&self) -> &Scalar {
        &self.private_key
    }

    pub fn public_key(&self) -> &Point {
        &self.public_key
    }

    /// Recipient-side stealth derivation from the private key
    pub fn derive_child(&self, blinding: &Scalar) -> Result<Keypair> {
        Keypair::from_private_key(derive_child_private_key(&self.private_key, blinding))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// The two independent root keypairs of a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootKeys {
    /// Owns notes: stealth keys and nullifiers derive from it
    pub spending: Keypair,
    /// Decrypts the blinding secrets senders deliver
    pub reading: Keypair,
}

impl RootKeys {
    /// Derive root keys from a signature over [`KEY_DERIVATION_MESSAGE`]
    pub fn from_signature<H: FieldHasher>(signature: &[u8], hasher: &H) -> Result<Self> {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(PrivacyError::MalformedSignature(format!(
                "expected {SIGNATURE_LENGTH} bytes, got {}",
                signature.len()
            )));
        }

        let r = reduce_field(&BigUint::from_bytes_be(&signature[..32]));
        let s = reduce_field(&BigUint::from_bytes_be(&signature[32..64]));
        let seed = hasher.hash2(r, s)?;

        Self::from_seed(seed, hasher)
    }

    /// Same as [`RootKeys::from_signature`] for a hex signature (`0x` optional)
    pub fn from_signature_hex<H: FieldHasher>(signature: &str, hasher: &H) -> Result<Self> {
        let bytes = decode_hex(signature)
            .map_err(|e| PrivacyError::MalformedSignature(e.to_string()))?;
        Self::from_signature(&bytes, hasher)
    }

    /// Derive both keypairs from a seed field element
    pub fn from_seed<H: FieldHasher>(seed: FieldElement, hasher: &H) -> Result<Self> {
        let spending_key = reduce_field_to_sub_order(&seed);
        let reading_key = reduce_field_to_sub_order(&hasher.hash(&[seed])?);

        if spending_key.is_zero() || reading_key.is_zero() {
            return Err(PrivacyError::MalformedSignature(
                "seed reduces to a zero key".into(),
            ));
        }

        log::debug!("derived root keys from seed");

        Ok(Self {
            spending: Keypair::from_private_key(spending_key)?,
            reading: Keypair::from_private_key(reading_key)?,
        })
    }

    /// Public half, shareable with senders
    pub fn address(&self) -> ShieldedAddress {
        ShieldedAddress {
            spending: *self.spending.public_key(),
            reading: *self.reading.public_key(),
        }
    }
}

/// Sender-side stealth derivation: `S' = r·S`
pub fn derive_child_public_key(root_public_key: &Point, blinding: &Scalar) -> Point {
    scalar_mul(root_public_key, blinding)
}

/// Recipient-side stealth derivation: `s' = s·r mod Q`
pub fn derive_child_private_key(root_private_key: &Scalar, blinding: &Scalar) -> Scalar {
    *root_private_key * blinding
}

/// Recompute both derivation paths and compare every coordinate.
/// Pure predicate, no side effects.
pub fn is_child_key_valid(child_public_key: &Point, root: &Keypair, blinding: &Scalar) -> bool {
    let from_public = derive_child_public_key(root.public_key(), blinding);
    let from_private = base_mul(&derive_child_private_key(root.private_key(), blinding));

    from_public.x() == child_public_key.x()
        && from_public.y() == child_public_key.y()
        && from_private.x() == child_public_key.x()
        && from_private.y() == child_public_key.y()
}

/// [`is_child_key_valid`] as a `Result`
pub fn check_child_key(child_public_key: &Point, root: &Keypair, blinding: &Scalar) -> Result<()> {
    if is_child_key_valid(child_public_key, root, blinding) {
        Ok(())
    } else {
        Err(PrivacyError::ChildKeyMismatch)
    }
}

/// Public spending and reading keys of a recipient
///
/// Serialized as the 64-byte hex form, so deserializing runs the same
/// subgroup checks as [`ShieldedAddress::from_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShieldedAddress {
    pub spending: Point,
    pub reading: Point,
}

impl ShieldedAddress {
    pub const LENGTH: usize = 2 * PACKED_POINT_LENGTH;

    /// `pack(spending) ∥ pack(reading)`
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut out = [0u8; Self::LENGTH];
        out[..PACKED_POINT_LENGTH].copy_from_slice(&self.spending.pack());
        out[PACKED_POINT_LENGTH..].copy_from_slice(&self.reading.pack());
        out
    }

    /// Parse a packed address; both keys must lie in the prime subgroup
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LENGTH {
            return Err(PrivacyError::MalformedInput(format!(
                "address must be {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }

        let spending = Point::unpack(&bytes[..PACKED_POINT_LENGTH])?;
        let reading = Point::unpack(&bytes[PACKED_POINT_LENGTH..])?;
        for key in [&spending, &reading] {
            if key.is_identity() || !key.is_in_subgroup() {
                return Err(PrivacyError::FieldRange(
                    "address key outside the prime subgroup".into(),
                ));
            }
        }

        Ok(Self { spending, reading })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&decode_hex(s)?)
    }
}

impl TryFrom<String> for ShieldedAddress {
    type Error = PrivacyError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<ShieldedAddress> for String {
    fn from(address: ShieldedAddress) -> Self {
        address.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{reduce_sub_order, scalar_to_biguint};
    use crate::hash::CircomPoseidon;
    use ark_ff::One;
    use crate::test_rng;

    fn signature(fill: u8) -> Vec<u8> {
        let mut sig = vec![fill; SIGNATURE_LENGTH];
        sig[64] = 27;
        sig
    }

    #[test]
    fn test_signature_derivation_is_deterministic() {
        let hasher = CircomPoseidon::new();
        let keys1 = RootKeys::from_signature(&signature(7), &hasher).unwrap();
        let keys2 = RootKeys::from_signature(&signature(7), &hasher).unwrap();
        assert_eq!(keys1, keys2);

        let other = RootKeys::from_signature(&signature(8), &hasher).unwrap();
        assert_ne!(keys1.spending.public_key(), other.spending.public_key());
    }

    #[test]
    fn test_spending_and_reading_keys_differ() {
        let hasher = CircomPoseidon::new();
        let keys = RootKeys::from_signature(&signature(1), &hasher).unwrap();
        assert_ne!(keys.spending.private_key(), keys.reading.private_key());
    }

    #[test]
    fn test_recovery_byte_is_ignored() {
        let hasher = CircomPoseidon::new();
        let mut sig = signature(3);
        let keys1 = RootKeys::from_signature(&sig, &hasher).unwrap();
        sig[64] = 28;
        let keys2 = RootKeys::from_signature(&sig, &hasher).unwrap();
        assert_eq!(keys1, keys2);
    }

    #[test]
    fn test_wrong_signature_length() {
        let hasher = CircomPoseidon::new();
        let result = RootKeys::from_signature(&[1u8; 64], &hasher);
        assert!(matches!(result, Err(PrivacyError::MalformedSignature(_))));

        let result = RootKeys::from_signature_hex("0x1234", &hasher);
        assert!(matches!(result, Err(PrivacyError::MalformedSignature(_))));
    }

    #[test]
    fn test_hex_signature_matches_bytes() {
        let hasher = CircomPoseidon::new();
        let sig = signature(9);
        let from_bytes = RootKeys::from_signature(&sig, &hasher).unwrap();
        let from_hex =
            RootKeys::from_signature_hex(&format!("0x{}", hex::encode(&sig)), &hasher).unwrap();
        assert_eq!(from_bytes, from_hex);
    }

    #[test]
    fn test_zero_private_key_rejected() {
        assert!(Keypair::from_private_key(Scalar::zero()).is_err());
    }

    #[test]
    fn test_stealth_homomorphism() {
        let mut rng = test_rng();
        let root = Keypair::random(&mut rng);
        let blinding = random_scalar(&mut rng);

        let child_public = derive_child_public_key(root.public_key(), &blinding);
        let child = root.derive_child(&blinding).unwrap();

        assert_eq!(child.public_key(), &child_public);
        assert!(is_child_key_valid(&child_public, &root, &blinding));
        assert!(check_child_key(&child_public, &root, &blinding).is_ok());

        let expected = reduce_sub_order(
            &(scalar_to_biguint(root.private_key()) * scalar_to_biguint(&blinding)),
        );
        assert_eq!(child.private_key(), &expected);
    }

    #[test]
    fn test_child_key_mismatch() {
        let mut rng = test_rng();
        let root = Keypair::random(&mut rng);
        let blinding = random_scalar(&mut rng);
        let other_blinding = random_scalar(&mut rng);

        let child_public = derive_child_public_key(root.public_key(), &blinding);
        assert!(!is_child_key_valid(&child_public, &root, &other_blinding));
        assert_eq!(
            check_child_key(&child_public, &root, &other_blinding),
            Err(PrivacyError::ChildKeyMismatch)
        );
    }

    #[test]
    fn test_address_roundtrip() {
        let hasher = CircomPoseidon::new();
        let keys = RootKeys::from_signature(&signature(5), &hasher).unwrap();
        let address = keys.address();

        let parsed = ShieldedAddress::from_hex(&address.to_hex()).unwrap();
        assert_eq!(parsed, address);
        assert!(ShieldedAddress::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_address_rejects_identity() {
        let identity = Point::identity().pack();
        let mut bytes = [0u8; ShieldedAddress::LENGTH];
        bytes[..32].copy_from_slice(&identity);
        bytes[32..].copy_from_slice(&identity);
        assert!(matches!(
            ShieldedAddress::from_bytes(&bytes),
            Err(PrivacyError::FieldRange(_))
        ));
    }

    #[test]
    fn test_address_serde_checks_subgroup() {
        let hasher = CircomPoseidon::new();
        let address = RootKeys::from_signature(&signature(6), &hasher)
            .unwrap()
            .address();

        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address.to_hex()));
        assert_eq!(serde_json::from_str::<ShieldedAddress>(&json).unwrap(), address);

        // (0, -1) is on the curve but has order 2
        let torsion = Point::new(FieldElement::zero(), -FieldElement::one()).unwrap();
        let mut bytes = address.to_bytes();
        bytes[PACKED_POINT_LENGTH..].copy_from_slice(&torsion.pack());
        let json = format!("\"{}\"", hex::encode(bytes));
        assert!(serde_json::from_str::<ShieldedAddress>(&json).is_err());

        let identity = format!("\"{}\"", hex::encode([Point::identity().pack(); 2].concat()));
        assert!(serde_json::from_str::<ShieldedAddress>(&identity).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let mut rng = test_rng();
        let keypair = Keypair::random(&mut rng);
        let rendered = format!("{keypair:?}");
        assert!(rendered.contains("[REDACTED]"));
    }
}
