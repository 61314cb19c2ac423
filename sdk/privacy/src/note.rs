//! Shielded outputs
//!
//! ```text
//! Sender (knows recipient address S, R):
//!     r  = random blinding scalar
//!     ct = encrypt(r, R)
//!     S' = r·S
//!     commitment = H(S'.x, S'.y)       -> inserted into the tree
//!
//! Recipient (knows s_sp, s_rd):
//!     r  = decrypt(ct, s_rd)
//!     s' = s_sp·r                      -> stealth private key
//!     commitment = H((s'·BASE8).x, (s'·BASE8).y)
//!     nullifier  = H(s', leaf_index)   -> published on spend
//! ```

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::cipher::{SecretCiphertext, decrypt_secret, encrypt_secret};
use crate::curve::Point;
use crate::error::Result;
use crate::field::{
    FieldElement, Scalar, field_to_bytes_le, random_scalar, scalar_to_field, serde_field,
};
use crate::hash::FieldHasher;
use crate::keys::{Keypair, RootKeys, ShieldedAddress, check_child_key, derive_child_public_key};

/// Leaf commitment of a stealth public key
pub fn note_commitment<H: FieldHasher>(
    stealth_public_key: &Point,
    hasher: &H,
) -> Result<FieldElement> {
    hasher.hash2(stealth_public_key.x(), stealth_public_key.y())
}

/// What a sender publishes for one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldedOutput {
    #[serde(with = "serde_field")]
    pub commitment: FieldElement,
    pub ciphertext: SecretCiphertext,
    pub stealth_public_key: Point,
}

/// Build an output paying `address`
pub fn create_output<H: FieldHasher, R: RngCore + CryptoRng>(
    address: &ShieldedAddress,
    hasher: &H,
    rng: &mut R,
) -> Result<ShieldedOutput> {
    let blinding = random_scalar(rng);
    let ciphertext = encrypt_secret(&blinding, &address.reading, rng)?;
    let stealth_public_key = derive_child_public_key(&address.spending, &blinding);
    let commitment = note_commitment(&stealth_public_key, hasher)?;

    Ok(ShieldedOutput {
        commitment,
        ciphertext,
        stealth_public_key,
    })
}

/// An output recovered by its recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredOutput {
    pub blinding: Scalar,
    pub stealth_keypair: Keypair,
    pub commitment: FieldElement,
}

impl RecoveredOutput {
    /// Nullifier for this output once it sits at `leaf_index`
    pub fn nullifier<H: FieldHasher>(&self, leaf_index: u64, hasher: &H) -> Result<Nullifier> {
        nullifier(self.stealth_keypair.private_key(), leaf_index, hasher)
    }
}

/// Decrypt an output's blinding secret and rebuild its stealth keypair
pub fn recover_output<H: FieldHasher>(
    ciphertext: &SecretCiphertext,
    root_keys: &RootKeys,
    hasher: &H,
) -> Result<RecoveredOutput> {
    let blinding = decrypt_secret(ciphertext, root_keys.reading.private_key())?;
    let stealth_keypair = root_keys.spending.derive_child(&blinding)?;
    check_child_key(stealth_keypair.public_key(), &root_keys.spending, &blinding)?;

    let commitment = note_commitment(stealth_keypair.public_key(), hasher)?;

    Ok(RecoveredOutput {
        blinding,
        stealth_keypair,
        commitment,
    })
}

/// A nullifier - unique tag for a spent output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nullifier(#[serde(with = "serde_field")] pub FieldElement);

impl Nullifier {
    pub fn as_field(&self) -> &FieldElement {
        &self.0
    }

    /// 32-byte little-endian encoding
    pub fn to_bytes(&self) -> [u8; 32] {
        field_to_bytes_le(&self.0)
    }
}

/// `H(stealth_private_key, leaf_index)`
pub fn nullifier<H: FieldHasher>(
    stealth_private_key: &Scalar,
    leaf_index: u64,
    hasher: &H,
) -> Result<Nullifier> {
    hasher
        .hash2(scalar_to_field(stealth_private_key), FieldElement::from(leaf_index))
        .map(Nullifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::CircomPoseidon;
    use crate::test_rng;

    fn root_keys() -> RootKeys {
        RootKeys::from_seed(FieldElement::from(42u64), &CircomPoseidon::new()).unwrap()
    }

    #[test]
    fn test_output_roundtrip() {
        let mut rng = test_rng();
        let hasher = CircomPoseidon::new();
        let keys = root_keys();

        let output = create_output(&keys.address(), &hasher, &mut rng).unwrap();
        let recovered = recover_output(&output.ciphertext, &keys, &hasher).unwrap();

        assert_eq!(recovered.commitment, output.commitment);
        assert_eq!(recovered.stealth_keypair.public_key(), &output.stealth_public_key);
    }

    #[test]
    fn test_outputs_are_unlinkable() {
        let mut rng = test_rng();
        let hasher = CircomPoseidon::new();
        let address = root_keys().address();

        let a = create_output(&address, &hasher, &mut rng).unwrap();
        let b = create_output(&address, &hasher, &mut rng).unwrap();
        assert_ne!(a.commitment, b.commitment);
        assert_ne!(a.stealth_public_key, b.stealth_public_key);
    }

    #[test]
    fn test_nullifier_depends_on_position() {
        let mut rng = test_rng();
        let hasher = CircomPoseidon::new();
        let key = random_scalar(&mut rng);

        let n0 = nullifier(&key, 0, &hasher).unwrap();
        let n1 = nullifier(&key, 1, &hasher).unwrap();
        assert_ne!(n0, n1);
        assert_eq!(n0, nullifier(&key, 0, &hasher).unwrap());
    }
}
