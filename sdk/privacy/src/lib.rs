//! Shieldpool Privacy SDK
//!
//! Cryptographic core of a shielded-value pool, bit-compatible with circom
//! circuits (Baby Jubjub, circom Poseidon).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Shielded Output                           │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │  RootKeys    │   │  SecretCiphertext│   │   Commitment     │  │
//! │  │  (keys)      │──▶│  (cipher)        │   │   H(S'.x, S'.y)  │  │
//! │  └──────────────┘   └──────────────────┘   └────────┬─────────┘  │
//! │         │ stealth S' = r·S                          ▼            │
//! │         └──────────────────────────────▶  TriadMerkleTree        │
//! │                                           (merkle) ─▶ proofs     │
//! └──────────────────────────────────────────────────────────────────┘
//!            field / curve / hash underneath everything
//! ```

pub mod cipher;
pub mod curve;
pub mod error;
pub mod field;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod note;

pub use cipher::{
    CIPHERTEXT_LENGTH, SecretCiphertext, decrypt_secret, encrypt_secret,
    encrypt_secret_with_ephemeral,
};
pub use curve::{
    BASE8, BabyJubjubConfig, EdwardsAffine, PACKED_POINT_LENGTH, Point, base_mul, pack_point,
    scalar_mul, unpack_point,
};
pub use error::{PrivacyError, Result};
pub use field::{FieldElement, Scalar, random_scalar, reduce_field, reduce_sub_order};
pub use hash::{CircomPoseidon, FieldHasher};
pub use keys::{
    KEY_DERIVATION_MESSAGE, Keypair, RootKeys, SIGNATURE_LENGTH, ShieldedAddress,
    check_child_key, derive_child_private_key, derive_child_public_key, is_child_key_valid,
};
pub use merkle::{
    CircuitInputs, MAX_TREE_DEPTH, MerkleProof, PathElement, TreeParams, TriadMerkleTree,
    verify_merkle_path,
};
pub use note::{
    Nullifier, RecoveredOutput, ShieldedOutput, create_output, note_commitment, nullifier,
    recover_output,
};

/// Deterministic test RNG: same seed as `ark_std::test_rng()`, but returned
/// as a concrete `StdRng` so it satisfies the `CryptoRng` bounds.
#[cfg(test)]
pub(crate) fn test_rng() -> rand::rngs::StdRng {
    use rand::SeedableRng;
    let seed = [
        1, 0, 0, 0, 23, 0, 0, 0, 200, 1, 0, 0, 210, 30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0,
    ];
    rand::rngs::StdRng::from_seed(seed)
}
