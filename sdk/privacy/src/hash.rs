//! Arithmetic hash interface
//!
//! The tree, key derivation and commitments only need a collision-resistant
//! hash over field elements with arity 1, 2 and 3. It is injected through
//! [`FieldHasher`] so tests can swap in a transparent placeholder while
//! production code uses circom-compatible Poseidon (bit-exact with circomlib's
//! `Poseidon(n)` template).

use light_poseidon::{Poseidon, PoseidonHasher};

use crate::error::{PrivacyError, Result};
use crate::field::FieldElement;

/// Hash over field elements
pub trait FieldHasher {
    fn hash(&self, inputs: &[FieldElement]) -> Result<FieldElement>;

    /// Binary node hash (inner tree levels)
    fn hash2(&self, left: FieldElement, right: FieldElement) -> Result<FieldElement> {
        self.hash(&[left, right])
    }

    /// Ternary hash (triad leaves)
    fn hash3(&self, a: FieldElement, b: FieldElement, c: FieldElement) -> Result<FieldElement> {
        self.hash(&[a, b, c])
    }
}

impl<H: FieldHasher + ?Sized> FieldHasher for &H {
    fn hash(&self, inputs: &[FieldElement]) -> Result<FieldElement> {
        (**self).hash(inputs)
    }
}

/// Poseidon over BN254 with circom parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct CircomPoseidon;

impl CircomPoseidon {
    pub fn new() -> Self {
        Self
    }
}

impl FieldHasher for CircomPoseidon {
    fn hash(&self, inputs: &[FieldElement]) -> Result<FieldElement> {
        let mut poseidon = Poseidon::<FieldElement>::new_circom(inputs.len())
            .map_err(|e| PrivacyError::Hash(e.to_string()))?;
        poseidon
            .hash(inputs)
            .map_err(|e| PrivacyError::Hash(e.to_string()))
    }
}
