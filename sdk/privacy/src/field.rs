//! Arithmetic over the two moduli used by the pool
//!
//! ```text
//! P = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//!     (BN254 scalar field, the circuit's native field, Baby Jubjub base field)
//! Q = 2736030358979909402780800718157159386076813972158567259200215660948447373041
//!     (order of the Baby Jubjub prime subgroup generated by BASE8)
//! ```
//!
//! Field elements live in `Fq` (mod P), private keys and blinding factors in
//! `Fr` (mod Q). Every conversion from untrusted data goes through a
//! range-checked constructor in this module.

use std::sync::LazyLock;

use ark_ed_on_bn254::{Fq, Fr};
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use crate::error::{PrivacyError, Result};

/// Element of the outer field (mod P)
pub type FieldElement = Fq;

/// Element of the subgroup-order field (mod Q)
pub type Scalar = Fr;

/// The outer field prime P
pub static FIELD_MODULUS: LazyLock<BigUint> = LazyLock::new(|| BigUint::from(Fq::MODULUS));

/// The curve subgroup order Q
pub static SUB_ORDER: LazyLock<BigUint> = LazyLock::new(|| BigUint::from(Fr::MODULUS));

/// Smallest scalar `random_scalar` will return
pub const MIN_SCALAR: u64 = 1;

/// `x mod P`
pub fn reduce_field(x: &BigUint) -> FieldElement {
    Fq::from(x % &*FIELD_MODULUS)
}

/// `x mod Q`
pub fn reduce_sub_order(x: &BigUint) -> Scalar {
    Fr::from(x % &*SUB_ORDER)
}

/// Reduce a field element into the subgroup-order field
pub fn reduce_field_to_sub_order(f: &FieldElement) -> Scalar {
    reduce_sub_order(&field_to_biguint(f))
}

/// Lift a scalar into the outer field. Always exact since Q < P.
pub fn scalar_to_field(s: &Scalar) -> FieldElement {
    Fq::from(scalar_to_biguint(s))
}

pub fn field_to_biguint(f: &FieldElement) -> BigUint {
    BigUint::from(f.into_bigint())
}

pub fn scalar_to_biguint(s: &Scalar) -> BigUint {
    BigUint::from(s.into_bigint())
}

/// Range-checked conversion: `x < P`
pub fn field_from_biguint(x: &BigUint) -> Result<FieldElement> {
    if x >= &*FIELD_MODULUS {
        return Err(PrivacyError::FieldRange(format!(
            "{x} is not below the field modulus"
        )));
    }
    Ok(Fq::from(x.clone()))
}

/// Range-checked conversion: `0 < x < Q`
pub fn scalar_from_biguint(x: &BigUint) -> Result<Scalar> {
    if x.is_zero() {
        return Err(PrivacyError::FieldRange("scalar must be non-zero".into()));
    }
    if x >= &*SUB_ORDER {
        return Err(PrivacyError::FieldRange(format!(
            "{x} is not below the subgroup order"
        )));
    }
    Ok(Fr::from(x.clone()))
}

/// Range-checked conversion for delivered secrets: `0 ≤ x < Q`
pub fn secret_from_biguint(x: &BigUint) -> Result<Scalar> {
    if x.is_zero() {
        return Ok(Fr::zero());
    }
    scalar_from_biguint(x)
}

fn parse_decimal(s: &str) -> Result<BigUint> {
    s.trim()
        .parse::<BigUint>()
        .map_err(|e| PrivacyError::MalformedInput(format!("invalid decimal '{s}': {e}")))
}

pub fn field_from_decimal(s: &str) -> Result<FieldElement> {
    field_from_biguint(&parse_decimal(s)?)
}

pub fn scalar_from_decimal(s: &str) -> Result<Scalar> {
    scalar_from_biguint(&parse_decimal(s)?)
}

pub fn secret_from_decimal(s: &str) -> Result<Scalar> {
    secret_from_biguint(&parse_decimal(s)?)
}

pub fn field_to_decimal(f: &FieldElement) -> String {
    field_to_biguint(f).to_string()
}

pub fn scalar_to_decimal(s: &Scalar) -> String {
    scalar_to_biguint(s).to_string()
}

pub fn field_to_bytes_le(f: &FieldElement) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

pub fn field_from_bytes_le(bytes: &[u8; 32]) -> Result<FieldElement> {
    field_from_biguint(&BigUint::from_bytes_le(bytes))
}

/// Uniform scalar in `[MIN_SCALAR, Q)`
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    sample_scalar(rng, &BigUint::from(MIN_SCALAR))
}

/// Uniform scalar in `[min, Q)`. Fails when the range is empty.
pub fn random_scalar_above<R: RngCore + CryptoRng>(rng: &mut R, min: &BigUint) -> Result<Scalar> {
    if min >= &*SUB_ORDER {
        return Err(PrivacyError::FieldRange(format!(
            "minimum {min} leaves no scalars below the subgroup order"
        )));
    }
    Ok(sample_scalar(rng, min))
}

/// Rejection sampling: draw 256 bits, keep only the bit length of Q, and retry
/// until the candidate lands in range. Never reduces, so there is no modulo bias.
fn sample_scalar<R: RngCore + CryptoRng>(rng: &mut R, min: &BigUint) -> Scalar {
    let top_bits = (SUB_ORDER.bits() - 248) as u32;
    let top_mask = ((1u16 << top_bits) - 1) as u8;

    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        bytes[31] &= top_mask;

        let candidate = BigUint::from_bytes_le(&bytes);
        if &candidate >= min && candidate < *SUB_ORDER {
            return Fr::from(candidate);
        }
    }
}

/// Serde support for field elements.
///
/// Human-readable formats (JSON) get circom-style decimal strings, binary
/// formats get the 32-byte little-endian encoding. Both paths range-check on
/// the way in.
pub mod serde_field {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

    use super::{
        FieldElement, field_from_bytes_le, field_from_decimal, field_to_bytes_le,
        field_to_decimal,
    };

    pub(crate) struct Repr(pub FieldElement);

    impl Serialize for Repr {
        fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
            if s.is_human_readable() {
                s.serialize_str(&field_to_decimal(&self.0))
            } else {
                field_to_bytes_le(&self.0).serialize(s)
            }
        }
    }

    impl<'de> Deserialize<'de> for Repr {
        fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
            let value = if d.is_human_readable() {
                let s = String::deserialize(d)?;
                field_from_decimal(&s)
            } else {
                let bytes = <[u8; 32]>::deserialize(d)?;
                field_from_bytes_le(&bytes)
            };
            value.map(Repr).map_err(D::Error::custom)
        }
    }

    pub fn serialize<S: Serializer>(f: &FieldElement, s: S) -> std::result::Result<S::Ok, S::Error> {
        Repr(*f).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<FieldElement, D::Error> {
        Repr::deserialize(d).map(|r| r.0)
    }

    pub mod vec {
        use super::*;

        pub fn serialize<S: Serializer>(
            v: &[FieldElement],
            s: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            s.collect_seq(v.iter().map(|f| Repr(*f)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> std::result::Result<Vec<FieldElement>, D::Error> {
            let reprs = Vec::<Repr>::deserialize(d)?;
            Ok(reprs.into_iter().map(|r| r.0).collect())
        }
    }

    pub mod nested {
        use super::*;

        struct Level<'a>(&'a [FieldElement]);

        impl Serialize for Level<'_> {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.collect_seq(self.0.iter().map(|f| Repr(*f)))
            }
        }

        pub fn serialize<S: Serializer>(
            v: &[Vec<FieldElement>],
            s: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            s.collect_seq(v.iter().map(|level| Level(level)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> std::result::Result<Vec<Vec<FieldElement>>, D::Error> {
            let levels = Vec::<Vec<Repr>>::deserialize(d)?;
            Ok(levels
                .into_iter()
                .map(|level| level.into_iter().map(|r| r.0).collect())
                .collect())
        }
    }

    pub mod pair {
        use super::*;

        pub fn serialize<S: Serializer>(
            v: &[FieldElement; 2],
            s: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            [Repr(v[0]), Repr(v[1])].serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> std::result::Result<[FieldElement; 2], D::Error> {
            let [a, b] = <[Repr; 2]>::deserialize(d)?;
            Ok([a.0, b.0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::One;
    use crate::test_rng;

    #[test]
    fn test_moduli() {
        assert_eq!(
            FIELD_MODULUS.to_string(),
            "21888242871839275222246405745257275088548364400416034343698204186575808495617"
        );
        assert_eq!(
            SUB_ORDER.to_string(),
            "2736030358979909402780800718157159386076813972158567259200215660948447373041"
        );
    }

    #[test]
    fn test_reductions() {
        let p_plus_five = &*FIELD_MODULUS + 5u32;
        assert_eq!(reduce_field(&p_plus_five), Fq::from(5u64));

        let q_plus_seven = &*SUB_ORDER + 7u32;
        assert_eq!(reduce_sub_order(&q_plus_seven), Fr::from(7u64));

        let q_as_field = field_from_biguint(&SUB_ORDER).unwrap();
        assert!(reduce_field_to_sub_order(&q_as_field).is_zero());
    }

    #[test]
    fn test_range_checks() {
        assert!(matches!(
            field_from_biguint(&FIELD_MODULUS),
            Err(PrivacyError::FieldRange(_))
        ));
        assert!(matches!(
            scalar_from_biguint(&SUB_ORDER),
            Err(PrivacyError::FieldRange(_))
        ));
        assert!(matches!(
            scalar_from_biguint(&BigUint::zero()),
            Err(PrivacyError::FieldRange(_))
        ));
        assert_eq!(scalar_from_decimal("1").unwrap(), Fr::one());
        assert!(matches!(
            scalar_from_decimal("abc"),
            Err(PrivacyError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_secret_range_includes_zero() {
        assert!(secret_from_decimal("0").unwrap().is_zero());
        assert!(secret_from_decimal("00").unwrap().is_zero());
        assert!(secret_from_decimal(" 000 ").unwrap().is_zero());
        assert_eq!(secret_from_decimal("12").unwrap(), Fr::from(12u64));
        assert!(matches!(
            secret_from_biguint(&SUB_ORDER),
            Err(PrivacyError::FieldRange(_))
        ));
        assert!(secret_from_decimal("-1").is_err());
    }

    #[test]
    fn test_decimal_and_bytes_roundtrip() {
        let f = Fq::from(123456789u64);
        assert_eq!(field_to_decimal(&f), "123456789");
        assert_eq!(field_from_decimal("123456789").unwrap(), f);
        assert_eq!(field_to_decimal(&Fq::zero()), "0");

        let bytes = field_to_bytes_le(&f);
        assert_eq!(field_from_bytes_le(&bytes).unwrap(), f);
        assert!(field_from_bytes_le(&[0xff; 32]).is_err());
    }

    #[test]
    fn test_random_scalar_in_range() {
        let mut rng = test_rng();
        for _ in 0..64 {
            let s = random_scalar(&mut rng);
            assert!(!s.is_zero());
            assert!(scalar_to_biguint(&s) < *SUB_ORDER);
        }
    }

    #[test]
    fn test_random_scalar_above_threshold() {
        let mut rng = test_rng();
        let min = &*SUB_ORDER >> 1u32;
        for _ in 0..32 {
            let s = random_scalar_above(&mut rng, &min).unwrap();
            assert!(scalar_to_biguint(&s) >= min);
        }
        assert!(random_scalar_above(&mut rng, &SUB_ORDER).is_err());
    }

    #[test]
    fn test_scalar_to_field_is_exact() {
        let s = Fr::from(42u64);
        assert_eq!(scalar_to_field(&s), Fq::from(42u64));
        assert_eq!(reduce_field_to_sub_order(&scalar_to_field(&s)), s);
    }
}
