//! Baby Jubjub point arithmetic
//!
//! Twisted Edwards curve over the BN254 scalar field, in the circomlib model:
//!
//! ```text
//! A·x² + y² = 1 + D·x²·y²      A = 168700, D = 168696
//! ```
//!
//! `BASE8` generates the prime-order subgroup of order Q. Point packing
//! follows circomlib so packed keys match what the circuit and the on-chain
//! verifier expect: `y` little-endian with the sign of `x` in the top bit.

use std::fmt;
use std::sync::LazyLock;

use ark_ec::twisted_edwards::{Affine, MontCurveConfig, Projective, TECurveConfig};
use ark_ec::{CurveConfig, CurveGroup};
use ark_ff::{MontFp, Zero};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};
use crate::field::{
    FIELD_MODULUS, FieldElement, Scalar, field_from_bytes_le, field_from_decimal,
    field_to_biguint, field_to_bytes_le, field_to_decimal, serde_field,
};

/// Edwards `a` coefficient
pub const COEFF_A: FieldElement = MontFp!("168700");

/// Edwards `d` coefficient
pub const COEFF_D: FieldElement = MontFp!("168696");

/// Generator of the prime-order subgroup
pub const BASE8: Point = Point(EdwardsAffine::new_unchecked(
    MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553"),
    MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203"),
));

/// Size of a packed point
pub const PACKED_POINT_LENGTH: usize = 32;

/// (P - 1) / 2: coordinates above this are "negative"
static HALF_FIELD: LazyLock<BigUint> = LazyLock::new(|| (&*FIELD_MODULUS - 1u32) >> 1u32);

/// Baby Jubjub with circomlib's coefficients. The reduced `a = 1` form
/// shipped by `ark-ed-on-bn254` packs to different coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BabyJubjubConfig;

pub type EdwardsAffine = Affine<BabyJubjubConfig>;
pub type EdwardsProjective = Projective<BabyJubjubConfig>;

impl CurveConfig for BabyJubjubConfig {
    type BaseField = FieldElement;
    type ScalarField = Scalar;

    const COFACTOR: &'static [u64] = &[8];

    /// 8⁻¹ mod Q
    const COFACTOR_INV: Scalar = MontFp!(
        "2394026564107420727433200628387514462817212225638746351800188703329891451411"
    );
}

impl TECurveConfig for BabyJubjubConfig {
    const COEFF_A: FieldElement = COEFF_A;
    const COEFF_D: FieldElement = COEFF_D;
    const GENERATOR: EdwardsAffine = BASE8.0;

    type MontCurveConfig = BabyJubjubConfig;
}

/// Montgomery form `B·v² = u³ + A·u² + u` with `A = 168698`, `B = 1`
impl MontCurveConfig for BabyJubjubConfig {
    const COEFF_A: FieldElement = MontFp!("168698");
    const COEFF_B: FieldElement = MontFp!("1");

    type TECurveConfig = BabyJubjubConfig;
}

/// An affine point on Baby Jubjub
///
/// Only constructible through validating constructors, so a `Point` always
/// has canonical coordinates and lies on the curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PointRepr", into = "PointRepr")]
pub struct Point(EdwardsAffine);

#[derive(Serialize, Deserialize)]
struct PointRepr {
    #[serde(with = "serde_field")]
    x: FieldElement,
    #[serde(with = "serde_field")]
    y: FieldElement,
}

impl TryFrom<PointRepr> for Point {
    type Error = PrivacyError;

    fn try_from(repr: PointRepr) -> Result<Self> {
        Point::new(repr.x, repr.y)
    }
}

impl From<Point> for PointRepr {
    fn from(p: Point) -> Self {
        PointRepr { x: p.x(), y: p.y() }
    }
}

impl From<EdwardsProjective> for Point {
    fn from(p: EdwardsProjective) -> Self {
        Point(p.into_affine())
    }
}

impl Point {
    /// Create a point, rejecting coordinates that are not on the curve
    pub fn new(x: FieldElement, y: FieldElement) -> Result<Self> {
        let point = EdwardsAffine::new_unchecked(x, y);
        if !point.is_on_curve() {
            return Err(PrivacyError::FieldRange(format!(
                "({}, {}) is not on the curve",
                field_to_decimal(&x),
                field_to_decimal(&y)
            )));
        }
        Ok(Point(point))
    }

    /// Create a point from decimal coordinates, range-checking both against P
    pub fn from_decimal(x: &str, y: &str) -> Result<Self> {
        Point::new(field_from_decimal(x)?, field_from_decimal(y)?)
    }

    /// The neutral element (0, 1)
    pub fn identity() -> Self {
        Point(EdwardsAffine::zero())
    }

    pub fn x(&self) -> FieldElement {
        self.0.x
    }

    pub fn y(&self) -> FieldElement {
        self.0.y
    }

    pub fn as_affine(&self) -> &EdwardsAffine {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_on_curve(&self) -> bool {
        self.0.is_on_curve()
    }

    /// Whether `Q·self` is the identity
    pub fn is_in_subgroup(&self) -> bool {
        self.0.is_in_correct_subgroup_assuming_on_curve()
    }

    pub fn add(&self, other: &Point) -> Point {
        (self.0 + other.0).into()
    }

    pub fn double(&self) -> Point {
        self.add(self)
    }

    /// Compress into 32 bytes: `y` little-endian, sign of `x` in bit 255
    pub fn pack(&self) -> [u8; PACKED_POINT_LENGTH] {
        let mut out = field_to_bytes_le(&self.0.y);
        if field_to_biguint(&self.0.x) > *HALF_FIELD {
            out[31] |= 0x80;
        }
        out
    }

    /// Inverse of [`Point::pack`]
    ///
    /// Rejects the sign bit on a zero `x`, which has no negative encoding.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut y_bytes: [u8; PACKED_POINT_LENGTH] = bytes.try_into().map_err(|_| {
            PrivacyError::MalformedInput(format!(
                "packed point must be {PACKED_POINT_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;

        let negative = y_bytes[31] & 0x80 != 0;
        y_bytes[31] &= 0x7f;
        let y = field_from_bytes_le(&y_bytes)?;

        let (small, large) = EdwardsAffine::get_xs_from_y_unchecked(y)
            .ok_or_else(|| PrivacyError::FieldRange("packed point is not on the curve".into()))?;
        if negative && small.is_zero() {
            return Err(PrivacyError::FieldRange(
                "sign bit set on a point with x = 0".into(),
            ));
        }
        let x = if negative { large } else { small };

        Ok(Point(EdwardsAffine::new_unchecked(x, y)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.pack())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        Point::unpack(&bytes)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point")
            .field("x", &field_to_decimal(&self.x()))
            .field("y", &field_to_decimal(&self.y()))
            .finish()
    }
}

/// `scalar · point`
pub fn scalar_mul(point: &Point, scalar: &Scalar) -> Point {
    (point.0 * scalar).into()
}

/// `scalar · BASE8`
pub fn base_mul(scalar: &Scalar) -> Point {
    scalar_mul(&BASE8, scalar)
}

pub fn pack_point(point: &Point) -> [u8; PACKED_POINT_LENGTH] {
    point.pack()
}

pub fn unpack_point(bytes: &[u8]) -> Result<Point> {
    Point::unpack(bytes)
}

/// Hex decoding for boundary values, tolerating a `0x` prefix
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| PrivacyError::MalformedInput(format!("invalid hex: {e}")))
}
