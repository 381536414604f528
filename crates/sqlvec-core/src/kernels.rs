//! Distance kernels and element-wise vector operations.
//!
//! Every kernel checks its operands first: differing element types fail with
//! [`VecError::TypeMismatch`], differing lengths with
//! [`VecError::DimensionMismatch`]. Nothing is cast implicitly. Distances
//! accumulate in `f64` whatever the element type.

use crate::error::{Result, VecError};
use crate::types::{BitVector, ElementType, Vector};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Distance metrics for similarity search; lower is always closer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance (L2 norm)
    L2,
    /// 1 - cosine similarity
    Cosine,
    /// Manhattan distance (L1 norm)
    L1,
    /// Differing bits (bit vectors) or differing elements (int8)
    Hamming,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L1 => write!(f, "l1"),
            DistanceMetric::Hamming => write!(f, "hamming"),
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::L2
    }
}

impl FromStr for DistanceMetric {
    type Err = VecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" => Ok(DistanceMetric::L2),
            "cosine" => Ok(DistanceMetric::Cosine),
            "l1" => Ok(DistanceMetric::L1),
            "hamming" => Ok(DistanceMetric::Hamming),
            other => Err(VecError::Unsupported(format!(
                "unrecognized distance metric '{}'",
                other
            ))),
        }
    }
}

impl DistanceMetric {
    /// Compute the distance between two vectors of the same type and length
    #[inline]
    pub fn distance(&self, a: &Vector, b: &Vector) -> Result<f64> {
        match self {
            DistanceMetric::L2 => l2(a, b),
            DistanceMetric::Cosine => cosine(a, b),
            DistanceMetric::L1 => l1(a, b),
            DistanceMetric::Hamming => hamming(a, b),
        }
    }

    /// Whether this metric is defined for `element_type`
    pub fn supports(&self, element_type: ElementType) -> bool {
        match self {
            DistanceMetric::L2 | DistanceMetric::Cosine | DistanceMetric::L1 => {
                element_type != ElementType::Bit
            }
            DistanceMetric::Hamming => {
                matches!(element_type, ElementType::Bit | ElementType::Int8)
            }
        }
    }

    /// Metric used for a column that does not name one
    pub fn default_for(element_type: ElementType, numeric_default: DistanceMetric) -> Self {
        if element_type == ElementType::Bit {
            DistanceMetric::Hamming
        } else {
            numeric_default
        }
    }
}

/// Numeric element types the kernels read as `f64`
trait Component: Copy {
    fn to_f64(self) -> f64;
}

impl Component for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Component for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

impl Component for i8 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

/// Run a generic slice kernel over two numeric vectors of the same type
macro_rules! numeric_kernel {
    ($op:expr, $a:expr, $b:expr, $kernel:ident) => {
        match ($a, $b) {
            (Vector::Float32(x), Vector::Float32(y)) => $kernel(x, y),
            (Vector::Float64(x), Vector::Float64(y)) => $kernel(x, y),
            (Vector::Int8(x), Vector::Int8(y)) => $kernel(x, y),
            (left, _) => Err(unsupported($op, left.element_type())),
        }
    };
}

fn unsupported(op: &str, element_type: ElementType) -> VecError {
    VecError::Unsupported(format!("{} is not defined for {} vectors", op, element_type))
}

fn check_operands(a: &Vector, b: &Vector) -> Result<()> {
    b.expect_type(a.element_type())?;
    if a.dimensions() != b.dimensions() {
        return Err(VecError::DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }
    Ok(())
}

/// Euclidean distance: sqrt(sum((a[i] - b[i])^2))
pub fn l2(a: &Vector, b: &Vector) -> Result<f64> {
    check_operands(a, b)?;
    numeric_kernel!("l2 distance", a, b, l2_slices)
}

/// Cosine distance: 1 - (a · b) / (||a|| * ||b||), in [0, 2]
pub fn cosine(a: &Vector, b: &Vector) -> Result<f64> {
    check_operands(a, b)?;
    numeric_kernel!("cosine distance", a, b, cosine_slices)
}

/// Manhattan distance: sum(|a[i] - b[i]|)
pub fn l1(a: &Vector, b: &Vector) -> Result<f64> {
    check_operands(a, b)?;
    numeric_kernel!("l1 distance", a, b, l1_slices)
}

/// Hamming distance: differing bits for bit vectors, differing elements for int8
pub fn hamming(a: &Vector, b: &Vector) -> Result<f64> {
    check_operands(a, b)?;
    match (a, b) {
        (Vector::Bit(x), Vector::Bit(y)) => {
            let differing: u32 = x
                .as_bytes()
                .iter()
                .zip(y.as_bytes())
                .map(|(p, q)| (p ^ q).count_ones())
                .sum();
            Ok(f64::from(differing))
        }
        (Vector::Int8(x), Vector::Int8(y)) => {
            Ok(x.iter().zip(y).filter(|(p, q)| p != q).count() as f64)
        }
        (left, _) => Err(unsupported("hamming distance", left.element_type())),
    }
}

#[inline]
fn l2_slices<T: Component>(a: &[T], b: &[T]) -> Result<f64> {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x.to_f64() - y.to_f64();
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

#[inline]
fn l1_slices<T: Component>(a: &[T], b: &[T]) -> Result<f64> {
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x.to_f64() - y.to_f64()).abs())
        .sum())
}

#[inline]
fn cosine_slices<T: Component>(a: &[T], b: &[T]) -> Result<f64> {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.to_f64(), y.to_f64());
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VecError::ZeroNorm("cosine distance"));
    }
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Ok(1.0 - similarity)
}

fn norm<T: Component>(v: &[T]) -> f64 {
    v.iter().map(|x| x.to_f64() * x.to_f64()).sum::<f64>().sqrt()
}

/// Scale a float vector to unit L2 norm
pub fn normalize(v: &Vector) -> Result<Vector> {
    match v {
        Vector::Float32(x) => {
            let n = norm(x);
            if n == 0.0 {
                return Err(VecError::ZeroNorm("normalize"));
            }
            Ok(Vector::Float32(
                x.iter().map(|e| (f64::from(*e) / n) as f32).collect(),
            ))
        }
        Vector::Float64(x) => {
            let n = norm(x);
            if n == 0.0 {
                return Err(VecError::ZeroNorm("normalize"));
            }
            Ok(Vector::Float64(x.iter().map(|e| e / n).collect()))
        }
        other => Err(unsupported("normalize", other.element_type())),
    }
}

/// Element-wise sum; int8 saturates
pub fn add(a: &Vector, b: &Vector) -> Result<Vector> {
    check_operands(a, b)?;
    match (a, b) {
        (Vector::Float32(x), Vector::Float32(y)) => {
            Ok(Vector::Float32(x.iter().zip(y).map(|(p, q)| p + q).collect()))
        }
        (Vector::Float64(x), Vector::Float64(y)) => {
            Ok(Vector::Float64(x.iter().zip(y).map(|(p, q)| p + q).collect()))
        }
        (Vector::Int8(x), Vector::Int8(y)) => Ok(Vector::Int8(
            x.iter().zip(y).map(|(p, q)| p.saturating_add(*q)).collect(),
        )),
        (left, _) => Err(unsupported("add", left.element_type())),
    }
}

/// Element-wise difference `a - b`; int8 saturates
pub fn sub(a: &Vector, b: &Vector) -> Result<Vector> {
    check_operands(a, b)?;
    match (a, b) {
        (Vector::Float32(x), Vector::Float32(y)) => {
            Ok(Vector::Float32(x.iter().zip(y).map(|(p, q)| p - q).collect()))
        }
        (Vector::Float64(x), Vector::Float64(y)) => {
            Ok(Vector::Float64(x.iter().zip(y).map(|(p, q)| p - q).collect()))
        }
        (Vector::Int8(x), Vector::Int8(y)) => Ok(Vector::Int8(
            x.iter().zip(y).map(|(p, q)| p.saturating_sub(*q)).collect(),
        )),
        (left, _) => Err(unsupported("sub", left.element_type())),
    }
}

/// Sub-vector covering dimensions `[start, end)`
///
/// Bit vectors can only be cut on byte boundaries (or at their last dimension).
pub fn slice(v: &Vector, start: usize, end: usize) -> Result<Vector> {
    let dims = v.dimensions();
    if start >= end || end > dims {
        return Err(VecError::InvalidVector(format!(
            "slice [{}, {}) is out of range for a vector of {} dimensions",
            start, end, dims
        )));
    }
    let sliced = match v {
        Vector::Float32(x) => Vector::Float32(x[start..end].to_vec()),
        Vector::Float64(x) => Vector::Float64(x[start..end].to_vec()),
        Vector::Int8(x) => Vector::Int8(x[start..end].to_vec()),
        Vector::Bit(bits) => {
            if start % 8 != 0 || (end % 8 != 0 && end != dims) {
                return Err(VecError::InvalidVector(
                    "bit vector slices must start and end on a byte boundary".into(),
                ));
            }
            let bytes = bits.as_bytes()[start / 8..end.div_ceil(8)].to_vec();
            Vector::Bit(BitVector::from_bytes(bytes, end - start)?)
        }
    };
    Ok(sliced)
}

/// Binary quantization: one bit per dimension, set where the element is positive
pub fn quantize_binary(v: &Vector) -> Result<Vector> {
    let bits: Vec<bool> = match v {
        Vector::Float32(x) => x.iter().map(|e| *e > 0.0).collect(),
        Vector::Float64(x) => x.iter().map(|e| *e > 0.0).collect(),
        Vector::Int8(x) => x.iter().map(|e| *e > 0).collect(),
        Vector::Bit(_) => return Err(unsupported("binary quantization", ElementType::Bit)),
    };
    Ok(Vector::Bit(BitVector::from_bits(&bits)))
}
