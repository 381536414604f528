//! Vector element types and in-memory vectors

use crate::codec;
use crate::error::{Result, VecError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Element types a vector column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 32-bit floating point (default)
    Float32,
    /// 64-bit floating point
    Float64,
    /// 8-bit signed integer
    Int8,
    /// 1 bit per dimension, packed 8 to a byte
    Bit,
}

impl ElementType {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Int8 => "int8",
            ElementType::Bit => "bit",
        }
    }

    /// Size of one element in bytes, `None` for packed bits
    pub fn element_size(&self) -> Option<usize> {
        match self {
            ElementType::Float32 => Some(4),
            ElementType::Float64 => Some(8),
            ElementType::Int8 => Some(1),
            ElementType::Bit => None,
        }
    }

    /// Serialized length of a vector with `dimensions` elements
    pub fn byte_len(&self, dimensions: usize) -> usize {
        match self.element_size() {
            Some(size) => dimensions * size,
            None => dimensions.div_ceil(8),
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::Float32
    }
}

impl FromStr for ElementType {
    type Err = VecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float" | "float32" | "f32" => Ok(ElementType::Float32),
            "float64" | "double" | "f64" => Ok(ElementType::Float64),
            "int8" | "i8" => Ok(ElementType::Int8),
            "bit" => Ok(ElementType::Bit),
            other => Err(VecError::Unsupported(format!(
                "unrecognized element type '{}'",
                other
            ))),
        }
    }
}

/// A packed bit vector
///
/// Dimension `i` is bit `i % 8` of byte `i / 8`. Padding bits in the last
/// byte are always zero, so two bit vectors compare equal exactly when their
/// dimensions agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    bytes: Vec<u8>,
    dimensions: usize,
}

impl BitVector {
    /// Wrap packed bytes; the byte count must be `ceil(dimensions / 8)`
    pub fn from_bytes(mut bytes: Vec<u8>, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(VecError::InvalidVector(
                "bit vectors need at least one dimension".into(),
            ));
        }
        if bytes.len() != ElementType::Bit.byte_len(dimensions) {
            return Err(VecError::DimensionMismatch {
                expected: dimensions,
                actual: bytes.len() * 8,
            });
        }
        let used = dimensions % 8;
        if used != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
        Ok(Self { bytes, dimensions })
    }

    /// Pack one bool per dimension
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            bytes[i / 8] |= 1 << (i % 8);
        }
        Self {
            bytes,
            dimensions: bits.len(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bit at dimension `index`
    pub fn get(&self, index: usize) -> bool {
        index < self.dimensions && self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// Unpack to one bool per dimension
    pub fn to_bits(&self) -> Vec<bool> {
        (0..self.dimensions).map(|i| self.get(i)).collect()
    }
}

/// A vector value of one element type
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int8(Vec<i8>),
    Bit(BitVector),
}

impl Vector {
    pub fn element_type(&self) -> ElementType {
        match self {
            Vector::Float32(_) => ElementType::Float32,
            Vector::Float64(_) => ElementType::Float64,
            Vector::Int8(_) => ElementType::Int8,
            Vector::Bit(_) => ElementType::Bit,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Vector::Float32(v) => v.len(),
            Vector::Float64(v) => v.len(),
            Vector::Int8(v) => v.len(),
            Vector::Bit(v) => v.dimensions(),
        }
    }

    /// Serialize to BLOB for SQLite storage
    ///
    /// Stores raw little-endian elements with no header
    pub fn to_blob(&self) -> Vec<u8> {
        codec::serialize(self)
    }

    /// Deserialize from BLOB; `dimensions` is checked when given and
    /// inferred from the length otherwise
    pub fn from_blob(blob: &[u8], element_type: ElementType, dimensions: Option<usize>) -> Result<Self> {
        codec::deserialize(blob, element_type, dimensions)
    }

    /// Convert to a JSON array
    pub fn to_json(&self) -> Result<String> {
        codec::to_json(self)
    }

    /// Parse a JSON array as a vector of `element_type`
    pub fn from_json(json: &str, element_type: ElementType) -> Result<Self> {
        codec::from_json(json, element_type)
    }

    /// Reject NaN and infinite components of float vectors
    pub fn check_finite(&self) -> Result<()> {
        let position = match self {
            Vector::Float32(v) => v.iter().position(|x| !x.is_finite()),
            Vector::Float64(v) => v.iter().position(|x| !x.is_finite()),
            Vector::Int8(_) | Vector::Bit(_) => None,
        };
        match position {
            Some(index) => Err(VecError::InvalidVector(format!(
                "element {} is not a finite number",
                index
            ))),
            None => Ok(()),
        }
    }

    /// Whether every component is zero (no bit set for bit vectors)
    pub fn is_zero(&self) -> bool {
        match self {
            Vector::Float32(v) => v.iter().all(|x| *x == 0.0),
            Vector::Float64(v) => v.iter().all(|x| *x == 0.0),
            Vector::Int8(v) => v.iter().all(|x| *x == 0),
            Vector::Bit(v) => v.count_ones() == 0,
        }
    }

    /// Fail with a type mismatch unless this vector holds `expected` elements
    pub fn expect_type(&self, expected: ElementType) -> Result<()> {
        if self.element_type() != expected {
            return Err(VecError::type_mismatch(expected, self.element_type()));
        }
        Ok(())
    }

    /// Fail with a dimension mismatch unless this vector has `expected` dimensions
    pub fn expect_dimensions(&self, expected: usize) -> Result<()> {
        if self.dimensions() != expected {
            return Err(VecError::DimensionMismatch {
                expected,
                actual: self.dimensions(),
            });
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::Float32(data)
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Vector::Float64(data)
    }
}

impl From<Vec<i8>> for Vector {
    fn from(data: Vec<i8>) -> Self {
        Vector::Int8(data)
    }
}

impl From<BitVector> for Vector {
    fn from(bits: BitVector) -> Self {
        Vector::Bit(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_names() {
        for name in ["float", "FLOAT32", "f32"] {
            assert_eq!(name.parse::<ElementType>().unwrap(), ElementType::Float32);
        }
        assert_eq!("double".parse::<ElementType>().unwrap(), ElementType::Float64);
        assert_eq!("i8".parse::<ElementType>().unwrap(), ElementType::Int8);
        assert_eq!("bit".parse::<ElementType>().unwrap(), ElementType::Bit);
        assert!("float16".parse::<ElementType>().is_err());
        assert_eq!(ElementType::Int8.to_string(), "int8");
    }

    #[test]
    fn test_byte_len() {
        assert_eq!(ElementType::Float32.byte_len(3), 12);
        assert_eq!(ElementType::Float64.byte_len(3), 24);
        assert_eq!(ElementType::Int8.byte_len(3), 3);
        assert_eq!(ElementType::Bit.byte_len(1), 1);
        assert_eq!(ElementType::Bit.byte_len(8), 1);
        assert_eq!(ElementType::Bit.byte_len(9), 2);
    }

    #[test]
    fn test_bit_vector_layout() {
        let bits = BitVector::from_bits(&[true, false, false, true, false, false, false, false, true]);
        assert_eq!(bits.as_bytes(), &[0b0000_1001, 0b0000_0001]);
        assert_eq!(bits.dimensions(), 9);
        assert!(bits.get(0) && bits.get(3) && bits.get(8));
        assert!(!bits.get(1) && !bits.get(9));
        assert_eq!(bits.count_ones(), 3);
    }

    #[test]
    fn test_bit_vector_masks_padding() {
        let bits = BitVector::from_bytes(vec![0xFF], 3).unwrap();
        assert_eq!(bits.as_bytes(), &[0b0000_0111]);
        assert_eq!(bits, BitVector::from_bits(&[true, true, true]));
        assert!(BitVector::from_bytes(vec![0, 0], 3).is_err());
        assert!(BitVector::from_bytes(vec![], 0).is_err());
    }

    #[test]
    fn test_check_finite() {
        assert!(Vector::from(vec![1.0f32, 2.0]).check_finite().is_ok());
        assert!(Vector::from(vec![1.0f32, f32::NAN]).check_finite().is_err());
        assert!(Vector::from(vec![f64::INFINITY]).check_finite().is_err());
    }

    #[test]
    fn test_is_zero() {
        assert!(Vector::from(vec![0.0f32, -0.0]).is_zero());
        assert!(!Vector::from(vec![0i8, 1]).is_zero());
        assert!(Vector::Bit(BitVector::from_bits(&[false, false])).is_zero());
    }

    #[test]
    fn test_expectations() {
        let v = Vector::from(vec![1i8, 2, 3]);
        assert!(v.expect_type(ElementType::Int8).is_ok());
        assert!(matches!(
            v.expect_type(ElementType::Float32),
            Err(VecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            v.expect_dimensions(4),
            Err(VecError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }
}
