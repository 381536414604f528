//! Blob and JSON encodings of [`Vector`]
//!
//! The blob format is the raw little-endian element sequence with no header
//! or type tag; the reader supplies the element type. Bit vectors are packed
//! least-significant bit first.

use crate::error::{Result, VecError};
use crate::types::{BitVector, ElementType, Vector};

/// Encode a vector as its blob form
pub fn serialize(vector: &Vector) -> Vec<u8> {
    match vector {
        Vector::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        Vector::Float64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        Vector::Int8(v) => v.iter().map(|x| *x as u8).collect(),
        Vector::Bit(v) => v.as_bytes().to_vec(),
    }
}

/// Number of dimensions a blob of `element_type` holds
///
/// For bit vectors this is `len * 8`; a bit vector whose dimension is not a
/// multiple of eight needs its dimension passed to [`deserialize`].
pub fn infer_dimensions(bytes: &[u8], element_type: ElementType) -> Result<usize> {
    if bytes.is_empty() {
        return Err(VecError::InvalidVector("empty blob".into()));
    }
    match element_type.element_size() {
        Some(size) => {
            if bytes.len() % size != 0 {
                return Err(VecError::InvalidVector(format!(
                    "invalid blob length {} for {} vector (must be multiple of {})",
                    bytes.len(),
                    element_type,
                    size
                )));
            }
            Ok(bytes.len() / size)
        }
        None => Ok(bytes.len() * 8),
    }
}

/// Decode a blob as a vector of `element_type`
pub fn deserialize(
    bytes: &[u8],
    element_type: ElementType,
    dimensions: Option<usize>,
) -> Result<Vector> {
    let inferred = infer_dimensions(bytes, element_type)?;

    if element_type != ElementType::Bit {
        if let Some(expected) = dimensions {
            if expected != inferred {
                return Err(VecError::DimensionMismatch {
                    expected,
                    actual: inferred,
                });
            }
        }
    }

    let vector = match element_type {
        ElementType::Float32 => Vector::Float32(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ),
        ElementType::Float64 => Vector::Float64(
            bytes
                .chunks_exact(8)
                .map(|chunk| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(chunk);
                    f64::from_le_bytes(raw)
                })
                .collect(),
        ),
        ElementType::Int8 => Vector::Int8(bytes.iter().map(|b| *b as i8).collect()),
        ElementType::Bit => Vector::Bit(BitVector::from_bytes(
            bytes.to_vec(),
            dimensions.unwrap_or(inferred),
        )?),
    };
    Ok(vector)
}

/// Render a vector as a JSON array
///
/// Bit vectors render one `0`/`1` per dimension.
pub fn to_json(vector: &Vector) -> Result<String> {
    let json = match vector {
        Vector::Float32(v) => serde_json::to_string(v)?,
        Vector::Float64(v) => serde_json::to_string(v)?,
        Vector::Int8(v) => serde_json::to_string(v)?,
        Vector::Bit(v) => {
            let bits: Vec<u8> = v.to_bits().into_iter().map(u8::from).collect();
            serde_json::to_string(&bits)?
        }
    };
    Ok(json)
}

/// Parse a JSON array of numbers as a vector of `element_type`
pub fn from_json(json: &str, element_type: ElementType) -> Result<Vector> {
    let values: Vec<f64> = serde_json::from_str(json)?;
    if values.is_empty() {
        return Err(VecError::InvalidVector("empty JSON array".into()));
    }

    let vector = match element_type {
        ElementType::Float32 => Vector::Float32(values.iter().map(|x| *x as f32).collect()),
        ElementType::Float64 => Vector::Float64(values),
        ElementType::Int8 => {
            let mut elements = Vec::with_capacity(values.len());
            for (i, x) in values.iter().enumerate() {
                if x.fract() != 0.0 || *x < i8::MIN as f64 || *x > i8::MAX as f64 {
                    return Err(VecError::InvalidVector(format!(
                        "element {} ({}) is not an int8 value",
                        i, x
                    )));
                }
                elements.push(*x as i8);
            }
            Vector::Int8(elements)
        }
        ElementType::Bit => {
            let mut bits = Vec::with_capacity(values.len());
            for (i, x) in values.iter().enumerate() {
                match *x {
                    v if v == 0.0 => bits.push(false),
                    v if v == 1.0 => bits.push(true),
                    _ => {
                        return Err(VecError::InvalidVector(format!(
                            "element {} ({}) of a bit vector must be 0 or 1",
                            i, x
                        )))
                    }
                }
            }
            Vector::Bit(BitVector::from_bits(&bits))
        }
    };
    vector.check_finite()?;
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(element_type: ElementType, dims: usize) -> Vector {
        let wave = |i: usize| (i as f64 * 0.37).sin() * 10.0;
        match element_type {
            ElementType::Float32 => Vector::from((0..dims).map(|i| wave(i) as f32).collect::<Vec<_>>()),
            ElementType::Float64 => Vector::from((0..dims).map(wave).collect::<Vec<_>>()),
            ElementType::Int8 => Vector::from((0..dims).map(|i| (i * 37 % 256) as u8 as i8).collect::<Vec<_>>()),
            ElementType::Bit => {
                let bits: Vec<bool> = (0..dims).map(|i| wave(i) > 0.0).collect();
                Vector::Bit(BitVector::from_bits(&bits))
            }
        }
    }

    #[test]
    fn test_blob_roundtrip_all_types_and_dimensions() {
        let types = [
            ElementType::Float32,
            ElementType::Float64,
            ElementType::Int8,
            ElementType::Bit,
        ];
        for element_type in types {
            for dims in [1usize, 4, 13, 384, 1001, 1536] {
                let v = sample(element_type, dims);
                let blob = serialize(&v);
                assert_eq!(blob.len(), element_type.byte_len(dims), "{} x {}", element_type, dims);
                assert_eq!(deserialize(&blob, element_type, Some(dims)).unwrap(), v);

                let inferred = deserialize(&blob, element_type, None).unwrap();
                if element_type == ElementType::Bit {
                    assert_eq!(inferred.dimensions(), blob.len() * 8);
                    if dims % 8 == 0 {
                        assert_eq!(inferred, v);
                    }
                } else {
                    assert_eq!(inferred, v);
                }
            }
        }
    }

    #[test]
    fn test_blob_is_little_endian() {
        let blob = serialize(&Vector::from(vec![1.0f32, -2.0]));
        assert_eq!(blob, [0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0xc0]);

        let blob = serialize(&Vector::from(vec![-1i8, 5]));
        assert_eq!(blob, [0xff, 0x05]);
    }

    #[test]
    fn test_bit_blob_needs_dimension_for_partial_bytes() {
        let bits = Vector::Bit(BitVector::from_bits(&[true, false, true]));
        let blob = serialize(&bits);
        assert_eq!(blob, [0b101]);
        assert_eq!(deserialize(&blob, ElementType::Bit, Some(3)).unwrap(), bits);
        assert_eq!(
            deserialize(&blob, ElementType::Bit, None).unwrap().dimensions(),
            8
        );
        assert!(matches!(
            deserialize(&blob, ElementType::Bit, Some(9)),
            Err(VecError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(matches!(
            deserialize(&[0u8; 6], ElementType::Float32, None),
            Err(VecError::InvalidVector(_))
        ));
        assert!(matches!(
            deserialize(&[], ElementType::Int8, None),
            Err(VecError::InvalidVector(_))
        ));
        assert!(matches!(
            deserialize(&[0u8; 16], ElementType::Float32, Some(3)),
            Err(VecError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_json_roundtrip_within_tolerance() {
        let Vector::Float32(original) = sample(ElementType::Float32, 384) else {
            panic!("expected float32");
        };
        let json = to_json(&Vector::from(original.clone())).unwrap();
        let Vector::Float32(parsed) = from_json(&json, ElementType::Float32).unwrap() else {
            panic!("expected float32");
        };
        for (a, b) in original.iter().zip(&parsed) {
            assert!((a - b).abs() <= 1e-6);
        }
    }

    #[test]
    fn test_json_per_type() {
        assert_eq!(
            from_json("[1, -2, 127]", ElementType::Int8).unwrap(),
            Vector::from(vec![1i8, -2, 127])
        );
        assert!(from_json("[128]", ElementType::Int8).is_err());
        assert!(from_json("[1.5]", ElementType::Int8).is_err());

        let bits = from_json("[1,0,0,1]", ElementType::Bit).unwrap();
        assert_eq!(to_json(&bits).unwrap(), "[1,0,0,1]");
        assert!(from_json("[2]", ElementType::Bit).is_err());

        assert_eq!(to_json(&Vector::from(vec![0.5f64, 2.0])).unwrap(), "[0.5,2.0]");
        assert!(from_json("[1e300]", ElementType::Float32).is_err());
    }

    #[test]
    fn test_json_rejects_non_arrays() {
        assert!(matches!(
            from_json("{\"a\": 1}", ElementType::Float32),
            Err(VecError::Json(_))
        ));
        assert!(matches!(
            from_json("[]", ElementType::Float32),
            Err(VecError::InvalidVector(_))
        ));
        assert!(from_json("[1, \"x\"]", ElementType::Float32).is_err());
    }
}
