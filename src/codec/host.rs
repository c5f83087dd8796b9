// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Strided host buffers.
//!
//! [`HostArray`] is the host runtime's raw array form: a byte buffer, a
//! shape, per-dimension strides (in elements) and an element offset. It is the
//! representation a host extension receives before any tensor library is
//! involved, and the only one the bridge can encode without copying.

use std::borrow::Cow;

use super::TensorCodec;
use crate::buffer::{checked_byte_length, BufferView};
use crate::dtype::{Element, ElementType};
use crate::error::{BridgeError, Result};

/// Row-major element strides for `shape`.
fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1].saturating_mul(shape[axis + 1]);
    }
    strides
}

/// A strided view over host memory.
#[derive(Debug, Clone)]
pub struct HostArray<'a> {
    element_type: ElementType,
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    data: Cow<'a, [u8]>,
}

impl<'a> HostArray<'a> {
    /// Wrap a row-major buffer holding exactly `product(shape)` elements.
    ///
    /// # Errors
    ///
    /// Returns `ShapeOverflow` or `ByteLengthMismatch` if `data` has the
    /// wrong length.
    pub fn contiguous(element_type: ElementType, shape: &[usize], data: &'a [u8]) -> Result<Self> {
        let expected = checked_byte_length(shape, element_type)?;
        if expected != data.len() {
            return Err(BridgeError::ByteLengthMismatch {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            element_type,
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            offset: 0,
            data: Cow::Borrowed(data),
        })
    }

    /// Wrap an arbitrary strided layout over `data`.
    ///
    /// # Errors
    ///
    /// Returns `RankMismatch` if `strides` and `shape` differ in length,
    /// `ShapeOverflow` if the addressed extent overflows, and
    /// `ByteLengthMismatch` if the last addressed element lies past the end of
    /// `data`.
    pub fn strided(
        element_type: ElementType,
        shape: &[usize],
        strides: &[usize],
        offset: usize,
        data: &'a [u8],
    ) -> Result<Self> {
        if strides.len() != shape.len() {
            return Err(BridgeError::RankMismatch {
                expected: shape.len(),
                actual: strides.len(),
            });
        }
        let overflow = || BridgeError::ShapeOverflow {
            shape: shape.to_vec(),
            element_type,
        };
        checked_byte_length(shape, element_type)?;

        if !shape.contains(&0) {
            let last = shape
                .iter()
                .zip(strides)
                .try_fold(offset, |acc, (&dim, &stride)| {
                    (dim - 1).checked_mul(stride)?.checked_add(acc)
                })
                .ok_or_else(overflow)?;
            let required = last
                .checked_add(1)
                .and_then(|count| count.checked_mul(element_type.size_in_bytes()))
                .ok_or_else(overflow)?;
            if required > data.len() {
                return Err(BridgeError::ByteLengthMismatch {
                    shape: shape.to_vec(),
                    expected: required,
                    actual: data.len(),
                });
            }
        }

        Ok(Self {
            element_type,
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
            data: Cow::Borrowed(data),
        })
    }

    /// Element type.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Dimension sizes.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element strides per dimension.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Offset of the first element, in elements.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// `true` if the elements are laid out row-major without gaps.
    ///
    /// Strides of size-1 dimensions are ignored.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        if self.shape.contains(&0) {
            return true;
        }
        let expected = row_major_strides(&self.shape);
        self.shape
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&dim, (&stride, &want))| dim == 1 || stride == want)
    }

    /// `true` if the array owns its bytes.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    /// Elements in logical (row-major) order.
    ///
    /// # Errors
    ///
    /// Returns `ElementTypeMismatch` if `T` is not the stored element type.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.encode()?.to_vec()
    }

    /// Describe this array as a buffer view.
    ///
    /// Contiguous arrays are borrowed in place; anything else is gathered into
    /// an owned row-major copy.
    ///
    /// # Errors
    ///
    /// Propagates the buffer invariant checks; these cannot fail for an array
    /// built through the validating constructors.
    pub fn encode(&self) -> Result<BufferView<'_>> {
        let size = self.element_type.size_in_bytes();
        let byte_length = checked_byte_length(&self.shape, self.element_type)?;

        if self.is_contiguous() {
            let start = if byte_length == 0 { 0 } else { self.offset * size };
            let bytes = self
                .data
                .get(start..start + byte_length)
                .ok_or_else(|| BridgeError::ByteLengthMismatch {
                    shape: self.shape.clone(),
                    expected: start + byte_length,
                    actual: self.data.len(),
                })?;
            return BufferView::borrowed(self.element_type, &self.shape, bytes);
        }

        tracing::debug!(
            target: "rust_ai_bridge::codec",
            shape = ?self.shape,
            strides = ?self.strides,
            "gathering strided host array"
        );
        BufferView::owned(self.element_type, &self.shape, self.gather(byte_length))
    }

    fn gather(&self, byte_length: usize) -> Vec<u8> {
        let size = self.element_type.size_in_bytes();
        let mut out = Vec::with_capacity(byte_length);
        let mut index = vec![0usize; self.shape.len()];

        for _ in 0..byte_length / size {
            let element = self.offset
                + index
                    .iter()
                    .zip(&self.strides)
                    .map(|(i, stride)| i * stride)
                    .sum::<usize>();
            let start = element * size;
            out.extend_from_slice(&self.data[start..start + size]);

            for axis in (0..index.len()).rev() {
                index[axis] += 1;
                if index[axis] < self.shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        out
    }
}

impl HostArray<'static> {
    /// Take ownership of a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns `ShapeOverflow` or `ByteLengthMismatch` if `data` has the
    /// wrong length.
    pub fn from_owned(element_type: ElementType, shape: &[usize], data: Vec<u8>) -> Result<Self> {
        let expected = checked_byte_length(shape, element_type)?;
        if expected != data.len() {
            return Err(BridgeError::ByteLengthMismatch {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            element_type,
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            offset: 0,
            data: Cow::Owned(data),
        })
    }
}

/// Codec producing owned, row-major [`HostArray`]s.
///
/// Decoded arrays must have at least one dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostArrayCodec;

impl TensorCodec for HostArrayCodec {
    type Tensor = HostArray<'static>;

    fn encode<'t>(&self, tensor: &'t HostArray<'static>) -> Result<BufferView<'t>> {
        tensor.encode()
    }

    fn decode(&self, view: &BufferView<'_>) -> Result<HostArray<'static>> {
        checked_byte_length(view.shape(), view.element_type())?;
        if view.rank() == 0 {
            return Err(BridgeError::RankMismatch {
                expected: 1,
                actual: 0,
            });
        }
        HostArray::from_owned(view.element_type(), view.shape(), view.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_contiguous_encode_borrows() {
        let data = f32::to_le_bytes_vec(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = HostArray::contiguous(ElementType::F32, &[2, 3], &data).unwrap();
        let view = array.encode().unwrap();
        assert!(view.is_borrowed());
        assert_eq!(view.as_bytes().as_ptr(), data.as_ptr());
    }

    #[test]
    fn test_offset_slice_encode_borrows() {
        // Second row of a [2, 3] i32 matrix
        let data = i32::to_le_bytes_vec(&[0, 1, 2, 3, 4, 5]);
        let row = HostArray::strided(ElementType::I32, &[1, 3], &[3, 1], 3, &data).unwrap();
        assert!(row.is_contiguous());
        let view = row.encode().unwrap();
        assert!(view.is_borrowed());
        assert_eq!(view.to_vec::<i32>().unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_transposed_encode_gathers() {
        let data = i64::to_le_bytes_vec(&[0, 1, 2, 3, 4, 5]);
        // [2, 3] row-major viewed as its [3, 2] transpose
        let transposed =
            HostArray::strided(ElementType::I64, &[3, 2], &[1, 3], 0, &data).unwrap();
        assert!(!transposed.is_contiguous());
        let view = transposed.encode().unwrap();
        assert!(!view.is_borrowed());
        assert_eq!(view.to_vec::<i64>().unwrap(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_broadcast_stride_zero() {
        let data = u8::to_le_bytes_vec(&[7, 9]);
        let broadcast = HostArray::strided(ElementType::U8, &[3, 2], &[0, 1], 0, &data).unwrap();
        assert_eq!(broadcast.to_vec::<u8>().unwrap(), vec![7, 9, 7, 9, 7, 9]);
    }

    #[test]
    fn test_strided_out_of_bounds_rejected() {
        let data = f32::to_le_bytes_vec(&[0.0; 4]);
        let err = HostArray::strided(ElementType::F32, &[2, 2], &[3, 1], 0, &data).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ByteLengthMismatch {
                expected: 20,
                actual: 16,
                ..
            }
        ));

        let err = HostArray::strided(ElementType::F32, &[2, 2], &[1], 0, &data).unwrap_err();
        assert!(matches!(err, BridgeError::RankMismatch { .. }));
    }

    #[test]
    fn test_decode_requires_rank() {
        let scalar = BufferView::from_elements(&[], &[1.0f64]).unwrap();
        let err = HostArrayCodec.decode(&scalar).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::RankMismatch {
                expected: 1,
                actual: 0
            }
        ));
    }

    #[test]
    fn test_decode_owns_copy() {
        let data = u32::to_le_bytes_vec(&[10, 20, 30]);
        let view = BufferView::borrowed(ElementType::U32, &[3], &data).unwrap();
        let array = HostArrayCodec.decode(&view).unwrap();
        assert!(array.is_owned());
        assert_eq!(array.strides(), &[1]);
        assert_eq!(array.to_vec::<u32>().unwrap(), vec![10, 20, 30]);
    }
}
