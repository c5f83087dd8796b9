// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Runtime-agnostic description of a numeric array.
//!
//! A [`BufferView`] carries an element type, an immutable shape and a
//! contiguous little-endian byte region. The region is either borrowed from
//! memory owned by someone else or owned by the view itself.
//!
//! ## Aliasing Discipline
//!
//! `Storage::Borrowed` holds a `&'a [u8]`; the lifetime ties the view to the
//! tensor it was encoded from, so a borrowed view cannot be retained past the
//! call that created it. Views returned from the dispatch layer are always
//! `BufferView<'static>` with `Owned` storage.
//!
//! ## Invariant
//!
//! `byte_length == product(shape) * element_size`, checked by every
//! constructor. A violation is an error, never an adjustment.

use crate::dtype::{Element, ElementType};
use crate::error::{BridgeError, Result};

#[allow(clippy::cast_sign_loss)]
const MAX_BYTES: usize = isize::MAX as usize;

/// Compute `product(shape) * element_size`, rejecting unaddressable sizes.
///
/// ## Arguments
///
/// * `shape` - Dimension sizes; any zero dimension yields an empty buffer
/// * `element_type` - Element type whose width scales the count
///
/// ## Returns
///
/// The exact byte length a buffer of this shape must carry.
///
/// ## Why This Function
///
/// Every constructor, codec and result check needs the same length. Computing
/// it in one place with checked arithmetic means a hostile shape from the
/// embedded side surfaces as `ShapeOverflow` instead of wrapping to a small
/// length that would then pass the equality check.
///
/// # Errors
///
/// Returns `BridgeError::ShapeOverflow` if the element count or the byte
/// count overflows, or exceeds `isize::MAX` bytes.
///
/// # Example
///
/// ```rust
/// use rust_ai_bridge::{checked_byte_length, ElementType};
///
/// assert_eq!(checked_byte_length(&[2, 2], ElementType::F32)?, 16);
/// assert!(checked_byte_length(&[usize::MAX, 2], ElementType::F32).is_err());
/// # Ok::<(), rust_ai_bridge::BridgeError>(())
/// ```
pub fn checked_byte_length(shape: &[usize], element_type: ElementType) -> Result<usize> {
    if shape.contains(&0) {
        return Ok(0);
    }
    let overflow = || BridgeError::ShapeOverflow {
        shape: shape.to_vec(),
        element_type,
    };
    let numel = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(overflow)?;
    let bytes = numel
        .checked_mul(element_type.size_in_bytes())
        .ok_or_else(overflow)?;
    if bytes > MAX_BYTES {
        return Err(overflow());
    }
    Ok(bytes)
}

/// Backing bytes of a [`BufferView`].
#[derive(Debug, Clone)]
pub enum Storage<'a> {
    /// Memory owned by another system, valid for `'a` only.
    Borrowed(&'a [u8]),
    /// Memory copied into and owned by the view.
    Owned(Vec<u8>),
}

impl Storage<'_> {
    /// The raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Borrowed(bytes) => bytes,
            Self::Owned(bytes) => bytes,
        }
    }
}

/// Neutral buffer-plus-shape description of an array.
///
/// Equality compares element type, shape and bytes; whether the bytes are
/// borrowed or owned does not matter.
#[derive(Debug, Clone)]
pub struct BufferView<'a> {
    element_type: ElementType,
    shape: Box<[usize]>,
    storage: Storage<'a>,
}

impl<'a> BufferView<'a> {
    fn validated(element_type: ElementType, shape: &[usize], storage: Storage<'a>) -> Result<Self> {
        let expected = checked_byte_length(shape, element_type)?;
        let actual = storage.as_bytes().len();
        if expected != actual {
            return Err(BridgeError::ByteLengthMismatch {
                shape: shape.to_vec(),
                expected,
                actual,
            });
        }
        Ok(Self {
            element_type,
            shape: shape.into(),
            storage,
        })
    }

    /// Describe memory owned elsewhere without copying it.
    ///
    /// # Errors
    ///
    /// Returns `ShapeOverflow` or `ByteLengthMismatch` if `data` does not
    /// hold exactly `product(shape)` elements.
    pub fn borrowed(element_type: ElementType, shape: &[usize], data: &'a [u8]) -> Result<Self> {
        Self::validated(element_type, shape, Storage::Borrowed(data))
    }

    /// Element type of the buffer.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Dimension sizes, outermost first.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Length of the storage in bytes.
    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.storage.as_bytes().len()
    }

    /// Raw little-endian bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    /// Backing storage.
    #[must_use]
    pub fn storage(&self) -> &Storage<'a> {
        &self.storage
    }

    /// `true` if the bytes alias foreign memory.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.storage, Storage::Borrowed(_))
    }

    /// Detach from the source memory, copying borrowed bytes.
    #[must_use]
    pub fn into_owned(self) -> BufferView<'static> {
        let storage = match self.storage {
            Storage::Borrowed(bytes) => Storage::Owned(bytes.to_vec()),
            Storage::Owned(bytes) => Storage::Owned(bytes),
        };
        BufferView {
            element_type: self.element_type,
            shape: self.shape,
            storage,
        }
    }

    /// Decode the elements into a typed vector.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::ElementTypeMismatch` if `T` is not the stored
    /// element type.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::ELEMENT_TYPE != self.element_type {
            return Err(BridgeError::ElementTypeMismatch {
                expected: self.element_type,
                actual: T::ELEMENT_TYPE,
            });
        }
        Ok(self
            .as_bytes()
            .chunks_exact(self.element_type.size_in_bytes())
            .map(T::from_le_chunk)
            .collect())
    }
}

impl BufferView<'static> {
    /// Take ownership of `data` as the view's storage.
    ///
    /// # Errors
    ///
    /// Returns `ShapeOverflow` or `ByteLengthMismatch` if `data` does not
    /// hold exactly `product(shape)` elements.
    pub fn owned(element_type: ElementType, shape: &[usize], data: Vec<u8>) -> Result<Self> {
        Self::validated(element_type, shape, Storage::Owned(data))
    }

    /// Encode typed values into an owned view.
    ///
    /// # Errors
    ///
    /// Returns `ByteLengthMismatch` if `values.len()` differs from
    /// `product(shape)`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rust_ai_bridge::{BufferView, ElementType};
    ///
    /// let view = BufferView::from_elements(&[2, 2], &[1.0f32, 2.0, 3.0, 4.0])?;
    /// assert_eq!(view.element_type(), ElementType::F32);
    /// assert_eq!(view.byte_length(), 16);
    /// # Ok::<(), rust_ai_bridge::BridgeError>(())
    /// ```
    pub fn from_elements<T: Element>(shape: &[usize], values: &[T]) -> Result<Self> {
        Self::owned(T::ELEMENT_TYPE, shape, T::to_le_bytes_vec(values))
    }
}

impl PartialEq for BufferView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.shape == other.shape
            && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for BufferView<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_byte_length() {
        assert_eq!(checked_byte_length(&[10, 100], ElementType::F32).unwrap(), 4000);
        assert_eq!(checked_byte_length(&[10, 100], ElementType::F16).unwrap(), 2000);
        assert_eq!(checked_byte_length(&[], ElementType::F64).unwrap(), 8);
        assert_eq!(checked_byte_length(&[0], ElementType::F32).unwrap(), 0);
        assert_eq!(
            checked_byte_length(&[usize::MAX, usize::MAX, 0], ElementType::F32).unwrap(),
            0
        );
    }

    #[test]
    fn test_checked_byte_length_overflow() {
        let err = checked_byte_length(&[usize::MAX, 2], ElementType::U8).unwrap_err();
        assert!(matches!(err, BridgeError::ShapeOverflow { .. }));

        // Element count fits but bytes exceed isize::MAX
        let err = checked_byte_length(&[usize::MAX / 4], ElementType::F32).unwrap_err();
        assert!(matches!(err, BridgeError::ShapeOverflow { .. }));
    }

    #[test]
    fn test_byte_length_invariant_rejected() {
        let data = [0u8; 12];
        let err = BufferView::borrowed(ElementType::F32, &[2, 2], &data).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ByteLengthMismatch {
                expected: 16,
                actual: 12,
                ..
            }
        ));

        let err = BufferView::owned(ElementType::I64, &[3], vec![0u8; 25]).unwrap_err();
        assert!(matches!(err, BridgeError::ByteLengthMismatch { .. }));
    }

    #[test]
    fn test_borrowed_view_does_not_copy() {
        let data = f32::to_le_bytes_vec(&[1.0, 2.0, 3.0]);
        let view = BufferView::borrowed(ElementType::F32, &[3], &data).unwrap();
        assert!(view.is_borrowed());
        assert_eq!(view.as_bytes().as_ptr(), data.as_ptr());
        assert_eq!(view.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_into_owned_copies() {
        let data = i32::to_le_bytes_vec(&[7, 8]);
        let borrowed = BufferView::borrowed(ElementType::I32, &[1, 2], &data).unwrap();
        let owned = borrowed.clone().into_owned();
        assert!(!owned.is_borrowed());
        assert_ne!(owned.as_bytes().as_ptr(), data.as_ptr());
        assert_eq!(owned, borrowed);
        assert_eq!(owned.shape(), &[1, 2]);
        assert_eq!(owned.rank(), 2);
        assert_eq!(owned.numel(), 2);
    }

    #[test]
    fn test_to_vec_rejects_wrong_type() {
        let view = BufferView::from_elements(&[2], &[1i64, 2]).unwrap();
        let err = view.to_vec::<f64>().unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ElementTypeMismatch {
                expected: ElementType::I64,
                actual: ElementType::F64,
            }
        ));
    }
}
