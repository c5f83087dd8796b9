// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Element types shared by both sides of the runtime boundary.
//!
//! ## Wire Encoding
//!
//! Buffers crossing the boundary are tagged with one [`ElementType`]. The tag
//! is a small integer both runtimes agree on:
//!
//! | Tag | Type | Bytes |
//! |-----|------|-------|
//! | 0 | f32 | 4 |
//! | 1 | f64 | 8 |
//! | 2 | i32 | 4 |
//! | 3 | i64 | 8 |
//! | 4 | u8 | 1 |
//! | 5 | u32 | 4 |
//! | 6 | f16 | 2 |
//! | 7 | bf16 | 2 |
//!
//! Tags are append-only. Reordering them would silently reinterpret every
//! buffer produced by an older peer.
//!
//! ## Design Decisions
//!
//! - **Own enum, not `DType`**: Candle grows exotic dtypes (f8, f6, f4) that
//!   have no agreed encoding on the embedded side. Mapping through a closed
//!   enum makes the unsupported cases explicit.
//! - **Little-endian on the wire**: buffers are byte regions, never native
//!   scalars, so the byte order is fixed regardless of host.

use std::fmt;

use candle_core::DType;

use crate::error::{BridgeError, Result};

/// Element type of a buffer exchanged with the embedded runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    /// 32-bit IEEE float.
    F32 = 0,
    /// 64-bit IEEE float.
    F64 = 1,
    /// 32-bit signed integer.
    I32 = 2,
    /// 64-bit signed integer.
    I64 = 3,
    /// 8-bit unsigned integer.
    U8 = 4,
    /// 32-bit unsigned integer.
    U32 = 5,
    /// IEEE half precision.
    F16 = 6,
    /// Brain floating point.
    BF16 = 7,
}

impl ElementType {
    /// Every supported element type, in tag order.
    pub const ALL: [ElementType; 8] = [
        Self::F32,
        Self::F64,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U32,
        Self::F16,
        Self::BF16,
    ];

    /// Stable wire tag.
    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnknownElementTag` for tags outside the table.
    pub fn from_tag(tag: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(BridgeError::UnknownElementTag(tag))
    }

    /// Size of one element in bytes.
    #[must_use]
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::F16 | Self::BF16 => 2,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 | Self::I64 => 8,
        }
    }

    /// Short lowercase name used in logs and by the embedded side.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U32 => "u32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
        }
    }

    /// `true` for f16, bf16, f32 and f64.
    #[must_use]
    pub fn is_floating_point(self) -> bool {
        matches!(self, Self::F16 | Self::BF16 | Self::F32 | Self::F64)
    }

    /// Parse a dtype name, accepting the usual aliases.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnsupportedDType` for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "f16" | "float16" | "half" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::BF16),
            "f32" | "float32" | "float" => Ok(Self::F32),
            "f64" | "float64" | "double" => Ok(Self::F64),
            "u8" | "uint8" => Ok(Self::U8),
            "u32" | "uint32" => Ok(Self::U32),
            "i32" | "int32" | "int" => Ok(Self::I32),
            "i64" | "int64" | "long" => Ok(Self::I64),
            _ => Err(BridgeError::unsupported_dtype(name)),
        }
    }

    /// Map a Candle dtype onto the wire enumeration.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnsupportedDType` for dtypes the embedded side
    /// cannot represent (i16 and the sub-byte float formats).
    pub fn from_dtype(dtype: DType) -> Result<Self> {
        match dtype {
            DType::F32 => Ok(Self::F32),
            DType::F64 => Ok(Self::F64),
            DType::I32 => Ok(Self::I32),
            DType::I64 => Ok(Self::I64),
            DType::U8 => Ok(Self::U8),
            DType::U32 => Ok(Self::U32),
            DType::F16 => Ok(Self::F16),
            DType::BF16 => Ok(Self::BF16),
            other => Err(BridgeError::unsupported_dtype(format!("{other:?}"))),
        }
    }

    /// The Candle dtype this element type decodes into.
    #[must_use]
    pub fn to_dtype(self) -> DType {
        match self {
            Self::F32 => DType::F32,
            Self::F64 => DType::F64,
            Self::I32 => DType::I32,
            Self::I64 => DType::I64,
            Self::U8 => DType::U8,
            Self::U32 => DType::U32,
            Self::F16 => DType::F16,
            Self::BF16 => DType::BF16,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar types that can be stored in a buffer.
///
/// Implemented for `f32`, `f64`, `i32`, `i64`, `u8`, `u32`, `half::f16` and
/// `half::bf16`.
pub trait Element: Copy + Send + Sync + 'static {
    /// Wire element type of `Self`.
    const ELEMENT_TYPE: ElementType;

    /// Append the little-endian encoding of `values` to `out`.
    fn extend_le_bytes(values: &[Self], out: &mut Vec<u8>);

    /// Decode one element from exactly `size_in_bytes` little-endian bytes.
    fn from_le_chunk(chunk: &[u8]) -> Self;

    /// Encode a slice into a fresh little-endian byte vector.
    fn to_le_bytes_vec(values: &[Self]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * Self::ELEMENT_TYPE.size_in_bytes());
        Self::extend_le_bytes(values, &mut out);
        out
    }
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $size:expr) => {
        impl Element for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;

            fn extend_le_bytes(values: &[Self], out: &mut Vec<u8>) {
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }

            fn from_le_chunk(chunk: &[u8]) -> Self {
                let mut raw = [0u8; $size];
                raw.copy_from_slice(chunk);
                <$ty>::from_le_bytes(raw)
            }
        }
    };
}

impl_element!(f32, F32, 4);
impl_element!(f64, F64, 8);
impl_element!(i32, I32, 4);
impl_element!(i64, I64, 8);
impl_element!(u8, U8, 1);
impl_element!(u32, U32, 4);
impl_element!(half::f16, F16, 2);
impl_element!(half::bf16, BF16, 2);
