// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Native tensor ↔ [`BufferView`] conversion.
//!
//! ## Codecs
//!
//! - [`CandleCodec`] - Candle tensors; encode copies, decode copies
//! - [`HostArrayCodec`] - strided host buffers; contiguous encode is zero-copy
//!
//! ## Copy Rules
//!
//! Encode may borrow the tensor's storage when it is already contiguous and
//! the native representation lends it out safely. Non-contiguous inputs are
//! materialized into a contiguous copy first. Decode always copies: the
//! returned tensor never aliases memory whose lifetime the caller cannot
//! control.

mod candle;
mod host;

pub use candle::CandleCodec;
pub use host::{HostArray, HostArrayCodec};

use crate::buffer::BufferView;
use crate::error::Result;

/// Conversion between a native tensor type and [`BufferView`].
pub trait TensorCodec {
    /// Native tensor representation handled by this codec.
    type Tensor;

    /// Describe `tensor` as a buffer view.
    ///
    /// The returned view may borrow from `tensor` and must not outlive it.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnsupportedDType` if the tensor's element type has
    /// no cross-runtime mapping.
    fn encode<'t>(&self, tensor: &'t Self::Tensor) -> Result<BufferView<'t>>;

    /// Build a new native tensor holding a copy of `view`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::ShapeOverflow` if the shape is not addressable and
    /// `BridgeError::RankMismatch` if it has fewer dimensions than the
    /// destination requires.
    fn decode(&self, view: &BufferView<'_>) -> Result<Self::Tensor>;
}
