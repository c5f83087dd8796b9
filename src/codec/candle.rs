// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Candle ↔ buffer conversion.
//!
//! Candle does not lend out its storage across an API boundary, so encode
//! reads the elements into an owned little-endian buffer. Decode rebuilds a
//! tensor on the codec's device from a fresh copy.

use candle_core::{Device, Tensor, WithDType};

use super::TensorCodec;
use crate::buffer::{checked_byte_length, BufferView};
use crate::dtype::{Element, ElementType};
use crate::error::{BridgeError, Result};

/// Codec for `candle_core::Tensor`.
///
/// # Example
///
/// ```rust
/// use candle_core::{Device, Tensor};
/// use rust_ai_bridge::{CandleCodec, TensorCodec};
///
/// let codec = CandleCodec::new(Device::Cpu);
/// let tensor = Tensor::new(&[[1.0f32, 2.0], [3.0, 4.0]], &Device::Cpu)?;
/// let view = codec.encode(&tensor)?;
/// assert_eq!(view.shape(), &[2, 2]);
///
/// let decoded = codec.decode(&view)?;
/// assert_eq!(decoded.to_vec2::<f32>()?, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
/// # Ok::<(), rust_ai_bridge::BridgeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CandleCodec {
    device: Device,
    min_rank: usize,
}

impl CandleCodec {
    /// Create a codec decoding onto `device`.
    ///
    /// Scalars (rank 0) are accepted; see [`CandleCodec::with_min_rank`].
    #[must_use]
    pub fn new(device: Device) -> Self {
        Self {
            device,
            min_rank: 0,
        }
    }

    /// Create a codec decoding onto the CPU.
    #[must_use]
    pub fn cpu() -> Self {
        Self::new(Device::Cpu)
    }

    /// Require decoded views to carry at least `min_rank` dimensions.
    #[must_use]
    pub fn with_min_rank(mut self, min_rank: usize) -> Self {
        self.min_rank = min_rank;
        self
    }

    /// Device decoded tensors are placed on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Minimum rank accepted by [`TensorCodec::decode`].
    #[must_use]
    pub fn min_rank(&self) -> usize {
        self.min_rank
    }
}

impl TensorCodec for CandleCodec {
    type Tensor = Tensor;

    fn encode<'t>(&self, tensor: &'t Tensor) -> Result<BufferView<'t>> {
        let element_type = ElementType::from_dtype(tensor.dtype())?;

        let contiguous;
        let tensor = if tensor.is_contiguous() {
            tensor
        } else {
            tracing::debug!(
                target: "rust_ai_bridge::codec",
                shape = ?tensor.dims(),
                "materializing non-contiguous tensor"
            );
            contiguous = tensor.contiguous()?;
            &contiguous
        };

        let shape = tensor.dims().to_vec();
        let bytes = match element_type {
            ElementType::F32 => tensor_bytes::<f32>(tensor)?,
            ElementType::F64 => tensor_bytes::<f64>(tensor)?,
            ElementType::I32 => tensor_bytes::<i32>(tensor)?,
            ElementType::I64 => tensor_bytes::<i64>(tensor)?,
            ElementType::U8 => tensor_bytes::<u8>(tensor)?,
            ElementType::U32 => tensor_bytes::<u32>(tensor)?,
            ElementType::F16 => tensor_bytes::<half::f16>(tensor)?,
            ElementType::BF16 => tensor_bytes::<half::bf16>(tensor)?,
        };

        BufferView::owned(element_type, &shape, bytes)
    }

    fn decode(&self, view: &BufferView<'_>) -> Result<Tensor> {
        checked_byte_length(view.shape(), view.element_type())?;
        if view.rank() < self.min_rank {
            return Err(BridgeError::RankMismatch {
                expected: self.min_rank,
                actual: view.rank(),
            });
        }

        match view.element_type() {
            ElementType::F32 => view_tensor::<f32>(view, &self.device),
            ElementType::F64 => view_tensor::<f64>(view, &self.device),
            ElementType::I32 => view_tensor::<i32>(view, &self.device),
            ElementType::I64 => view_tensor::<i64>(view, &self.device),
            ElementType::U8 => view_tensor::<u8>(view, &self.device),
            ElementType::U32 => view_tensor::<u32>(view, &self.device),
            ElementType::F16 => view_tensor::<half::f16>(view, &self.device),
            ElementType::BF16 => view_tensor::<half::bf16>(view, &self.device),
        }
    }
}

fn tensor_bytes<T: Element + WithDType>(tensor: &Tensor) -> Result<Vec<u8>> {
    let values: Vec<T> = tensor.flatten_all()?.to_vec1()?;
    Ok(T::to_le_bytes_vec(&values))
}

fn view_tensor<T: Element + WithDType>(view: &BufferView<'_>, device: &Device) -> Result<Tensor> {
    let values = view.to_vec::<T>()?;
    Ok(Tensor::from_vec(values, view.shape(), device)?)
}
