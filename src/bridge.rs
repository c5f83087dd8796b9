// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Tensor-level entry point for host code.
//!
//! [`Bridge`] encodes Candle tensors, dispatches the named operation into the
//! embedded runtime and decodes the result back into a Candle tensor.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use candle_core::{Device, Tensor};
//! use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime, RuntimeHandle};
//! use rust_ai_bridge::{Bridge, BridgeConfig};
//!
//! let runtime = NativeRuntime::new().with_module(
//!     "engine",
//!     NativeModule::new()
//!         .function("quantize_latents", |args| Ok(CallResult::from_view(&args[0]))),
//! );
//! let bridge = Bridge::new(
//!     &BridgeConfig::new().with_module_path("engine"),
//!     Arc::new(RuntimeHandle::new(runtime)),
//! )?;
//!
//! let x = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu)?;
//! let y = bridge.quantize(&x)?;
//! assert_eq!(y.to_vec1::<f32>()?, vec![1.0, 2.0, 3.0]);
//! # Ok::<(), rust_ai_bridge::BridgeError>(())
//! ```

use std::sync::Arc;

use candle_core::{Device, Tensor};

use crate::buffer::BufferView;
use crate::codec::{CandleCodec, TensorCodec};
use crate::config::BridgeConfig;
use crate::dispatch::DispatchInvoker;
use crate::dtype::ElementType;
use crate::error::{BridgeError, Result};
use crate::runtime::{self, RuntimeHandle};

/// Operation name of latent quantization.
pub const QUANTIZE: &str = "quantize";

/// Operation name of cross-attention.
pub const CROSS_ATTENTION: &str = "cross-attention";

/// Operation name of the modality alignment metric.
pub const ALIGNMENT: &str = "alignment";

/// Candle-facing bridge into the embedded runtime.
#[derive(Debug)]
pub struct Bridge {
    invoker: DispatchInvoker,
    min_rank: usize,
}

impl Bridge {
    /// Build a bridge from configuration and a runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the configuration errors of [`BridgeConfig::build_registry`].
    pub fn new(config: &BridgeConfig, runtime: Arc<RuntimeHandle>) -> Result<Self> {
        let registry = config.build_registry()?;
        let mut invoker = DispatchInvoker::new(registry, runtime);
        if !config.cache_callables {
            invoker = invoker.without_cache();
        }

        tracing::debug!(
            target: "rust_ai_bridge::dispatch",
            operations = ?invoker.registry().operation_names(),
            backend = invoker.runtime().backend_name(),
            cache = config.cache_callables,
            "bridge created"
        );

        Ok(Self {
            invoker,
            min_rank: config.min_rank,
        })
    }

    /// Build a bridge over the process-wide runtime.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if no global runtime is installed,
    /// or the configuration errors of [`BridgeConfig::build_registry`].
    pub fn from_global(config: &BridgeConfig) -> Result<Self> {
        let runtime = runtime::global()
            .ok_or_else(|| BridgeError::invalid_config("no global embedded runtime installed"))?;
        Self::new(config, runtime)
    }

    /// Underlying invoker.
    #[must_use]
    pub fn invoker(&self) -> &DispatchInvoker {
        &self.invoker
    }

    /// Run `operation` on `inputs`.
    ///
    /// The result is placed on the device of the first input, or the CPU when
    /// there are no inputs.
    ///
    /// # Errors
    ///
    /// Returns encode, dispatch and decode errors unchanged.
    pub fn call(&self, operation: &str, inputs: &[&Tensor]) -> Result<Tensor> {
        self.run(operation, None, inputs)
    }

    /// Run `operation` with its function resolved inside `module_path`.
    ///
    /// # Errors
    ///
    /// Returns encode, dispatch and decode errors unchanged.
    pub fn call_with_target(
        &self,
        operation: &str,
        module_path: &str,
        inputs: &[&Tensor],
    ) -> Result<Tensor> {
        self.run(operation, Some(module_path), inputs)
    }

    /// Quantize latents.
    ///
    /// # Errors
    ///
    /// As [`Bridge::call`].
    pub fn quantize(&self, x: &Tensor) -> Result<Tensor> {
        self.call(QUANTIZE, &[x])
    }

    /// Attend from `x` into `context`.
    ///
    /// # Errors
    ///
    /// As [`Bridge::call`].
    pub fn cross_attention(&self, x: &Tensor, context: &Tensor) -> Result<Tensor> {
        self.call(CROSS_ATTENTION, &[x, context])
    }

    /// Cross-attention when a context is given, quantization otherwise.
    ///
    /// # Errors
    ///
    /// As [`Bridge::call`].
    pub fn forward(&self, x: &Tensor, context: Option<&Tensor>) -> Result<Tensor> {
        match context {
            Some(context) => self.cross_attention(x, context),
            None => self.quantize(x),
        }
    }

    /// Alignment score between two modality embeddings.
    ///
    /// The embedded function returns one f32 or f64 element; lower means
    /// better aligned for distance-style metrics.
    ///
    /// # Errors
    ///
    /// As [`Bridge::call`]; `BridgeError::MalformedResult` if the result is
    /// not a single float.
    pub fn measure_alignment(&self, a: &Tensor, b: &Tensor) -> Result<f64> {
        let output = self.dispatch(ALIGNMENT, None, &[a, b])?;
        if output.numel() != 1 {
            return Err(BridgeError::malformed(format!(
                "{ALIGNMENT} must return a single value, got shape {:?}",
                output.shape()
            )));
        }
        match output.element_type() {
            ElementType::F64 => Ok(output.to_vec::<f64>()?[0]),
            ElementType::F32 => Ok(f64::from(output.to_vec::<f32>()?[0])),
            other => Err(BridgeError::malformed(format!(
                "{ALIGNMENT} must return a float, got {other}"
            ))),
        }
    }

    fn dispatch(
        &self,
        operation: &str,
        module_path: Option<&str>,
        inputs: &[&Tensor],
    ) -> Result<BufferView<'static>> {
        let encoder = CandleCodec::cpu();
        let views = inputs
            .iter()
            .map(|tensor| encoder.encode(tensor))
            .collect::<Result<Vec<_>>>()?;

        match module_path {
            Some(module_path) => self.invoker.invoke_at(operation, module_path, &views),
            None => self.invoker.invoke(operation, &views),
        }
    }

    fn run(
        &self,
        operation: &str,
        module_path: Option<&str>,
        inputs: &[&Tensor],
    ) -> Result<Tensor> {
        let output = self.dispatch(operation, module_path, inputs)?;

        let device = inputs
            .first()
            .map_or(Device::Cpu, |tensor| tensor.device().clone());
        CandleCodec::new(device)
            .with_min_rank(self.min_rank)
            .decode(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CallResult, NativeModule, NativeRuntime};

    fn bridge(config: &BridgeConfig) -> Bridge {
        let module = NativeModule::new()
            .function("quantize_latents", |args| {
                let values = args[0].to_vec::<f32>().map_err(|err| err.to_string())?;
                let rounded: Vec<i32> = values.iter().map(|v| v.round() as i32).collect();
                let shape: Vec<i64> = args[0].shape().iter().map(|&d| d as i64).collect();
                Ok(CallResult::from_elements(&shape, &rounded))
            })
            .function("cross_attention", |args| Ok(CallResult::from_view(&args[1])))
            .function("scalar_sum", |args| {
                let total: f32 = args[0].to_vec::<f32>().map_err(|e| e.to_string())?.iter().sum();
                Ok(CallResult::from_elements(&[], &[total]))
            })
            .function("measure_alignment", |args| {
                let a = args[0].to_vec::<f32>().map_err(|e| e.to_string())?;
                let b = args[1].to_vec::<f32>().map_err(|e| e.to_string())?;
                let distance: f64 = a
                    .iter()
                    .zip(&b)
                    .map(|(x, y)| f64::from((x - y).abs()))
                    .sum();
                Ok(CallResult::from_elements(&[], &[distance]))
            })
            .function("per_element_gap", |args| Ok(CallResult::from_view(&args[0])));
        let runtime = NativeRuntime::new().with_module("engine", module);
        Bridge::new(config, Arc::new(RuntimeHandle::new(runtime))).unwrap()
    }

    fn engine_config() -> BridgeConfig {
        BridgeConfig::new().with_module_path("engine")
    }

    #[test]
    fn test_forward_selects_operation() {
        let bridge = bridge(&engine_config());
        let x = Tensor::new(&[[0.4f32, 1.6]], &Device::Cpu).unwrap();
        let context = Tensor::new(&[9.0f32, 8.0, 7.0], &Device::Cpu).unwrap();

        let quantized = bridge.forward(&x, None).unwrap();
        assert_eq!(quantized.to_vec2::<i32>().unwrap(), vec![vec![0, 2]]);

        let attended = bridge.forward(&x, Some(&context)).unwrap();
        assert_eq!(attended.to_vec1::<f32>().unwrap(), vec![9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_call_with_target_overrides_module() {
        let bridge = bridge(&engine_config());
        let x = Tensor::new(&[1.0f32], &Device::Cpu).unwrap();
        let err = bridge.call_with_target(QUANTIZE, "elsewhere", &[&x]).unwrap_err();
        assert!(matches!(err, BridgeError::Resolve(_)));
    }

    #[test]
    fn test_min_rank_applies_to_results() {
        let config = engine_config().with_operation(crate::OperationDescriptor::new(
            "sum", "engine", "scalar_sum", 1,
        ));
        let x = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu).unwrap();

        let sum = bridge(&config).call("sum", &[&x]).unwrap();
        assert_eq!(sum.to_scalar::<f32>().unwrap(), 6.0);

        let strict = bridge(&config.with_min_rank(1));
        assert!(matches!(
            strict.call("sum", &[&x]),
            Err(BridgeError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_measure_alignment() {
        let strict = bridge(&engine_config().with_min_rank(1));
        let a = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let b = Tensor::new(&[1.5f32, 2.0, 1.0], &Device::Cpu).unwrap();

        assert_eq!(strict.measure_alignment(&a, &b).unwrap(), 2.5);
        assert_eq!(strict.measure_alignment(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_measure_alignment_rejects_non_scalar() {
        let config = BridgeConfig::new()
            .with_module_path("engine")
            .with_default_operations(false)
            .with_operation(crate::OperationDescriptor::new(
                ALIGNMENT,
                "engine",
                "per_element_gap",
                2,
            ));
        let x = Tensor::new(&[1.0f32, 2.0], &Device::Cpu).unwrap();

        let err = bridge(&config).measure_alignment(&x, &x).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedResult { .. }), "{err}");
    }

    #[test]
    fn test_from_global_requires_install() {
        if runtime::global().is_none() {
            assert!(matches!(
                Bridge::from_global(&engine_config()),
                Err(BridgeError::InvalidConfig(_))
            ));
        }
    }
}
