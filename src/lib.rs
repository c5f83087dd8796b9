// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! # rust-ai-bridge
//!
//! Tensor interchange and named-operation dispatch between a host numerical
//! runtime (Candle) and an embedded scripting runtime that hosts the
//! operation implementations.
//!
//! ## Design Philosophy
//!
//! **Fail loudly at the boundary**: every buffer crossing the bridge satisfies
//! `byte_length == product(shape) * element_size`, and anything that does not
//! is an error rather than a silent adjustment. Embedded initialization
//! happens exactly once; a failure is permanent and reported identically to
//! every caller.
//!
//! ## Modules
//!
//! - [`dtype`] - Element types and their stable wire tags
//! - [`buffer`] - [`BufferView`], the shared array description
//! - [`codec`] - Native tensor ↔ buffer conversion
//! - [`runtime`] - Embedded runtime backends and the lifecycle handle
//! - [`registry`] - Operation name → embedded target mapping
//! - [`dispatch`] - [`DispatchInvoker`], the seven-step invocation path
//! - [`bridge`] - [`Bridge`], the Candle-facing entry point
//! - [`config`] - [`BridgeConfig`] with environment overrides
//! - [`error`] - Error types
//! - [`logging`] - Optional subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use candle_core::{Device, Tensor};
//! use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime, RuntimeHandle};
//! use rust_ai_bridge::{Bridge, BridgeConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let runtime = NativeRuntime::new().with_module(
//!         "engine",
//!         NativeModule::new().function("quantize_latents", |args| {
//!             let values = args[0].to_vec::<f32>().map_err(|e| e.to_string())?;
//!             let signs: Vec<i32> = values.iter().map(|v| i32::from(*v >= 0.0)).collect();
//!             Ok(CallResult::from_elements(&[2], &signs))
//!         }),
//!     );
//!
//!     let config = BridgeConfig::new().with_module_path("engine");
//!     let bridge = Bridge::new(&config, Arc::new(RuntimeHandle::new(runtime)))?;
//!
//!     let latents = Tensor::new(&[-0.5f32, 0.25], &Device::Cpu)?;
//!     let quantized = bridge.quantize(&latents)?;
//!     assert_eq!(quantized.to_vec1::<i32>()?, vec![0, 1]);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `python` - Embedded `CPython` backend via `PyO3`
//! - `cuda` - CUDA support in Candle

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;

// Re-exports for convenience
pub use bridge::Bridge;
pub use buffer::{checked_byte_length, BufferView, Storage};
pub use codec::{CandleCodec, HostArray, HostArrayCodec, TensorCodec};
pub use config::{BridgeConfig, ValidatableConfig};
pub use dispatch::DispatchInvoker;
pub use dtype::{Element, ElementType};
pub use error::{BridgeError, InitError, ResolveError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};
pub use registry::{OperationDescriptor, OperationRegistry, RegistryBuilder};
pub use runtime::{
    CallResult, EmbeddedException, EmbeddedFunction, EmbeddedRuntime, RuntimeHandle, RuntimeState,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
