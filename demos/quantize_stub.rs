// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Quantize a latent tensor through an in-process embedded runtime.
//!
//! ```text
//! cargo run --example quantize_stub
//! RUST_LOG=rust_ai_bridge=debug cargo run --example quantize_stub
//! ```

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use std::sync::Arc;

use candle_core::{Device, Tensor};
use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime, RuntimeHandle};
use rust_ai_bridge::{init_logging, Bridge, BridgeConfig, BufferView, LogConfig, Result};

fn quantize_latents(args: &[BufferView<'_>]) -> std::result::Result<CallResult, String> {
    let values = args[0].to_vec::<f32>().map_err(|err| err.to_string())?;
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max <= min {
        return Err("latents have zero range".to_string());
    }
    let levels: Vec<i32> = values
        .iter()
        .map(|v| ((v - min) / (max - min) * 255.0).round() as i32)
        .collect();
    let shape: Vec<i64> = args[0].shape().iter().map(|&dim| dim as i64).collect();
    Ok(CallResult::from_elements(&shape, &levels))
}

fn main() -> Result<()> {
    init_logging(&LogConfig::development());

    let runtime = NativeRuntime::new()
        .with_name("demo")
        .with_initializer(|| {
            tracing::info!("engine created: 8 experts, 4 attention heads, embedding 64");
            Ok(())
        })
        .with_module(
            "zeta_engine",
            NativeModule::new().function("quantize_latents", quantize_latents),
        );

    let bridge = Bridge::new(&BridgeConfig::from_env(), Arc::new(RuntimeHandle::new(runtime)))?;

    let latents = Tensor::new(&[[1.0f32, 2.0], [3.0, 4.0]], &Device::Cpu)?;
    let quantized = bridge.forward(&latents, None)?;

    println!("latents:   {:?}", latents.to_vec2::<f32>()?);
    println!("quantized: {:?}", quantized.to_vec2::<i32>()?);
    Ok(())
}
