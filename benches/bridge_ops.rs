//! Benchmarks for the bridge's per-call paths.

use std::hint::black_box;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime};
use rust_ai_bridge::{
    checked_byte_length, BufferView, CandleCodec, DispatchInvoker, Element, ElementType,
    HostArray, OperationRegistry, RuntimeHandle, TensorCodec,
};

fn identity_invoker() -> DispatchInvoker {
    let runtime = NativeRuntime::new().with_module(
        "engine",
        NativeModule::new().function("quantize_latents", |args| {
            Ok(CallResult::from_view(&args[0]))
        }),
    );
    DispatchInvoker::new(
        OperationRegistry::with_defaults("engine"),
        Arc::new(RuntimeHandle::new(runtime)),
    )
}

/// Benchmark shape arithmetic (runs on every constructor).
fn bench_shape_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_checks");

    for rank in [1, 2, 4] {
        let shape: Vec<usize> = (0..rank).map(|_| 64).collect();
        group.bench_with_input(
            BenchmarkId::new("checked_byte_length", rank),
            &shape,
            |b, shape| {
                b.iter(|| black_box(checked_byte_length(black_box(shape), ElementType::F32)));
            },
        );
    }

    group.finish();
}

/// Benchmark encode/decode through each codec.
fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codecs");
    let codec = CandleCodec::cpu();

    for side in [16usize, 256] {
        let tensor = Tensor::ones((side, side), candle_core::DType::F32, &Device::Cpu).unwrap();
        group.bench_with_input(BenchmarkId::new("candle_encode", side), &tensor, |b, tensor| {
            b.iter(|| black_box(codec.encode(black_box(tensor)).unwrap()))
        });

        let transposed = tensor.t().unwrap();
        group.bench_with_input(
            BenchmarkId::new("candle_encode_transposed", side),
            &transposed,
            |b, tensor| b.iter(|| black_box(codec.encode(black_box(tensor)).unwrap())),
        );

        let view = codec.encode(&tensor).unwrap();
        group.bench_with_input(BenchmarkId::new("candle_decode", side), &view, |b, view| {
            b.iter(|| black_box(codec.decode(black_box(view)).unwrap()))
        });

        // Zero-copy path
        let data = f32::to_le_bytes_vec(&vec![1.0; side * side]);
        group.bench_with_input(BenchmarkId::new("host_array_encode", side), &data, |b, data| {
            b.iter(|| {
                let array = HostArray::contiguous(ElementType::F32, &[side, side], data).unwrap();
                black_box(array.encode().unwrap().byte_length())
            })
        });
    }

    group.finish();
}

/// Benchmark dispatch overhead against an identity function.
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let input = BufferView::from_elements(&[64], &[0.5f32; 64]).unwrap();

    group.bench_function("invoke_cached", |b| {
        let invoker = identity_invoker();
        b.iter(|| black_box(invoker.invoke("quantize", std::slice::from_ref(&input)).unwrap()))
    });

    group.bench_function("invoke_uncached", |b| {
        let invoker = identity_invoker().without_cache();
        b.iter(|| black_box(invoker.invoke("quantize", std::slice::from_ref(&input)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_shape_checks, bench_codecs, bench_dispatch);
criterion_main!(benches);
