// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Named-operation dispatch into the embedded runtime.
//!
//! [`DispatchInvoker::invoke`] runs these steps in order and stops at the
//! first failure:
//!
//! 1. Look up the operation (`UnknownOperation`)
//! 2. Check the argument count (`ArityMismatch`)
//! 3. Make sure the runtime is ready (`Init`)
//! 4. Resolve the callable (`Resolve`)
//! 5. Call it, blocking (`EmbeddedExecution`)
//! 6. Validate the result (`MalformedResult`)
//! 7. Return an owned view
//!
//! Steps 1 and 2 touch nothing on the embedded side.
//!
//! ## Callable Cache
//!
//! Successful resolutions are cached per `(module_path, function_name)`.
//! Failures are never cached; the next invocation resolves again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::buffer::BufferView;
use crate::error::{BridgeError, Result};
use crate::registry::{OperationDescriptor, OperationRegistry};
use crate::runtime::{EmbeddedFunction, RuntimeHandle};

type CacheKey = (String, String);

/// Executes registered operations against a [`RuntimeHandle`].
pub struct DispatchInvoker {
    registry: OperationRegistry,
    runtime: Arc<RuntimeHandle>,
    cache: Option<RwLock<HashMap<CacheKey, Arc<dyn EmbeddedFunction>>>>,
}

impl std::fmt::Debug for DispatchInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchInvoker")
            .field("operations", &self.registry.operation_names())
            .field("runtime", &self.runtime.backend_name())
            .field("cached_callables", &self.cached_callables())
            .finish()
    }
}

impl DispatchInvoker {
    /// Create an invoker with the callable cache enabled.
    #[must_use]
    pub fn new(registry: OperationRegistry, runtime: Arc<RuntimeHandle>) -> Self {
        Self {
            registry,
            runtime,
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve the callable on every invocation.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Operation registry.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Runtime handle.
    #[must_use]
    pub fn runtime(&self) -> &Arc<RuntimeHandle> {
        &self.runtime
    }

    /// Number of cached callables; zero when caching is disabled.
    #[must_use]
    pub fn cached_callables(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.read().len())
    }

    /// Drop every cached callable.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }

    /// Invoke `operation` with `args`.
    ///
    /// The arguments are only borrowed for the duration of the call. The
    /// returned view owns its bytes.
    ///
    /// ## Arguments
    ///
    /// * `operation` - Registered operation name, e.g. `"quantize"`
    /// * `args` - Input buffers, one per declared argument
    ///
    /// ## Returns
    ///
    /// The validated result buffer, detached from embedded memory.
    ///
    /// ## Why This Function
    ///
    /// Callers name operations, not embedded modules. Registry lookup and the
    /// arity check run before the runtime is touched, so a typo never starts
    /// an interpreter.
    ///
    /// # Errors
    ///
    /// See the module documentation for the error produced at each step.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime, RuntimeHandle};
    /// use rust_ai_bridge::{BufferView, DispatchInvoker, OperationRegistry};
    ///
    /// let runtime = NativeRuntime::new().with_module(
    ///     "engine",
    ///     NativeModule::new()
    ///         .function("quantize_latents", |args| Ok(CallResult::from_view(&args[0]))),
    /// );
    /// let invoker = DispatchInvoker::new(
    ///     OperationRegistry::with_defaults("engine"),
    ///     Arc::new(RuntimeHandle::new(runtime)),
    /// );
    ///
    /// let input = BufferView::from_elements(&[2], &[1.0f32, 2.0])?;
    /// let output = invoker.invoke("quantize", &[input.clone()])?;
    /// assert_eq!(output, input);
    /// # Ok::<(), rust_ai_bridge::BridgeError>(())
    /// ```
    pub fn invoke(&self, operation: &str, args: &[BufferView<'_>]) -> Result<BufferView<'static>> {
        self.dispatch(operation, None, args)
    }

    /// Invoke `operation`, resolving its function inside `module_path`
    /// instead of the registered module.
    ///
    /// # Errors
    ///
    /// As [`DispatchInvoker::invoke`]; additionally `InvalidConfig` if
    /// `module_path` is empty.
    pub fn invoke_at(
        &self,
        operation: &str,
        module_path: &str,
        args: &[BufferView<'_>],
    ) -> Result<BufferView<'static>> {
        self.dispatch(operation, Some(module_path), args)
    }

    fn dispatch(
        &self,
        operation: &str,
        module_override: Option<&str>,
        args: &[BufferView<'_>],
    ) -> Result<BufferView<'static>> {
        let descriptor = self
            .registry
            .lookup(operation)
            .ok_or_else(|| BridgeError::UnknownOperation(operation.to_string()))?;
        check_arity(descriptor, args.len())?;

        let module_path = module_override.unwrap_or(descriptor.module_path.as_str());
        if module_path.is_empty() {
            return Err(BridgeError::invalid_config("module path must not be empty"));
        }
        let function_name = descriptor.function_name.as_str();

        self.runtime.ensure_ready()?;
        let function = self.resolve(module_path, function_name)?;

        let started = Instant::now();
        let result = function
            .call(args)
            .map_err(|exception| {
                tracing::debug!(
                    target: "rust_ai_bridge::dispatch",
                    operation,
                    module_path,
                    function_name,
                    error = %exception,
                    "embedded call raised"
                );
                BridgeError::embedded(format!("{module_path}.{function_name}"), exception.message())
            })?;
        let output = result.validate()?;

        tracing::debug!(
            target: "rust_ai_bridge::dispatch",
            operation,
            module_path,
            function_name,
            inputs = args.len(),
            output_shape = ?output.shape(),
            output_dtype = %output.element_type(),
            elapsed_us = started.elapsed().as_micros(),
            "operation completed"
        );
        Ok(output)
    }

    fn resolve(&self, module_path: &str, function_name: &str) -> Result<Arc<dyn EmbeddedFunction>> {
        let Some(cache) = &self.cache else {
            return self.runtime.resolve(module_path, function_name);
        };

        let key = (module_path.to_string(), function_name.to_string());
        if let Some(function) = cache.read().get(&key) {
            return Ok(Arc::clone(function));
        }

        let function = self.runtime.resolve(module_path, function_name)?;
        cache.write().insert(key, Arc::clone(&function));
        Ok(function)
    }
}

fn check_arity(descriptor: &OperationDescriptor, actual: usize) -> Result<()> {
    if actual == descriptor.expected_argument_count {
        return Ok(());
    }
    Err(BridgeError::ArityMismatch {
        operation: descriptor.operation_name.clone(),
        expected: descriptor.expected_argument_count,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{Element, ElementType};
    use crate::error::{InitError, ResolveError};
    use crate::runtime::{CallResult, EmbeddedRuntime, NativeModule, NativeRuntime, RuntimeState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolves {
        inner: NativeRuntime,
        resolves: Arc<AtomicUsize>,
    }

    impl EmbeddedRuntime for CountingResolves {
        fn name(&self) -> &str {
            "counting-resolves"
        }

        fn initialize(&self) -> std::result::Result<(), InitError> {
            self.inner.initialize()
        }

        fn resolve(
            &self,
            module_path: &str,
            function_name: &str,
        ) -> std::result::Result<Arc<dyn EmbeddedFunction>, ResolveError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(module_path, function_name)
        }
    }

    fn invoker_with(module: NativeModule) -> DispatchInvoker {
        let runtime = NativeRuntime::new().with_module("engine", module);
        DispatchInvoker::new(
            OperationRegistry::with_defaults("engine"),
            Arc::new(RuntimeHandle::new(runtime)),
        )
    }

    fn echo_module() -> NativeModule {
        NativeModule::new()
            .function("quantize_latents", |args| Ok(CallResult::from_view(&args[0])))
            .function("cross_attention", |args| Ok(CallResult::from_view(&args[1])))
    }

    #[test]
    fn test_unknown_operation_touches_nothing() {
        let invoker = invoker_with(echo_module());
        let err = invoker.invoke("dequantize", &[]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownOperation(name) if name == "dequantize"));
        assert_eq!(invoker.runtime().state(), RuntimeState::Uninitialized);
    }

    #[test]
    fn test_arity_checked_before_runtime() {
        let invoker = invoker_with(echo_module());
        let err = invoker.invoke("quantize", &[]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ArityMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));
        assert_eq!(invoker.runtime().state(), RuntimeState::Uninitialized);
    }

    #[test]
    fn test_result_is_owned() {
        let invoker = invoker_with(echo_module());
        let data = f32::to_le_bytes_vec(&[1.0, 2.0]);
        let input = BufferView::borrowed(ElementType::F32, &[2], &data).unwrap();
        let output = invoker.invoke("quantize", &[input]).unwrap();
        assert!(!output.is_borrowed());
        assert_eq!(output.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_exception_carries_qualified_name() {
        let invoker = invoker_with(
            NativeModule::new().function("quantize_latents", |_| Err("scale is zero".to_string())),
        );
        let input = BufferView::from_elements(&[1], &[0u8]).unwrap();
        let err = invoker.invoke("quantize", &[input]).unwrap_err();
        match err {
            BridgeError::EmbeddedExecution { function, message } => {
                assert_eq!(function, "engine.quantize_latents");
                assert_eq!(message, "scale is zero");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cache_holds_successes_only() {
        let invoker = invoker_with(echo_module());
        let input = BufferView::from_elements(&[1], &[3i64]).unwrap();
        invoker.invoke("quantize", std::slice::from_ref(&input)).unwrap();
        invoker.invoke("quantize", std::slice::from_ref(&input)).unwrap();
        assert_eq!(invoker.cached_callables(), 1);

        let err = invoker
            .invoke_at("quantize", "missing", std::slice::from_ref(&input))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Resolve(_)));
        assert_eq!(invoker.cached_callables(), 1);

        invoker.clear_cache();
        assert_eq!(invoker.cached_callables(), 0);
    }

    #[test]
    fn test_without_cache_resolves_every_call() {
        let resolves = Arc::new(AtomicUsize::new(0));
        let runtime = CountingResolves {
            inner: NativeRuntime::new().with_module("engine", echo_module()),
            resolves: Arc::clone(&resolves),
        };
        let runtime = Arc::new(RuntimeHandle::new(runtime));
        let input = BufferView::from_elements(&[1], &[1u32]).unwrap();

        let cached = DispatchInvoker::new(
            OperationRegistry::with_defaults("engine"),
            Arc::clone(&runtime),
        );
        for _ in 0..3 {
            cached.invoke("quantize", std::slice::from_ref(&input)).unwrap();
        }
        assert_eq!(resolves.load(Ordering::SeqCst), 1);

        let uncached = DispatchInvoker::new(OperationRegistry::with_defaults("engine"), runtime)
            .without_cache();
        for _ in 0..3 {
            uncached.invoke("quantize", std::slice::from_ref(&input)).unwrap();
        }
        assert_eq!(resolves.load(Ordering::SeqCst), 4);
        assert_eq!(uncached.cached_callables(), 0);
    }

    #[test]
    fn test_invoke_at_rejects_empty_module() {
        let invoker = invoker_with(echo_module());
        let input = BufferView::from_elements(&[1], &[1u8]).unwrap();
        assert!(matches!(
            invoker.invoke_at("quantize", "", &[input]),
            Err(BridgeError::InvalidConfig(_))
        ));
    }
}
