// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! In-process embedded runtime.
//!
//! Modules are tables of named exports. An export is either a Rust closure,
//! which resolves to a callable, or a plain value, which resolves to
//! `NotCallable`. A panic inside a closure is reported as an embedded
//! exception.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{panic_message, CallResult, EmbeddedException, EmbeddedFunction, EmbeddedRuntime};
use crate::buffer::BufferView;
use crate::error::{InitError, ResolveError};

type NativeBody =
    dyn Fn(&[BufferView<'_>]) -> std::result::Result<CallResult, String> + Send + Sync;

type Initializer = dyn Fn() -> std::result::Result<(), String> + Send + Sync;

struct NativeFunction {
    name: String,
    body: Box<NativeBody>,
}

impl EmbeddedFunction for NativeFunction {
    fn call(&self, args: &[BufferView<'_>]) -> std::result::Result<CallResult, EmbeddedException> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(args))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(EmbeddedException::new(message)),
            Err(payload) => Err(EmbeddedException::new(format!(
                "{} panicked: {}",
                self.name,
                panic_message(payload.as_ref())
            ))),
        }
    }
}

enum Export {
    Function(Arc<NativeFunction>),
    Value,
}

/// A named table of exports.
#[derive(Default)]
pub struct NativeModule {
    exports: HashMap<String, Export>,
}

impl NativeModule {
    /// Create an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a callable.
    ///
    /// Returning `Err(message)` raises an embedded exception carrying
    /// `message`.
    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[BufferView<'_>]) -> std::result::Result<CallResult, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let function = NativeFunction {
            name: name.clone(),
            body: Box::new(body),
        };
        self.exports.insert(name, Export::Function(Arc::new(function)));
        self
    }

    /// Export a non-callable attribute.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>) -> Self {
        self.exports.insert(name.into(), Export::Value);
        self
    }

    /// Number of exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// `true` if the module exports nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// Embedded runtime made of in-process Rust modules.
///
/// # Example
///
/// ```rust
/// use rust_ai_bridge::runtime::{CallResult, NativeModule, NativeRuntime, RuntimeHandle};
///
/// let runtime = NativeRuntime::new().with_module(
///     "engine",
///     NativeModule::new().function("identity", |args| Ok(CallResult::from_view(&args[0]))),
/// );
/// let handle = RuntimeHandle::new(runtime);
/// assert!(handle.resolve("engine", "identity").is_ok());
/// ```
pub struct NativeRuntime {
    name: String,
    modules: HashMap<String, NativeModule>,
    initializer: Option<Box<Initializer>>,
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRuntime {
    /// Create a runtime with no modules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "native".to_string(),
            modules: HashMap::new(),
            initializer: None,
        }
    }

    /// Override the backend name reported in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register a module under `path`, replacing any previous one.
    #[must_use]
    pub fn with_module(mut self, path: impl Into<String>, module: NativeModule) -> Self {
        self.modules.insert(path.into(), module);
        self
    }

    /// Run `initializer` when the runtime is brought up.
    ///
    /// Returning `Err(message)` makes initialization fail with `message`.
    #[must_use]
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn() -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.initializer = Some(Box::new(initializer));
        self
    }
}

impl EmbeddedRuntime for NativeRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> std::result::Result<(), InitError> {
        match &self.initializer {
            Some(initializer) => initializer().map_err(InitError::new),
            None => Ok(()),
        }
    }

    fn resolve(
        &self,
        module_path: &str,
        function_name: &str,
    ) -> std::result::Result<Arc<dyn EmbeddedFunction>, ResolveError> {
        let module = self.modules.get(module_path).ok_or_else(|| {
            ResolveError::not_found(module_path, function_name, "no such module")
        })?;
        match module.exports.get(function_name) {
            Some(Export::Function(function)) => {
                let function: Arc<dyn EmbeddedFunction> = function.clone();
                Ok(function)
            }
            Some(Export::Value) => Err(ResolveError::not_callable(module_path, function_name)),
            None => Err(ResolveError::not_found(
                module_path,
                function_name,
                "module has no such attribute",
            )),
        }
    }
}
