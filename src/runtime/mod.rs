// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Embedded runtime access.
//!
//! The embedded runtime hosts the named operation implementations. The bridge
//! talks to it through two traits:
//!
//! - [`EmbeddedRuntime`] - one-time initialization and callable resolution
//! - [`EmbeddedFunction`] - a resolved callable taking buffer views
//!
//! [`RuntimeHandle`] wraps a backend and owns its lifecycle:
//!
//! ```text
//! Uninitialized ──> Initializing ──> Ready
//!                        │
//!                        └─────────> Failed(InitError)   (sticky)
//! ```
//!
//! Exactly one caller runs the backend's initializer. Callers arriving while
//! it runs block on a condition variable and observe the same outcome. Once
//! `Ready`, an atomic flag short-circuits the lock.
//!
//! ## Backends
//!
//! - [`NativeRuntime`] - in-process modules of Rust closures
//! - `PythonRuntime` - embedded CPython (feature `python`)

mod native;
#[cfg(feature = "python")]
mod python;

pub use native::{NativeModule, NativeRuntime};
#[cfg(feature = "python")]
pub use python::{PythonRuntime, PythonRuntimeConfig};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

use crate::buffer::{checked_byte_length, BufferView};
use crate::dtype::{Element, ElementType};
use crate::error::{BridgeError, InitError, ResolveError, Result};

/// Exception raised inside the embedded runtime while executing a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EmbeddedException {
    message: String,
}

impl EmbeddedException {
    /// Create an exception carrying the embedded error's message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The embedded error's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Raw value returned by an embedded call, before validation.
///
/// Backends fill in whatever the embedded side produced; missing pieces stay
/// `None`. Dimensions are signed because foreign runtimes can report
/// negative sizes, which validation rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResult {
    /// Contiguous little-endian element bytes.
    pub data: Option<Vec<u8>>,
    /// Element type tag attached to the data.
    pub element_type: Option<ElementType>,
    /// Declared shape.
    pub shape: Option<Vec<i64>>,
}

impl CallResult {
    /// A fully populated result.
    #[must_use]
    pub fn new(element_type: ElementType, shape: Vec<i64>, data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            element_type: Some(element_type),
            shape: Some(shape),
        }
    }

    /// A result built from typed values.
    #[must_use]
    pub fn from_elements<T: Element>(shape: &[i64], values: &[T]) -> Self {
        Self::new(T::ELEMENT_TYPE, shape.to_vec(), T::to_le_bytes_vec(values))
    }

    /// A result copying an existing view.
    #[must_use]
    pub fn from_view(view: &BufferView<'_>) -> Self {
        let shape = view
            .shape()
            .iter()
            .map(|&dim| i64::try_from(dim).unwrap_or(i64::MAX))
            .collect();
        Self::new(view.element_type(), shape, view.as_bytes().to_vec())
    }

    /// Check the buffer contract and wrap the result as an owned view.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::MalformedResult` if the data, shape or element
    /// type is missing, a dimension is negative, the shape overflows, or the
    /// declared element count differs from the number of elements in the
    /// buffer. A malformed result is never partially decoded.
    pub fn validate(self) -> Result<BufferView<'static>> {
        let data = self
            .data
            .ok_or_else(|| BridgeError::malformed("result has no data buffer"))?;
        let shape = self
            .shape
            .ok_or_else(|| BridgeError::malformed("result has no shape"))?;
        let element_type = self
            .element_type
            .ok_or_else(|| BridgeError::malformed("result has no element type"))?;

        let dims = shape
            .iter()
            .map(|&dim| usize::try_from(dim))
            .collect::<std::result::Result<Vec<usize>, _>>()
            .map_err(|_| BridgeError::malformed(format!("negative dimension in shape {shape:?}")))?;
        let expected = checked_byte_length(&dims, element_type)
            .map_err(|_| BridgeError::malformed(format!("shape {shape:?} is not addressable")))?;

        let size = element_type.size_in_bytes();
        if data.len() % size != 0 {
            return Err(BridgeError::malformed(format!(
                "{} bytes is not a whole number of {element_type} elements",
                data.len()
            )));
        }
        if data.len() != expected {
            return Err(BridgeError::malformed(format!(
                "shape {shape:?} declares {} {element_type} elements but the buffer holds {}",
                expected / size,
                data.len() / size
            )));
        }

        BufferView::owned(element_type, &dims, data)
    }
}

/// A callable resolved inside the embedded runtime.
pub trait EmbeddedFunction: Send + Sync {
    /// Invoke with the given arguments, blocking until a result is available.
    ///
    /// Arguments are only valid for the duration of the call; implementations
    /// must copy anything they keep.
    ///
    /// # Errors
    ///
    /// Returns the embedded side's exception if execution fails.
    fn call(&self, args: &[BufferView<'_>]) -> std::result::Result<CallResult, EmbeddedException>;
}

/// Backend for an embedded scripting runtime.
pub trait EmbeddedRuntime: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Bring up the runtime environment.
    ///
    /// [`RuntimeHandle`] calls this at most once per handle.
    ///
    /// # Errors
    ///
    /// Returns `InitError` if the environment cannot be created.
    fn initialize(&self) -> std::result::Result<(), InitError>;

    /// Locate `function_name` inside `module_path`.
    ///
    /// Only called after a successful [`EmbeddedRuntime::initialize`].
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` if the module or export is missing and
    /// `ResolveError::NotCallable` if the export cannot be invoked.
    fn resolve(
        &self,
        module_path: &str,
        function_name: &str,
    ) -> std::result::Result<Arc<dyn EmbeddedFunction>, ResolveError>;
}

/// Snapshot of a [`RuntimeHandle`]'s lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeState {
    /// Initialization has not been attempted.
    Uninitialized,
    /// One caller is running the initializer.
    Initializing,
    /// The runtime is usable.
    Ready,
    /// Initialization failed; every later call reports this error.
    Failed(InitError),
}

/// Process-wide handle to an embedded runtime backend.
pub struct RuntimeHandle {
    backend: Box<dyn EmbeddedRuntime>,
    state: Mutex<RuntimeState>,
    settled: Condvar,
    ready: AtomicBool,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("backend", &self.backend.name())
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl RuntimeHandle {
    /// Wrap a backend. Nothing is initialized until first use.
    pub fn new(backend: impl EmbeddedRuntime + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            state: Mutex::new(RuntimeState::Uninitialized),
            settled: Condvar::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Name of the wrapped backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.state.lock().clone()
    }

    /// `true` once initialization has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Initialize the backend if no caller has done so yet.
    ///
    /// Idempotent and safe under concurrent first calls: one caller runs the
    /// initializer, the rest wait for it and see the same outcome. A failure
    /// is permanent for the lifetime of the handle.
    ///
    /// ## Why This Function
    ///
    /// Embedded interpreters cannot be started twice in one process, and a
    /// half-started one must not be retried. Callers on any thread can call
    /// this before each invocation; after the first success it costs one
    /// atomic load.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use rust_ai_bridge::runtime::{NativeRuntime, RuntimeHandle, RuntimeState};
    ///
    /// let handle = RuntimeHandle::new(NativeRuntime::new());
    /// assert_eq!(handle.state(), RuntimeState::Uninitialized);
    ///
    /// handle.ensure_ready()?;
    /// handle.ensure_ready()?;
    /// assert!(handle.is_ready());
    /// # Ok::<(), rust_ai_bridge::InitError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the backend's `InitError`, identical on every call.
    pub fn ensure_ready(&self) -> std::result::Result<(), InitError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut state = self.state.lock();
        loop {
            let in_progress = match &*state {
                RuntimeState::Ready => return Ok(()),
                RuntimeState::Failed(err) => return Err(err.clone()),
                RuntimeState::Initializing => true,
                RuntimeState::Uninitialized => false,
            };
            if in_progress {
                self.settled.wait(&mut state);
                continue;
            }

            *state = RuntimeState::Initializing;
            let outcome = MutexGuard::unlocked(&mut state, || self.run_initializer());
            *state = match &outcome {
                Ok(()) => RuntimeState::Ready,
                Err(err) => RuntimeState::Failed(err.clone()),
            };
            if outcome.is_ok() {
                self.ready.store(true, Ordering::Release);
            }
            self.settled.notify_all();
            return outcome;
        }
    }

    fn run_initializer(&self) -> std::result::Result<(), InitError> {
        let backend = self.backend.name();
        tracing::info!(target: "rust_ai_bridge::runtime", backend, "initializing embedded runtime");
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.backend.initialize()))
            .unwrap_or_else(|payload| {
                Err(InitError::new(format!(
                    "initializer panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match &outcome {
            Ok(()) => tracing::info!(
                target: "rust_ai_bridge::runtime",
                backend,
                elapsed_ms = started.elapsed().as_millis(),
                "embedded runtime ready"
            ),
            Err(err) => tracing::warn!(
                target: "rust_ai_bridge::runtime",
                backend,
                error = %err,
                "embedded runtime failed to initialize; no retry will be attempted"
            ),
        }
        outcome
    }

    /// Resolve a callable, initializing the runtime first if needed.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Init` if the runtime is not usable and
    /// `BridgeError::Resolve` if the export is missing or not callable.
    pub fn resolve(
        &self,
        module_path: &str,
        function_name: &str,
    ) -> Result<Arc<dyn EmbeddedFunction>> {
        self.ensure_ready()?;
        let function = self.backend.resolve(module_path, function_name)?;
        tracing::debug!(
            target: "rust_ai_bridge::runtime",
            module_path,
            function_name,
            "resolved embedded callable"
        );
        Ok(function)
    }
}

static GLOBAL_RUNTIME: OnceCell<Arc<RuntimeHandle>> = OnceCell::new();

/// Install the process-wide runtime handle.
///
/// # Errors
///
/// Returns `BridgeError::InvalidConfig` if a handle is already installed.
pub fn install_global(handle: RuntimeHandle) -> Result<Arc<RuntimeHandle>> {
    let handle = Arc::new(handle);
    GLOBAL_RUNTIME
        .set(Arc::clone(&handle))
        .map_err(|_| BridgeError::invalid_config("global embedded runtime already installed"))?;
    Ok(handle)
}

/// The process-wide runtime handle, if one was installed.
#[must_use]
pub fn global() -> Option<Arc<RuntimeHandle>> {
    GLOBAL_RUNTIME.get().cloned()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
