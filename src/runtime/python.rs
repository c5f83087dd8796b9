// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Embedded `CPython` backend.
//!
//! Initialization starts the interpreter, extends `sys.path` and runs an
//! optional prelude in `__main__`. Resolution imports the module and looks up
//! the attribute.
//!
//! # Argument Convention
//!
//! Every argument is passed to the Python callable as a dict:
//!
//! ```python
//! {"data": b"...", "shape": [2, 2], "dtype": "f32", "dtype_tag": 0}
//! ```
//!
//! The callable returns a mapping with `data` (`bytes`, `bytearray` or any
//! object with `tobytes()`), `shape` (list of ints) and `dtype` (wire tag or
//! dtype name). Coroutines are run to completion on a fresh event loop.
//!
//! ```python
//! def quantize_latents(x):
//!     return {"data": x["data"], "shape": x["shape"], "dtype": x["dtype_tag"]}
//! ```

#![allow(clippy::needless_pass_by_value)] // PyO3 conversion traits take owned values

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::{PyByteArray, PyBytes, PyDict, PyList, PyTuple};

use super::{CallResult, EmbeddedException, EmbeddedFunction, EmbeddedRuntime};
use crate::buffer::BufferView;
use crate::config::ValidatableConfig;
use crate::dtype::ElementType;
use crate::error::{BridgeError, InitError, ResolveError, Result};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Interpreter setup for [`PythonRuntime`].
#[derive(Debug, Clone, Default)]
pub struct PythonRuntimeConfig {
    /// Directories prepended to `sys.path`, in order.
    pub search_paths: Vec<PathBuf>,
    /// Source executed in `__main__` after the paths are set.
    pub prelude: Option<String>,
}

impl PythonRuntimeConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a directory to `sys.path`.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Run `source` once the interpreter is up.
    #[must_use]
    pub fn with_prelude(mut self, source: impl Into<String>) -> Self {
        self.prelude = Some(source.into());
        self
    }
}

impl ValidatableConfig for PythonRuntimeConfig {
    fn validate(&self) -> Result<()> {
        if self.search_paths.iter().any(|path| path.as_os_str().is_empty()) {
            return Err(BridgeError::invalid_config("search path must not be empty"));
        }
        if self.prelude.as_deref().is_some_and(|source| source.trim().is_empty()) {
            return Err(BridgeError::invalid_config("prelude must not be blank"));
        }
        Ok(())
    }
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Embedded runtime backed by a `CPython` interpreter.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    config: PythonRuntimeConfig,
}

impl PythonRuntime {
    /// Create a backend from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: PythonRuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Interpreter configuration.
    #[must_use]
    pub fn config(&self) -> &PythonRuntimeConfig {
        &self.config
    }
}

impl EmbeddedRuntime for PythonRuntime {
    fn name(&self) -> &str {
        "python"
    }

    fn initialize(&self) -> std::result::Result<(), InitError> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyResult<()> {
            let sys_path = py
                .import_bound("sys")?
                .getattr("path")?
                .downcast_into::<PyList>()?;
            for (index, path) in self.config.search_paths.iter().enumerate() {
                sys_path.insert(index, path.to_string_lossy().into_owned())?;
            }
            if let Some(prelude) = &self.config.prelude {
                py.run_bound(prelude, None, None)?;
            }
            Ok(())
        })
        .map_err(|err| InitError::new(err.to_string()))
    }

    fn resolve(
        &self,
        module_path: &str,
        function_name: &str,
    ) -> std::result::Result<Arc<dyn EmbeddedFunction>, ResolveError> {
        Python::with_gil(|py| {
            let not_found =
                |err: PyErr| ResolveError::not_found(module_path, function_name, err.to_string());
            let module = py.import_bound(module_path).map_err(not_found)?;
            let attribute = module.getattr(function_name).map_err(not_found)?;
            if !attribute.is_callable() {
                return Err(ResolveError::not_callable(module_path, function_name));
            }
            let function: Arc<dyn EmbeddedFunction> = Arc::new(PythonFunction {
                qualified_name: format!("{module_path}.{function_name}"),
                callable: attribute.unbind(),
            });
            Ok(function)
        })
    }
}

// =============================================================================
// CALLS
// =============================================================================

struct PythonFunction {
    qualified_name: String,
    callable: Py<PyAny>,
}

impl EmbeddedFunction for PythonFunction {
    fn call(&self, args: &[BufferView<'_>]) -> std::result::Result<CallResult, EmbeddedException> {
        Python::with_gil(|py| -> PyResult<CallResult> {
            let marshalled = args
                .iter()
                .map(|view| marshal_view(py, view))
                .collect::<PyResult<Vec<_>>>()?;
            let mut result = self
                .callable
                .bind(py)
                .call1(PyTuple::new_bound(py, marshalled))?;

            let awaitable = py
                .import_bound("inspect")?
                .call_method1("isawaitable", (result.clone(),))?
                .is_truthy()?;
            if awaitable {
                tracing::debug!(
                    target: "rust_ai_bridge::runtime",
                    function = %self.qualified_name,
                    "driving awaitable result"
                );
                result = run_to_completion(py, result)?;
            }

            Ok(unmarshal_result(&result))
        })
        .map_err(|err| EmbeddedException::new(err.to_string()))
    }
}

fn marshal_view<'py>(py: Python<'py>, view: &BufferView<'_>) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("data", PyBytes::new_bound(py, view.as_bytes()))?;
    dict.set_item("shape", view.shape().to_vec())?;
    dict.set_item("dtype", view.element_type().name())?;
    dict.set_item("dtype_tag", view.element_type().tag())?;
    Ok(dict)
}

fn run_to_completion<'py>(
    py: Python<'py>,
    awaitable: Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let event_loop = py.import_bound("asyncio")?.call_method0("new_event_loop")?;
    let outcome = event_loop.call_method1("run_until_complete", (awaitable,));
    event_loop.call_method0("close")?;
    outcome
}

/// Missing or unconvertible fields stay `None`; validation reports them.
fn unmarshal_result(result: &Bound<'_, PyAny>) -> CallResult {
    let item = |key: &str| result.get_item(key).ok().filter(|value| !value.is_none());

    CallResult {
        data: item("data").and_then(|value| extract_bytes(&value)),
        element_type: item("dtype").and_then(|value| extract_element_type(&value)),
        shape: item("shape").and_then(|value| value.extract::<Vec<i64>>().ok()),
    }
}

fn extract_bytes(value: &Bound<'_, PyAny>) -> Option<Vec<u8>> {
    if let Ok(bytes) = value.downcast::<PyBytes>() {
        return Some(bytes.as_bytes().to_vec());
    }
    if let Ok(bytes) = value.downcast::<PyByteArray>() {
        return Some(bytes.to_vec());
    }
    let exported = value.call_method0("tobytes").ok()?;
    exported
        .downcast::<PyBytes>()
        .ok()
        .map(|bytes| bytes.as_bytes().to_vec())
}

fn extract_element_type(value: &Bound<'_, PyAny>) -> Option<ElementType> {
    if let Ok(tag) = value.extract::<u8>() {
        return ElementType::from_tag(tag).ok();
    }
    value
        .extract::<String>()
        .ok()
        .and_then(|name| ElementType::parse(&name).ok())
}
