// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Operation name → embedded target mapping.
//!
//! The registry is assembled once through [`RegistryBuilder`] and is
//! immutable afterwards, so lookups need no synchronization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Module path used by [`OperationRegistry::with_defaults`] when nothing else
/// is configured.
pub const DEFAULT_MODULE_PATH: &str = "zeta_engine";

/// Embedded target and arity of one named operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Name callers invoke the operation by.
    pub operation_name: String,
    /// Module containing the implementation.
    pub module_path: String,
    /// Exported function implementing the operation.
    pub function_name: String,
    /// Number of buffer arguments the function takes.
    pub expected_argument_count: usize,
}

impl OperationDescriptor {
    /// Create a descriptor.
    pub fn new(
        operation_name: impl Into<String>,
        module_path: impl Into<String>,
        function_name: impl Into<String>,
        expected_argument_count: usize,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            module_path: module_path.into(),
            function_name: function_name.into(),
            expected_argument_count,
        }
    }

    /// `module_path.function_name`, used in errors and logs.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_path, self.function_name)
    }
}

/// Immutable set of operation descriptors keyed by operation name.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The host's default operations, targeting `module_path`.
    ///
    /// | operation         | function           | arity |
    /// |-------------------|--------------------|-------|
    /// | `quantize`        | `quantize_latents` | 1     |
    /// | `cross-attention` | `cross_attention`  | 2     |
    /// | `alignment`       | `measure_alignment`| 2     |
    #[must_use]
    pub fn with_defaults(module_path: &str) -> Self {
        let mut operations = HashMap::new();
        for descriptor in default_descriptors(module_path) {
            operations.insert(descriptor.operation_name.clone(), descriptor);
        }
        Self { operations }
    }

    /// Parse a JSON array of descriptors.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Json` for malformed JSON and
    /// `BridgeError::InvalidConfig` for empty or duplicate names.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptors: Vec<OperationDescriptor> = serde_json::from_str(json)?;
        descriptors
            .into_iter()
            .try_fold(Self::builder(), RegistryBuilder::register)
            .map(RegistryBuilder::build)
    }

    /// Exact-match lookup.
    #[must_use]
    pub fn lookup(&self, operation_name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(operation_name)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// `true` if no operation is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Serialize the descriptors as a JSON array, sorted by operation name.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let descriptors: Vec<&OperationDescriptor> = self
            .operation_names()
            .into_iter()
            .filter_map(|name| self.lookup(name))
            .collect();
        Ok(serde_json::to_string_pretty(&descriptors)?)
    }
}

fn default_descriptors(module_path: &str) -> [OperationDescriptor; 3] {
    [
        OperationDescriptor::new("quantize", module_path, "quantize_latents", 1),
        OperationDescriptor::new("cross-attention", module_path, "cross_attention", 2),
        OperationDescriptor::new("alignment", module_path, "measure_alignment", 2),
    ]
}

/// Builder for [`OperationRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    operations: HashMap<String, OperationDescriptor>,
}

impl RegistryBuilder {
    /// Add the default operations targeting `module_path`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if a default name is already
    /// registered.
    pub fn with_defaults(self, module_path: &str) -> Result<Self> {
        default_descriptors(module_path)
            .into_iter()
            .try_fold(self, Self::register)
    }

    /// Add one descriptor.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if any name is empty or the
    /// operation is already registered.
    pub fn register(mut self, descriptor: OperationDescriptor) -> Result<Self> {
        if descriptor.operation_name.is_empty() {
            return Err(BridgeError::invalid_config("operation name must not be empty"));
        }
        if descriptor.module_path.is_empty() || descriptor.function_name.is_empty() {
            return Err(BridgeError::invalid_config(format!(
                "operation {} needs a module path and a function name",
                descriptor.operation_name
            )));
        }
        if self.operations.contains_key(&descriptor.operation_name) {
            return Err(BridgeError::invalid_config(format!(
                "operation {} registered twice",
                descriptor.operation_name
            )));
        }
        self.operations
            .insert(descriptor.operation_name.clone(), descriptor);
        Ok(self)
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> OperationRegistry {
        OperationRegistry {
            operations: self.operations,
        }
    }
}
