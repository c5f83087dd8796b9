// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Bridge configuration with environment variable overrides.
//!
//! ## Environment Variables
//!
//! - `RUST_AI_BRIDGE_MODULE` - Module path the default operations target
//! - `RUST_AI_BRIDGE_OPERATIONS` - Path to a JSON file of extra operation
//!   descriptors
//! - `RUST_AI_BRIDGE_NO_CACHE` - Set to `1` or `true` to resolve the embedded
//!   callable on every invocation
//!
//! ## Example
//!
//! ```rust
//! use rust_ai_bridge::{BridgeConfig, OperationDescriptor, ValidatableConfig};
//!
//! let config = BridgeConfig::new()
//!     .with_module_path("moe_engine")
//!     .with_operation(OperationDescriptor::new("blend", "moe_engine", "blend_experts", 3));
//! config.validate()?;
//!
//! let registry = config.build_registry()?;
//! assert!(registry.lookup("quantize").is_some());
//! assert!(registry.lookup("blend").is_some());
//! # Ok::<(), rust_ai_bridge::BridgeError>(())
//! ```

use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::registry::{OperationDescriptor, OperationRegistry, DEFAULT_MODULE_PATH};

/// Configuration validation trait.
///
/// Configuration structs implement this so constructors can reject bad
/// parameters before any runtime work starts.
///
/// # Example
///
/// ```rust
/// use rust_ai_bridge::{BridgeError, Result, ValidatableConfig};
///
/// #[derive(Clone)]
/// struct ExpertConfig {
///     num_experts: usize,
/// }
///
/// impl ValidatableConfig for ExpertConfig {
///     fn validate(&self) -> Result<()> {
///         if self.num_experts == 0 {
///             return Err(BridgeError::invalid_config("num_experts must be > 0"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ValidatableConfig: Clone + Send + Sync {
    /// Validate the configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` if validation fails.
    fn validate(&self) -> Result<()>;
}

/// Configuration for a [`crate::Bridge`].
///
/// # Fields
///
/// - `module_path`: Module the default operations target
/// - `default_operations`: Register `quantize`, `cross-attention` and `alignment`
/// - `operations`: Extra descriptors registered after the defaults
/// - `operations_file`: JSON array of descriptors registered last
/// - `cache_callables`: Reuse resolved callables across invocations
/// - `min_rank`: Minimum rank of decoded results
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Module path the default operations target.
    pub module_path: String,
    /// Whether the default operations are registered.
    pub default_operations: bool,
    /// Additional operation descriptors.
    pub operations: Vec<OperationDescriptor>,
    /// JSON file of additional descriptors.
    pub operations_file: Option<PathBuf>,
    /// Cache resolved callables.
    pub cache_callables: bool,
    /// Minimum rank accepted when decoding results.
    pub min_rank: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module_path: DEFAULT_MODULE_PATH.to_string(),
            default_operations: true,
            operations: Vec::new(),
            operations_file: None,
            cache_callables: true,
            min_rank: 0,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module path of the default operations.
    #[must_use]
    pub fn with_module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = module_path.into();
        self
    }

    /// Enable or disable the default operations.
    #[must_use]
    pub fn with_default_operations(mut self, enable: bool) -> Self {
        self.default_operations = enable;
        self
    }

    /// Register an additional operation.
    #[must_use]
    pub fn with_operation(mut self, descriptor: OperationDescriptor) -> Self {
        self.operations.push(descriptor);
        self
    }

    /// Load additional operations from a JSON file.
    #[must_use]
    pub fn with_operations_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.operations_file = Some(path.into());
        self
    }

    /// Enable or disable the resolved-callable cache.
    #[must_use]
    pub fn with_cache(mut self, enable: bool) -> Self {
        self.cache_callables = enable;
        self
    }

    /// Require decoded results to have at least `min_rank` dimensions.
    #[must_use]
    pub fn with_min_rank(mut self, min_rank: usize) -> Self {
        self.min_rank = min_rank;
        self
    }

    /// Build configuration from environment variables.
    ///
    /// Unset variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(module_path) = std::env::var("RUST_AI_BRIDGE_MODULE") {
            if !module_path.is_empty() {
                config.module_path = module_path;
            }
        }

        if let Ok(path) = std::env::var("RUST_AI_BRIDGE_OPERATIONS") {
            if !path.is_empty() {
                config.operations_file = Some(PathBuf::from(path));
            }
        }

        if let Ok(val) = std::env::var("RUST_AI_BRIDGE_NO_CACHE") {
            if val == "1" || val.to_lowercase() == "true" {
                config.cache_callables = false;
            }
        }

        config
    }

    /// Assemble the operation registry.
    ///
    /// Defaults come first, then `operations`, then the file.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidConfig` for invalid or duplicate
    /// descriptors, `BridgeError::Io` if the file cannot be read and
    /// `BridgeError::Json` if it is not a descriptor array.
    pub fn build_registry(&self) -> Result<OperationRegistry> {
        self.validate()?;

        let mut builder = OperationRegistry::builder();
        if self.default_operations {
            builder = builder.with_defaults(&self.module_path)?;
        }
        for descriptor in &self.operations {
            builder = builder.register(descriptor.clone())?;
        }
        if let Some(path) = &self.operations_file {
            let json = std::fs::read_to_string(path)?;
            let descriptors: Vec<OperationDescriptor> = serde_json::from_str(&json)?;
            tracing::debug!(
                target: "rust_ai_bridge::dispatch",
                path = %path.display(),
                count = descriptors.len(),
                "loaded operation descriptors"
            );
            for descriptor in descriptors {
                builder = builder.register(descriptor)?;
            }
        }

        Ok(builder.build())
    }
}

impl ValidatableConfig for BridgeConfig {
    fn validate(&self) -> Result<()> {
        if self.default_operations && self.module_path.trim().is_empty() {
            return Err(BridgeError::invalid_config("module_path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.module_path, DEFAULT_MODULE_PATH);
        assert!(config.cache_callables);
        assert_eq!(config.min_rank, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = BridgeConfig::new()
            .with_module_path("engine")
            .with_cache(false)
            .with_min_rank(1)
            .with_default_operations(false);
        assert_eq!(config.module_path, "engine");
        assert!(!config.cache_callables);
        assert_eq!(config.min_rank, 1);
        assert!(config.build_registry().unwrap().is_empty());
    }

    #[test]
    fn test_empty_module_path_rejected() {
        let err = BridgeConfig::new().with_module_path(" ").validate().unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let config = BridgeConfig::new()
            .with_operation(OperationDescriptor::new("quantize", "other", "q", 1));
        assert!(matches!(
            config.build_registry(),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_operations_file() {
        let path = std::env::temp_dir().join(format!(
            "rust_ai_bridge_ops_{}.json",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"[{{"operation_name": "route", "module_path": "moe",
                "function_name": "route_tokens", "expected_argument_count": 2}}]"#
        )
        .unwrap();
        drop(file);

        let registry = BridgeConfig::new()
            .with_operations_file(path.clone())
            .build_registry()
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lookup("route").unwrap().module_path, "moe");
    }

    #[test]
    fn test_missing_operations_file() {
        let err = BridgeConfig::new()
            .with_operations_file("/nonexistent/rust_ai_bridge/ops.json")
            .build_registry()
            .unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
