//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup (binaries read the
//! environment) and then passed into core services as an `Arc<CoreConfig>`.
//! Nothing in the core reads environment variables while serving a request.

use crate::constants::{DEFAULT_PAGE_SIZE, SNAPSHOT_FILENAME};
use crate::error::{CheckpostError, CheckpostResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: Option<PathBuf>,
    services_file: Option<PathBuf>,
    default_page_size: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `data_dir` of `None` keeps every record in memory only. A `services_file`,
    /// when given, must be an existing file.
    ///
    /// # Errors
    ///
    /// Returns `CheckpostError::InvalidInput` if `default_page_size` is zero or
    /// `services_file` does not exist.
    pub fn new(
        data_dir: Option<PathBuf>,
        services_file: Option<PathBuf>,
        default_page_size: usize,
    ) -> CheckpostResult<Self> {
        if default_page_size == 0 {
            return Err(CheckpostError::InvalidInput(
                "default page size must be greater than zero".into(),
            ));
        }

        if let Some(file) = &services_file {
            if !file.is_file() {
                return Err(CheckpostError::InvalidInput(format!(
                    "services file does not exist: {}",
                    file.display()
                )));
            }
        }

        Ok(Self {
            data_dir,
            services_file,
            default_page_size,
        })
    }

    /// An in-memory configuration with default paging, mostly for tests and tooling.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            services_file: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Location of the record snapshot, if records are persisted.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(SNAPSHOT_FILENAME))
    }

    pub fn services_file(&self) -> Option<&Path> {
        self.services_file.as_deref()
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }
}

/// Parse the default page size from an optional environment value.
///
/// `None` or a blank value yields [`DEFAULT_PAGE_SIZE`].
pub fn page_size_from_env_value(value: Option<String>) -> CheckpostResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) | Err(_) => Err(CheckpostError::InvalidInput(format!(
                "page size must be a positive integer, got '{raw}'"
            ))),
            Ok(size) => Ok(size),
        },
    }
}
