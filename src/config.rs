//! Runtime configuration and the process-wide default backend choice.
//!
//! The default is a plain value set once at startup (or read from the
//! environment on first use); it is only consulted by
//! [`AnyBackend::from_default`](crate::algs::backend::AnyBackend::from_default).
//! Array handles and dispatchers always receive their backend explicitly.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshWorkletError;

/// Environment variable selecting the backend (`serial` or `rayon`).
pub const BACKEND_ENV: &str = "MESH_WORKLET_BACKEND";
/// Environment variable selecting the multi-core thread count.
pub const THREADS_ENV: &str = "MESH_WORKLET_THREADS";

static DEFAULT_CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

/// Which execution backend to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Serial,
    Rayon,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "rayon") {
            BackendKind::Rayon
        } else {
            BackendKind::Serial
        }
    }
}

impl BackendKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Some(BackendKind::Serial),
            "rayon" | "parallel" => Some(BackendKind::Rayon),
            _ => None,
        }
    }
}

/// Configuration of the execution runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Backend used by [`AnyBackend::from_config`](crate::algs::backend::AnyBackend::from_config).
    pub backend: BackendKind,
    /// Dedicated worker count for the multi-core backend; `None` uses the
    /// global pool.
    pub num_threads: Option<usize>,
}

impl RuntimeConfig {
    pub fn serial() -> Self {
        Self {
            backend: BackendKind::Serial,
            num_threads: None,
        }
    }

    /// Defaults overridden by [`BACKEND_ENV`] and [`THREADS_ENV`].
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(BACKEND_ENV) {
            match BackendKind::parse(&raw) {
                Some(kind) => cfg.backend = kind,
                None => log::warn!("ignoring {BACKEND_ENV}={raw:?}: expected `serial` or `rayon`"),
            }
        }
        if let Ok(raw) = std::env::var(THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => cfg.num_threads = Some(n),
                _ => log::warn!("ignoring {THREADS_ENV}={raw:?}: expected a positive integer"),
            }
        }
        cfg
    }
}

/// Set the process-wide default configuration. Only the first call succeeds.
pub fn set_default(config: RuntimeConfig) -> Result<(), MeshWorkletError> {
    DEFAULT_CONFIG
        .set(config)
        .map_err(|_| MeshWorkletError::ConfigAlreadySet)
}

/// The process-wide default configuration; falls back to
/// [`RuntimeConfig::from_env`] (and pins it) if none was set.
pub fn default_config() -> RuntimeConfig {
    DEFAULT_CONFIG.get_or_init(RuntimeConfig::from_env).clone()
}
