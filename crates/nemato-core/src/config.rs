//! Engine configuration.
//!
//! [`Config`] replaces process-wide numeric settings: it is an immutable value
//! passed by reference into batch and field operations and read once per call.
//! Values are assembled from defaults, an optional user file
//! (`~/.nemato/nemato.toml`) and `NEMATO_*` environment variables.
//!
//! ```toml
//! precision = "double"   # "single" | "double"
//! num_threads = 8
//! parallel = true
//! cache = true
//! betamax = 0.8
//! backend = "auto"       # "auto" | "cpu" | "sequential"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nemato_compute::{ComputeBackend, CpuBackend, SequentialBackend};

/// Name of the per-user configuration directory inside `$HOME`.
pub const CONFIG_DIR: &str = ".nemato";
/// Name of the configuration file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "nemato.toml";

/// Errors raised while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported value '{value}' for '{key}' (expected one of: {expected})")]
    Unsupported {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compute backend error: {0}")]
    Backend(#[from] nemato_compute::ComputeError),
}

/// Floating-point precision of produced field data.
///
/// All arithmetic runs in `f64`; single precision rounds validated data
/// through `f32` and stores `.dtmf` arrays as `complex64`/`float32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
}

impl Precision {
    /// Round a value to this precision.
    pub fn round(self, value: f64) -> f64 {
        match self {
            Precision::Single => value as f32 as f64,
            Precision::Double => value,
        }
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "float32" => Ok(Precision::Single),
            "double" | "float64" => Ok(Precision::Double),
            _ => Err(ConfigError::Unsupported {
                key: "precision".into(),
                value: s.into(),
                expected: "single, double",
            }),
        }
    }
}

/// Which compute backend batch operations run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Rayon pool when `parallel` is set and more than one thread is
    /// configured, sequential otherwise.
    #[default]
    Auto,
    Cpu,
    Sequential,
}

impl FromStr for BackendChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendChoice::Auto),
            "cpu" | "rayon" => Ok(BackendChoice::Cpu),
            "sequential" => Ok(BackendChoice::Sequential),
            _ => Err(ConfigError::Unsupported {
                key: "backend".into(),
                value: s.into(),
                expected: "auto, cpu, sequential",
            }),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Auto => write!(f, "auto"),
            BackendChoice::Cpu => write!(f, "cpu"),
            BackendChoice::Sequential => write!(f, "sequential"),
        }
    }
}

/// Engine settings read at the start of every batch or field operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub precision: Precision,
    /// Worker threads of the CPU backend.
    pub num_threads: usize,
    /// Allow the parallel backend at all.
    pub parallel: bool,
    /// Enable the single-entry result caches.
    pub cache: bool,
    /// Default evanescent cutoff for propagation.
    pub betamax: f64,
    pub backend: BackendChoice,
}

fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precision: Precision::Double,
            num_threads: available_threads(),
            parallel: true,
            cache: true,
            betamax: 0.8,
            backend: BackendChoice::Auto,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Unsupported {
            key: key.into(),
            value: value.into(),
            expected: "true, false, 1, 0",
        }),
    }
}

impl Config {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.checked()
    }

    /// Load a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then `~/.nemato/nemato.toml` if present, then environment.
    ///
    /// Failing to create the configuration directory only disables the user
    /// file; a present but malformed file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match user_config_path() {
            Some(path) if path.is_file() => {
                log::debug!("Reading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `NEMATO_*` overrides obtained through `lookup`.
    ///
    /// Recognised variables: `NEMATO_DOUBLE_PRECISION`,
    /// `NEMATO_TARGET_PARALLEL`, `NEMATO_CACHE`, `NEMATO_NUM_THREADS`,
    /// `NEMATO_BACKEND`, `NEMATO_BETAMAX`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("NEMATO_DOUBLE_PRECISION") {
            self.precision = if parse_bool("NEMATO_DOUBLE_PRECISION", &v)? {
                Precision::Double
            } else {
                Precision::Single
            };
        }
        for (var, key) in [
            ("NEMATO_TARGET_PARALLEL", "parallel"),
            ("NEMATO_CACHE", "cache"),
            ("NEMATO_NUM_THREADS", "num_threads"),
            ("NEMATO_BACKEND", "backend"),
            ("NEMATO_BETAMAX", "betamax"),
        ] {
            if let Some(v) = lookup(var) {
                self.set(key, &v)?;
            }
        }
        Ok(())
    }

    /// Set a single key from its textual value, rejecting unsupported values
    /// immediately.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let unsupported = |expected: &'static str| ConfigError::Unsupported {
            key: key.into(),
            value: value.into(),
            expected,
        };
        match key {
            "precision" => self.precision = value.parse()?,
            "backend" => self.backend = value.parse()?,
            "parallel" => self.parallel = parse_bool(key, value)?,
            "cache" => self.cache = parse_bool(key, value)?,
            "num_threads" => {
                self.num_threads = value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| unsupported("a positive integer"))?
            }
            "betamax" => {
                self.betamax = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|b| b.is_finite() && *b > 0.0)
                    .ok_or_else(|| unsupported("a positive number"))?
            }
            other => return Err(ConfigError::UnknownKey(other.into())),
        }
        Ok(())
    }

    /// Reject settings no setter would accept.
    pub fn checked(self) -> Result<Self, ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::Unsupported {
                key: "num_threads".into(),
                value: "0".into(),
                expected: "a positive integer",
            });
        }
        if !(self.betamax.is_finite() && self.betamax > 0.0) {
            return Err(ConfigError::Unsupported {
                key: "betamax".into(),
                value: self.betamax.to_string(),
                expected: "a positive number",
            });
        }
        Ok(self)
    }

    /// Build the compute backend selected by this configuration.
    pub fn backend(&self) -> Result<Arc<dyn ComputeBackend>, ConfigError> {
        let parallel = match self.backend {
            BackendChoice::Sequential => false,
            BackendChoice::Cpu => self.parallel,
            BackendChoice::Auto => self.parallel && self.num_threads > 1,
        };
        if parallel {
            log::debug!("Backend: CPU ({} threads)", self.num_threads);
            Ok(Arc::new(CpuBackend::with_threads(self.num_threads)?))
        } else {
            log::debug!("Backend: sequential");
            Ok(Arc::new(SequentialBackend))
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .find(|p| p.is_dir())
}

/// Path of the user configuration file, creating its directory if needed.
///
/// Returns `None` (with a warning) when no home directory exists or the
/// directory cannot be created.
pub fn user_config_path() -> Option<PathBuf> {
    let Some(home) = home_dir() else {
        log::warn!("No home directory found; user configuration disabled");
        return None;
    };
    let dir = home.join(CONFIG_DIR);
    if !dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!(
                "Could not create {}: {}; user configuration disabled",
                dir.display(),
                e
            );
            return None;
        }
    }
    Some(dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("precision = \"single\"\ncache = false\n").unwrap();
        assert_eq!(config.precision, Precision::Single);
        assert!(!config.cache);
        assert_eq!(config.betamax, 0.8);
        assert_eq!(config.backend, BackendChoice::Auto);
    }

    #[test]
    fn test_unknown_values_rejected_on_parse() {
        assert!(matches!(
            Config::from_toml_str("precision = \"quad\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(Config::from_toml_str("fftlib = \"mkl\"").is_err());
        assert!(Config::from_toml_str("num_threads = 0").is_err());
    }

    #[test]
    fn test_set_rejects_unsupported_values_immediately() {
        let mut config = Config::default();
        let err = config.set("backend", "cuda").unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { ref key, .. } if key == "backend"));
        assert!(err.to_string().contains("cuda"));
        assert!(matches!(config.set("nthreads", "4"), Err(ConfigError::UnknownKey(_))));
        assert!(config.set("betamax", "-1").is_err());
        // A rejected set leaves the previous value in place.
        assert_eq!(config.backend, BackendChoice::Auto);

        config.set("precision", "Single").unwrap();
        assert_eq!(config.precision, Precision::Single);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEMATO_DOUBLE_PRECISION", "0"),
            ("NEMATO_TARGET_PARALLEL", "1"),
            ("NEMATO_NUM_THREADS", "3"),
            ("NEMATO_CACHE", "off"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.precision, Precision::Single);
        assert_eq!(config.num_threads, 3);
        assert!(config.parallel);
        assert!(!config.cache);

        let mut config = Config::default();
        assert!(config
            .apply_env(|k| (k == "NEMATO_TARGET_PARALLEL").then(|| "maybe".to_string()))
            .is_err());
    }

    #[test]
    fn test_backend_selection() {
        let mut config = Config {
            backend: BackendChoice::Sequential,
            ..Default::default()
        };
        let backend = config.backend().unwrap();
        assert_eq!(
            backend.device_info().backend_type,
            nemato_compute::BackendType::Sequential
        );

        config.backend = BackendChoice::Cpu;
        config.num_threads = 2;
        let backend = config.backend().unwrap();
        assert_eq!(backend.device_info().worker_threads, 2);

        config.backend = BackendChoice::Auto;
        config.num_threads = 1;
        assert_eq!(
            config.backend().unwrap().device_info().backend_type,
            nemato_compute::BackendType::Sequential
        );
    }

    #[test]
    fn test_precision_rounding() {
        let x = 0.1_f64;
        assert_eq!(Precision::Double.round(x), x);
        assert_ne!(Precision::Single.round(x), x);
        assert_eq!(Precision::Single.round(x), 0.1_f32 as f64);
    }
}
