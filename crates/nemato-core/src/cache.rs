//! Single-entry result cache.
//!
//! Expensive, frequently repeated computations (plane-wave stacks, window
//! masks) are memoised in a [`ResultCache`]. Each cache remembers only the
//! most recent call: a miss discards the stored entry before the new result
//! is stored. Arguments are compared through [`ArgKey`] fingerprints, where
//! scalars compare by bit pattern and arrays by dtype, shape and contents.

use std::sync::{Arc, Mutex, MutexGuard};

use ndarray::ArrayViewD;
use num_complex::Complex64;

/// Fingerprint of one call argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Float(u64),
    Int(i64),
    Bool(bool),
    Str(String),
    Array {
        dtype: &'static str,
        shape: Vec<usize>,
        bits: Vec<u64>,
    },
    /// Argument absent (`None`).
    Absent,
}

impl ArgKey {
    /// Fingerprint a real array by shape and contents.
    pub fn real_array(a: &ArrayViewD<'_, f64>) -> Self {
        ArgKey::Array {
            dtype: "f8",
            shape: a.shape().to_vec(),
            bits: a.iter().map(|v| v.to_bits()).collect(),
        }
    }

    /// Fingerprint a complex array by shape and contents.
    pub fn complex_array(a: &ArrayViewD<'_, Complex64>) -> Self {
        ArgKey::Array {
            dtype: "c16",
            shape: a.shape().to_vec(),
            bits: a
                .iter()
                .flat_map(|v| [v.re.to_bits(), v.im.to_bits()])
                .collect(),
        }
    }
}

impl From<f64> for ArgKey {
    fn from(v: f64) -> Self {
        ArgKey::Float(v.to_bits())
    }
}

impl From<usize> for ArgKey {
    fn from(v: usize) -> Self {
        ArgKey::Int(v as i64)
    }
}

impl From<i64> for ArgKey {
    fn from(v: i64) -> Self {
        ArgKey::Int(v)
    }
}

impl From<bool> for ArgKey {
    fn from(v: bool) -> Self {
        ArgKey::Bool(v)
    }
}

impl From<&str> for ArgKey {
    fn from(v: &str) -> Self {
        ArgKey::Str(v.to_string())
    }
}

impl<T: Into<ArgKey>> From<Option<T>> for ArgKey {
    fn from(v: Option<T>) -> Self {
        v.map_or(ArgKey::Absent, Into::into)
    }
}

type Entry<V> = (Vec<ArgKey>, Arc<V>);

/// Memoises the most recent result of one function.
pub struct ResultCache<V> {
    name: &'static str,
    entry: Mutex<Option<Entry<V>>>,
}

impl<V> ResultCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // A poisoned lock only means a previous computation panicked; the stored
    // entry is either complete or absent.
    fn lock(&self) -> MutexGuard<'_, Option<Entry<V>>> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the stored result for `args`, or compute, store and return it.
    ///
    /// With `enabled == false` the cache is bypassed entirely and left
    /// untouched.
    pub fn get_or_compute<E, F>(&self, enabled: bool, args: Vec<ArgKey>, f: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !enabled {
            return f().map(Arc::new);
        }
        {
            let mut entry = self.lock();
            if let Some((key, value)) = entry.as_ref() {
                if *key == args {
                    log::trace!("{}: cache hit", self.name);
                    return Ok(Arc::clone(value));
                }
            }
            *entry = None;
        }
        log::trace!("{}: cache miss", self.name);
        let value = Arc::new(f()?);
        *self.lock() = Some((args, Arc::clone(&value)));
        Ok(value)
    }

    /// Whether a result for exactly `args` is stored.
    pub fn is_cached(&self, args: &[ArgKey]) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|(key, _)| key.as_slice() == args)
    }

    /// Drop the stored entry.
    pub fn clear(&self) {
        *self.lock() = None;
    }
}
