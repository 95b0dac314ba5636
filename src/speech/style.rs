//! Voice style descriptors
//!
//! A style conditions the engine to sound like a particular voice. Its
//! content is opaque to the pipeline: it is loaded once per voice change,
//! shared read-only between requests, and handed back to the engine as is.

use crate::{Result, SynthError};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct StyleData {
    path: PathBuf,
    data: serde_json::Value,
}

/// Shared, immutable handle to a loaded style
///
/// Cloning is cheap. The underlying descriptor is dropped once the last
/// request holding it has finished.
#[derive(Clone)]
pub struct StyleHandle(Arc<StyleData>);

impl StyleHandle {
    pub fn new(path: impl Into<PathBuf>, data: serde_json::Value) -> Self {
        Self(Arc::new(StyleData {
            path: path.into(),
            data,
        }))
    }

    /// File the style was loaded from
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Raw descriptor, for engines that need it
    pub fn data(&self) -> &serde_json::Value {
        &self.0.data
    }

    /// True if both handles refer to the same loaded instance
    pub fn same_instance(&self, other: &StyleHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for StyleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleHandle")
            .field("path", &self.0.path)
            .finish_non_exhaustive()
    }
}

/// Loads style descriptors from disk
pub trait StyleLoader: Send + Sync {
    fn load_style(&self, path: &Path) -> Result<StyleHandle>;
}

/// Loader for the JSON style files shipped with the model
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStyleLoader;

impl StyleLoader for JsonStyleLoader {
    fn load_style(&self, path: &Path) -> Result<StyleHandle> {
        if !path.exists() {
            return Err(SynthError::Asset(format!(
                "Voice file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let data: serde_json::Value = serde_json::from_str(&contents)?;
        if !data.is_object() {
            return Err(SynthError::Asset(format!(
                "Voice file is not a JSON object: {}",
                path.display()
            )));
        }

        debug!("Loaded style from {:?}", path);
        Ok(StyleHandle::new(path, data))
    }
}
