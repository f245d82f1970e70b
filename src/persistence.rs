use crate::error::PanelResult;
use crate::types::TemplateBlob;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::info;

/// Local storage for the most recently generated templates
pub trait TemplateStore: Send + Sync {
    /// Replace the stored templates
    fn store(&self, templates: &[TemplateBlob]) -> PanelResult<()>;

    fn load(&self) -> PanelResult<Vec<TemplateBlob>>;
}

/// Templates kept as a JSON array in a single file
pub struct JsonTemplateStore {
    path: PathBuf,
}

impl JsonTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateStore for JsonTemplateStore {
    fn store(&self, templates: &[TemplateBlob]) -> PanelResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(templates)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("Stored {} template(s) in {}", templates.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> PanelResult<Vec<TemplateBlob>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<Vec<TemplateBlob>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn store(&self, templates: &[TemplateBlob]) -> PanelResult<()> {
        *self.templates.write() = templates.to_vec();
        Ok(())
    }

    fn load(&self) -> PanelResult<Vec<TemplateBlob>> {
        Ok(self.templates.read().clone())
    }
}
