//! Saved model structure
//!
//! After estimation the statistical package records the files it wrote (beta
//! images, contrast and statistic images) in its model structure. The shipped
//! reader consumes a JSON export of that structure written next to the model
//! file (`SPM.json` beside `SPM.mat`); other readers plug in through
//! [`ModelStructureReader`].

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Images written for one contrast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastImages {
    pub name: String,
    pub con_file: PathBuf,
    pub stat_file: PathBuf,
}

/// The parts of the model structure output resolution needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStructure {
    #[serde(default)]
    pub beta_files: Vec<PathBuf>,
    #[serde(default)]
    pub contrasts: Vec<ContrastImages>,
}

impl ModelStructure {
    /// Beta images, joined onto the model directory
    pub fn beta_images(&self, dir: &Path) -> Vec<PathBuf> {
        self.beta_files.iter().map(|f| dir.join(f)).collect()
    }

    /// Contrast images of every contrast, in definition order
    pub fn con_images(&self, dir: &Path) -> Vec<PathBuf> {
        self.contrasts.iter().map(|c| dir.join(&c.con_file)).collect()
    }

    /// Statistic images of every contrast, in definition order
    pub fn stat_images(&self, dir: &Path) -> Vec<PathBuf> {
        self.contrasts.iter().map(|c| dir.join(&c.stat_file)).collect()
    }
}

/// Source of model structures
pub trait ModelStructureReader: Send + Sync {
    /// Read the structure saved at `model_file`
    fn read(&self, model_file: &Path) -> Result<ModelStructure>;
}

/// Reads `<model>.json` next to the model file
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelReader;

impl JsonModelReader {
    pub fn export_path(model_file: &Path) -> PathBuf {
        model_file.with_extension("json")
    }
}

impl ModelStructureReader for JsonModelReader {
    fn read(&self, model_file: &Path) -> Result<ModelStructure> {
        let export = Self::export_path(model_file);
        let read = || -> Result<ModelStructure> {
            let content = std::fs::read_to_string(&export)?;
            Ok(serde_json::from_str(&content)?)
        };
        read().with_context(|| format!("Reading model structure {}", export.display()))
    }
}
