//! Configuration and the per-call environment
//!
//! [`WrapConfig`] is loaded once (TOML file, then `FSLOUTPUTTYPE`).
//! [`Environment`] is the value threaded through every compile and resolve
//! call: it carries the configured output type and a working directory that
//! is sampled once and then held fixed.

use crate::error::{Result, WrapError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the configured image file type
pub const OUTPUT_TYPE_ENV: &str = "FSLOUTPUTTYPE";

/// Image file type written by the native tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputType {
    Nifti,
    NiftiGz,
    NiftiPair,
    NiftiPairGz,
    Analyze,
    AnalyzeGz,
}

impl OutputType {
    /// File extension, including the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            OutputType::Nifti => ".nii",
            OutputType::NiftiGz => ".nii.gz",
            OutputType::NiftiPair | OutputType::Analyze => ".img",
            OutputType::NiftiPairGz | OutputType::AnalyzeGz => ".img.gz",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::Nifti => "NIFTI",
            OutputType::NiftiGz => "NIFTI_GZ",
            OutputType::NiftiPair => "NIFTI_PAIR",
            OutputType::NiftiPairGz => "NIFTI_PAIR_GZ",
            OutputType::Analyze => "ANALYZE",
            OutputType::AnalyzeGz => "ANALYZE_GZ",
        }
    }
}

impl Default for OutputType {
    fn default() -> Self {
        OutputType::Nifti
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = WrapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NIFTI" => Ok(OutputType::Nifti),
            "NIFTI_GZ" => Ok(OutputType::NiftiGz),
            "NIFTI_PAIR" => Ok(OutputType::NiftiPair),
            "NIFTI_PAIR_GZ" => Ok(OutputType::NiftiPairGz),
            "ANALYZE" => Ok(OutputType::Analyze),
            "ANALYZE_GZ" => Ok(OutputType::AnalyzeGz),
            other => Err(WrapError::InvalidConfig(format!(
                "unknown output type '{}'",
                other
            ))),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapConfig {
    /// Native tool settings
    pub fsl: FslSettings,

    /// Statistical package settings
    pub spm: SpmSettings,
}

impl WrapConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image output type
    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.fsl.output_type = output_type;
        self
    }

    /// Set the interpreter command line for scripts
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.spm.interpreter = interpreter.into();
        self
    }

    /// Add a directory to the interpreter search path
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spm.paths.push(path.into());
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `FSLOUTPUTTYPE` from the process environment, if set
    pub fn apply_env(self) -> Result<Self> {
        match std::env::var(OUTPUT_TYPE_ENV) {
            Ok(value) => self.apply_output_type_var(&value),
            Err(_) => Ok(self),
        }
    }

    fn apply_output_type_var(mut self, value: &str) -> Result<Self> {
        if !value.trim().is_empty() {
            self.fsl.output_type = value.parse()?;
        }
        Ok(self)
    }
}

/// Native tool settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FslSettings {
    /// Image file type for derived output names
    pub output_type: OutputType,
}

/// Statistical package settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpmSettings {
    /// Command used to run generated scripts
    pub interpreter: String,

    /// File name for the generated script in the working directory
    pub script_name: String,

    /// Directories added to the interpreter search path
    pub paths: Vec<PathBuf>,
}

impl Default for SpmSettings {
    fn default() -> Self {
        Self {
            interpreter: "matlab -nodesktop -nosplash".to_string(),
            script_name: "neurowrap_script.m".to_string(),
            paths: Vec::new(),
        }
    }
}

/// Explicit context for one compile or resolve call
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    cwd: PathBuf,
    output_type: OutputType,
}

impl Environment {
    /// Sample the process working directory once
    pub fn capture(config: &WrapConfig) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::with_cwd(config, cwd))
    }

    /// Use an explicit working directory
    pub fn with_cwd(config: &WrapConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            output_type: config.fsl.output_type,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Extension for images written by native tools
    pub fn extension(&self) -> &'static str {
        self.output_type.extension()
    }
}
