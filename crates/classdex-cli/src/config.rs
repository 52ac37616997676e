//! Generate-run configuration: TOML file plus command-line overrides

use anyhow::{bail, Context, Result};
use classdex_core::names::parse_base_classes;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FRAGMENT_DIR: &str = "META-INF/io/github/absketches/plugin/";
pub const DEFAULT_OUTPUT_FILE: &str = "services.properties";
pub const REFLECT_CONFIG_FILE: &str = "reflect-config.json";

/// Settings for one `classdex generate` run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Compiled output of the module being analyzed
    pub classes_dir: PathBuf,

    /// Binary dependencies; only `.jar` files are read
    pub dependencies: Vec<PathBuf>,

    /// Base types as dotted names; entries may themselves be comma-separated
    pub base_classes: Vec<String>,

    /// File name of the emitted index inside the fragment directory
    pub output_file: String,

    /// Archive directory holding precomputed fragments, also where the index is written
    pub fragment_dir: String,

    /// Trust dependency fragments that cover every base instead of rescanning
    pub use_precomputed: bool,

    /// Emit `reflect-config.json` for native-image
    pub reflect_config: bool,

    /// Extra dotted class names added to the reflection manifest
    pub reflected_classes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            classes_dir: PathBuf::from("target/classes"),
            dependencies: Vec::new(),
            base_classes: Vec::new(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            fragment_dir: DEFAULT_FRAGMENT_DIR.to_string(),
            use_precomputed: true,
            reflect_config: true,
            reflected_classes: Vec::new(),
            group_id: None,
            artifact_id: None,
        }
    }
}

impl GenerateConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Reject settings that cannot produce the requested outputs
    pub fn validate(&self) -> Result<()> {
        if self.output_file.trim().is_empty() || self.output_file.contains(['/', '\\']) {
            bail!("output_file must be a plain file name, got {:?}", self.output_file);
        }
        if self.reflect_config && (self.group_id.is_none() || self.artifact_id.is_none()) {
            bail!(
                "{} generation needs group_id and artifact_id (or disable it with reflect_config = false)",
                REFLECT_CONFIG_FILE
            );
        }
        Ok(())
    }

    /// Configured bases in internal form, first occurrence wins
    pub fn base_internal_names(&self) -> Vec<String> {
        let unique: IndexSet<String> = self
            .base_classes
            .iter()
            .flat_map(|entry| parse_base_classes(entry))
            .collect();
        unique.into_iter().collect()
    }

    /// Extra reflected classes in dotted form
    pub fn reflected_class_names(&self) -> Vec<String> {
        self.reflected_classes
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.replace('/', "."))
            .collect()
    }

    /// Fragment directory as an archive path prefix ending in `/`
    pub fn fragment_prefix(&self) -> String {
        let trimmed = self.fragment_dir.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.classes_dir
            .join(self.fragment_prefix())
            .join(&self.output_file)
    }

    pub fn reflect_config_path(&self) -> Result<PathBuf> {
        let (Some(group_id), Some(artifact_id)) = (&self.group_id, &self.artifact_id) else {
            bail!("{} needs group_id and artifact_id", REFLECT_CONFIG_FILE);
        };
        Ok(self
            .classes_dir
            .join("META-INF/native-image")
            .join(group_id)
            .join(artifact_id)
            .join(REFLECT_CONFIG_FILE))
    }
}

/// Command-line values layered over a loaded [`GenerateConfig`]
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub classes_dir: Option<PathBuf>,
    pub dependencies: Vec<PathBuf>,
    /// Platform path-list of dependencies, as found in a classpath variable
    pub classpath: Option<String>,
    pub base_classes: Option<String>,
    pub output_file: Option<String>,
    pub fragment_dir: Option<String>,
    pub no_precomputed: bool,
    pub no_reflect_config: bool,
    pub reflected_classes: Option<String>,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut GenerateConfig) {
        if let Some(classes_dir) = self.classes_dir {
            config.classes_dir = classes_dir;
        }
        config.dependencies.extend(self.dependencies);
        if let Some(classpath) = self.classpath {
            config.dependencies.extend(
                std::env::split_paths(&classpath).filter(|path| !path.as_os_str().is_empty()),
            );
        }
        if let Some(base_classes) = self.base_classes {
            config.base_classes = vec![base_classes];
        }
        if let Some(output_file) = self.output_file {
            config.output_file = output_file;
        }
        if let Some(fragment_dir) = self.fragment_dir {
            config.fragment_dir = fragment_dir;
        }
        if self.no_precomputed {
            config.use_precomputed = false;
        }
        if self.no_reflect_config {
            config.reflect_config = false;
        }
        if let Some(reflected_classes) = self.reflected_classes {
            config.reflected_classes = vec![reflected_classes];
        }
        if self.group_id.is_some() {
            config.group_id = self.group_id;
        }
        if self.artifact_id.is_some() {
            config.artifact_id = self.artifact_id;
        }
    }
}
