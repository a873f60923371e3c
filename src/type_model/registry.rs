use super::{Annotation, ClassInfo, MetadataProvider};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A serialized metadata dump, as produced by a build-time reflection step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataDump {
    /// Package name to package-level annotations
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<Annotation>>,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
}

/// In-memory metadata provider
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, ClassInfo>,
    packages: BTreeMap<String, Vec<Annotation>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class, normalizing its type variables. A class with the same
    /// name replaces the earlier one.
    pub fn insert(&mut self, mut class: ClassInfo) {
        class.normalize();
        debug!("Registering class {}", class.name);
        if let Some(previous) = self.classes.insert(class.name.clone(), class) {
            warn!("Duplicate class definition {}, keeping the last one", previous.name);
        }
    }

    /// Add package-level annotations
    pub fn annotate_package(&mut self, package: impl Into<String>, annotations: Vec<Annotation>) {
        self.packages
            .entry(package.into())
            .or_default()
            .extend(annotations);
    }

    pub fn merge_dump(&mut self, dump: MetadataDump) {
        for (package, annotations) in dump.packages {
            self.annotate_package(package, annotations);
        }
        for class in dump.classes {
            self.insert(class);
        }
    }

    pub fn merge(&mut self, other: ClassRegistry) {
        for (package, annotations) in other.packages {
            self.annotate_package(package, annotations);
        }
        for (_, class) in other.classes {
            self.insert(class);
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let dump: MetadataDump = serde_yaml::from_str(content)?;
        let mut registry = Self::new();
        registry.merge_dump(dump);
        Ok(registry)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let dump: MetadataDump = serde_json::from_str(content)?;
        let mut registry = Self::new();
        registry.merge_dump(dump);
        Ok(registry)
    }

    /// Load a metadata dump file; the format follows the file extension
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        debug!("Loading metadata dump {}", path.display());
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let dump: MetadataDump = if is_json {
            serde_json::from_str(&content).map_err(|e| Error::Parse {
                file: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| Error::Parse {
                file: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        self.merge_dump(dump);
        Ok(())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Export the registry back into the dump format
    pub fn to_dump(&self) -> MetadataDump {
        MetadataDump {
            packages: self.packages.clone(),
            classes: self.classes.values().cloned().collect(),
        }
    }
}

impl MetadataProvider for ClassRegistry {
    fn find_class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    fn classes(&self) -> Vec<&ClassInfo> {
        self.classes.values().collect()
    }

    fn package_annotations(&self, package: &str) -> &[Annotation] {
        self.packages
            .get(package)
            .map(|a| a.as_slice())
            .unwrap_or(&[])
    }
}
