//! Line database collaborators. A databank delivers a validated
//! [`LineStore`] together with the partition-function data of its
//! isotopologues; parsing of vendor formats happens upstream.

use super::{IsotopologueId, LineStore, LineStoreError};
use crate::levels::EnergyLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Partition-function data shipped with a databank for one isotopologue.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PartitionSourceSpec {
    Tabulated {
        temperatures: Vec<f64>,
        values: Vec<f64>,
    },
    Levels {
        levels: Vec<EnergyLevel>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PartitionEntry {
    pub isotope: IsotopologueId,
    pub source: PartitionSourceSpec,
}

/// On-disk/in-memory unit delivered by a databank.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabankFile {
    pub store: LineStore,
    #[serde(default)]
    pub partition: Vec<PartitionEntry>,
}

impl DatabankFile {
    pub fn partition_source(&self, isotope: IsotopologueId) -> Option<&PartitionSourceSpec> {
        self.partition
            .iter()
            .find(|entry| entry.isotope == isotope)
            .map(|entry| &entry.source)
    }

    /// Keeps only the requested isotopologues.
    pub fn restrict(self, isotopes: &[IsotopologueId]) -> Result<Self, LineStoreError> {
        let Self { store, partition } = self;
        let groups = store
            .groups()
            .iter()
            .filter(|group| isotopes.contains(&group.id))
            .cloned()
            .collect();
        let store = LineStore::new(
            store.molecule,
            store.database,
            store.reference_temperature,
            groups,
        )?;
        let partition = partition
            .into_iter()
            .filter(|entry| isotopes.contains(&entry.isotope))
            .collect();
        Ok(Self { store, partition })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabankRequest {
    pub name: String,
    pub isotopes: Option<Vec<IsotopologueId>>,
}

impl DatabankRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isotopes: None,
        }
    }

    pub fn with_isotopes(mut self, isotopes: Vec<IsotopologueId>) -> Self {
        self.isotopes = Some(isotopes);
        self
    }
}

pub trait Databank {
    /// Loads the named databank. Absence is reported as
    /// [`LineStoreError::DatabankNotFound`].
    fn load(&self, request: &DatabankRequest) -> Result<DatabankFile, LineStoreError>;

    /// Like [`Databank::load`], but maps a missing databank to `None` when
    /// `skip_missing` is set. Other failures still propagate.
    fn load_databank_or_skip(
        &self,
        request: &DatabankRequest,
        skip_missing: bool,
    ) -> Result<Option<DatabankFile>, LineStoreError> {
        match self.load(request) {
            Ok(file) => Ok(Some(file)),
            Err(LineStoreError::DatabankNotFound { name }) if skip_missing => {
                tracing::warn!(databank = %name, "databank not found, skipping");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

fn apply_request(file: DatabankFile, request: &DatabankRequest) -> Result<DatabankFile, LineStoreError> {
    match &request.isotopes {
        Some(isotopes) => file.restrict(isotopes),
        None => Ok(file),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabank {
    entries: BTreeMap<String, DatabankFile>,
}

impl InMemoryDatabank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, file: DatabankFile) {
        self.entries.insert(name.into(), file);
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl Databank for InMemoryDatabank {
    fn load(&self, request: &DatabankRequest) -> Result<DatabankFile, LineStoreError> {
        let file = self
            .entries
            .get(&request.name)
            .cloned()
            .ok_or_else(|| LineStoreError::DatabankNotFound {
                name: request.name.clone(),
            })?;
        apply_request(file, request)
    }
}

/// Directory of `<name>.json` files holding serialized [`DatabankFile`]s.
#[derive(Debug, Clone)]
pub struct JsonDatabankDirectory {
    root: PathBuf,
}

impl JsonDatabankDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn write(&self, name: &str, file: &DatabankFile) -> Result<PathBuf, LineStoreError> {
        let path = self.path_for(name);
        let unreadable = |message: String| LineStoreError::Unreadable {
            name: name.to_string(),
            message,
        };
        let json = serde_json::to_string_pretty(file).map_err(|error| unreadable(error.to_string()))?;
        fs::create_dir_all(&self.root).map_err(|error| unreadable(error.to_string()))?;
        fs::write(&path, json).map_err(|error| unreadable(error.to_string()))?;
        Ok(path)
    }
}

impl Databank for JsonDatabankDirectory {
    fn load(&self, request: &DatabankRequest) -> Result<DatabankFile, LineStoreError> {
        let path = self.path_for(&request.name);
        if !path.is_file() {
            return Err(LineStoreError::DatabankNotFound {
                name: request.name.clone(),
            });
        }
        let file = read_databank_file(&path, &request.name)?;
        apply_request(file, request)
    }
}

/// Reads and validates one serialized databank.
pub fn read_databank_file(path: &Path, name: &str) -> Result<DatabankFile, LineStoreError> {
    let unreadable = |message: String| LineStoreError::Unreadable {
        name: name.to_string(),
        message,
    };
    let source = fs::read_to_string(path)
        .map_err(|error| unreadable(format!("{}: {error}", path.display())))?;
    let DatabankFile { store, partition } = serde_json::from_str(&source)
        .map_err(|error| unreadable(format!("{}: {error}", path.display())))?;
    Ok(DatabankFile {
        store: store.validated()?,
        partition,
    })
}
