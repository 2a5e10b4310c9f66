//! File-backed stores for the address book & the release manifest.
//!
//! Every write is a full read-modify-write of the backing JSON file. There is
//! no locking: two processes updating the same file concurrently race, and the
//! last writer wins. Callers that need stronger guarantees should serialize
//! their calls to [`AddressBookStore::update`] / [`ReleaseStore::update`].

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    constants::{RELEASE_MANIFEST_FILE, RELEASE_METADATA_FILE},
    errors::StoreError,
    types::{AddressBook, DeploymentRecord, ReleaseManifest, ReleaseMetadata},
};

// ----------------
// | Address Book |
// ----------------

/// The durable address book, keyed by chain ID & contract name
#[derive(Clone, Debug)]
pub struct AddressBookStore {
    /// The path of the backing JSON file
    path: PathBuf,
}

impl AddressBookStore {
    /// Create a store backed by the file at `path`.
    ///
    /// The file need not exist; it is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole address book, empty if the file does not exist yet
    pub fn load(&self) -> Result<AddressBook, StoreError> {
        let book: AddressBook = read_json_or_default(&self.path)?;
        book.validate().map_err(|reason| schema_error(&self.path, reason))?;
        Ok(book)
    }

    /// Get the record for a contract on a chain
    pub fn get(&self, chain_id: u64, contract: &str) -> Result<DeploymentRecord, StoreError> {
        self.load()?.get(chain_id, contract)
    }

    /// Read the address book, apply `f` to it & persist the result.
    ///
    /// Nothing is written if `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut AddressBook) -> Result<T, StoreError>,
    {
        let mut book = self.load()?;
        let res = f(&mut book)?;
        write_json(&self.path, &book)?;
        Ok(res)
    }

    /// Merge a partial record into the entry for a contract on a chain,
    /// returning the merged record
    pub fn upsert(
        &self,
        chain_id: u64,
        contract: &str,
        partial: &DeploymentRecord,
    ) -> Result<DeploymentRecord, StoreError> {
        self.update(|book| book.upsert(chain_id, contract, partial))
    }
}

// --------------------
// | Release Manifest |
// --------------------

/// The release-scoped manifest of touched contracts, plus the release metadata.
///
/// A store with no release scope configured reads as empty & ignores writes.
#[derive(Clone, Debug, Default)]
pub struct ReleaseStore {
    /// The path of the manifest JSON file, if a release is in scope
    manifest_path: Option<PathBuf>,
    /// The path of the metadata YAML file, if a release is in scope
    metadata_path: Option<PathBuf>,
}

impl ReleaseStore {
    /// Create a store for the release directory at `release_path`,
    /// or an unscoped store if there is none
    pub fn new(release_path: Option<&Path>) -> Self {
        match release_path {
            Some(dir) => Self {
                manifest_path: Some(dir.join(RELEASE_MANIFEST_FILE)),
                metadata_path: Some(dir.join(RELEASE_METADATA_FILE)),
            },
            None => Self::default(),
        }
    }

    /// Read the manifest from `path` instead of the release directory
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Read the records accumulated by the current release.
    ///
    /// Empty if no release is in scope or nothing was recorded yet.
    pub fn list_manifest(&self) -> Result<ReleaseManifest, StoreError> {
        let Some(path) = &self.manifest_path else {
            return Ok(ReleaseManifest::default());
        };

        let manifest: ReleaseManifest = read_json_or_default(path)?;
        manifest.validate().map_err(|reason| schema_error(path, reason))?;
        Ok(manifest)
    }

    /// Read the manifest, apply `f` to it & persist the result.
    ///
    /// Returns `None` without calling `f` if no release is in scope.
    pub fn update<T, F>(&self, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut ReleaseManifest) -> Result<T, StoreError>,
    {
        let Some(path) = &self.manifest_path else {
            return Ok(None);
        };

        let mut manifest = self.list_manifest()?;
        let res = f(&mut manifest)?;
        write_json(path, &manifest)?;
        Ok(Some(res))
    }

    /// Merge a partial record into the manifest entry for a contract
    pub fn upsert(
        &self,
        contract: &str,
        partial: &DeploymentRecord,
    ) -> Result<Option<DeploymentRecord>, StoreError> {
        self.update(|manifest| manifest.upsert(contract, partial))
    }

    /// Read the release metadata, if a release is in scope & it has any
    pub fn read_metadata(&self) -> Result<Option<ReleaseMetadata>, StoreError> {
        let Some(path) = &self.metadata_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let contents = read_file(path)?;
        // An empty YAML document parses as null
        let metadata: Option<ReleaseMetadata> = serde_yaml::from_str(&contents)
            .map_err(|e| schema_error(path, e.to_string()))?;
        Ok(metadata)
    }
}

// ---------------
// | Both Stores |
// ---------------

/// The pair of stores every deployment is written to
#[derive(Clone, Debug)]
pub struct DeploymentStores {
    /// The durable address book
    pub address_book: AddressBookStore,
    /// The release-scoped manifest
    pub release: ReleaseStore,
}

impl DeploymentStores {
    /// Bundle an address book & a release store
    pub fn new(address_book: AddressBookStore, release: ReleaseStore) -> Self {
        Self { address_book, release }
    }

    /// Record a deployment in the release manifest (if a release is in scope)
    /// and in the address book, returning the merged address book record
    pub fn write_deploy(
        &self,
        chain_id: u64,
        contract: &str,
        partial: &DeploymentRecord,
    ) -> Result<DeploymentRecord, StoreError> {
        self.release.upsert(contract, partial)?;
        let record = self.address_book.upsert(chain_id, contract, partial)?;
        debug!(contract, chain_id, ?record, "recorded deployment");

        Ok(record)
    }
}

// -----------
// | Helpers |
// -----------

/// Read a file into a string
fn read_file(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|e| StoreError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse a JSON file, or return the default value if it does not exist
fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }

    let contents = read_file(path)?;
    serde_json::from_str(&contents).map_err(|e| schema_error(path, e.to_string()))
}

/// Pretty-print a value as JSON into a file, creating parent directories.
///
/// The contents go to a sibling temporary file first, which is then renamed
/// over `path`; an interrupted write leaves the previous contents in place.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |reason: String| StoreError::Write {
        path: path.display().to_string(),
        reason,
    };

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
            parent
        },
        None => Path::new("."),
    };

    let contents = serde_json::to_string_pretty(value).map_err(|e| write_err(e.to_string()))?;
    let mut file = NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    file.write_all(contents.as_bytes()).map_err(|e| write_err(e.to_string()))?;
    file.persist(path).map_err(|e| write_err(e.error.to_string()))?;

    Ok(())
}

/// Build a schema error for the given file
fn schema_error(path: &Path, reason: String) -> StoreError {
    StoreError::Schema {
        path: path.display().to_string(),
        reason,
    }
}
