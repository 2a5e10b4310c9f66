//! Access to the compiled contract artifacts.
//!
//! Artifacts follow the Hardhat layout: `<root>/**/<Name>.json` holds the ABI &
//! bytecode, and the sibling `<Name>.dbg.json` points at the compiler build
//! info under `<root>/build-info`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    constants::{ARTIFACT_EXTENSION, BUILD_INFO_DIR, DEBUG_ARTIFACT_SUFFIX},
    errors::ScriptError,
};

/// The compilation output for a single contract
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The name of the contract
    pub contract_name: String,
    /// The path of the source file the contract is defined in
    pub source_name: String,
    /// The contract ABI, as raw JSON fragments
    pub abi: Vec<Value>,
    /// The creation bytecode, empty for abstract contracts & interfaces
    #[serde(default)]
    pub bytecode: Bytes,
}

impl Artifact {
    /// The fully qualified name of the contract, `<source>:<name>`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Parse the ABI into its typed form
    pub fn json_abi(&self) -> Result<JsonAbi, ScriptError> {
        serde_json::from_value(Value::Array(self.abi.clone()))
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", self.contract_name)))
    }
}

/// The compiler input & version a contract was built with
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// The full compiler version, e.g. `0.8.9+commit.e5eed63a`
    pub solc_long_version: String,
    /// The standard JSON input given to the compiler
    pub input: Value,
    /// The whole build info document, as submitted for bytecode verification
    #[serde(skip)]
    pub raw: Value,
}

/// A source of compiled contract artifacts
pub trait ArtifactSource {
    /// Read the artifact of the named contract
    fn read_artifact(&self, contract: &str) -> Result<Artifact, ScriptError>;

    /// Read the build info the named contract was compiled in
    fn read_build_info(&self, contract: &str) -> Result<BuildInfo, ScriptError>;
}

/// The pointer from a debug artifact to its build info
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugArtifact {
    /// The path of the build info, relative to the debug artifact
    build_info: PathBuf,
}

/// Artifacts read from a Hardhat artifacts directory
#[derive(Clone, Debug)]
pub struct HardhatArtifacts {
    /// The root of the artifacts directory
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Read artifacts from the directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the artifact file of the named contract
    fn find_artifact(&self, contract: &str) -> Result<PathBuf, ScriptError> {
        let file_name = format!("{contract}.{ARTIFACT_EXTENSION}");
        let mut matches = Vec::new();
        collect_files(&self.root, &file_name, &mut matches)?;

        match matches.len() {
            0 => Err(ScriptError::ArtifactParsing(format!(
                "no artifact found for {contract} under {}",
                self.root.display()
            ))),
            1 => Ok(matches.remove(0)),
            _ => Err(ScriptError::ArtifactParsing(format!(
                "multiple artifacts found for {contract}: {}",
                matches.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn read_artifact(&self, contract: &str) -> Result<Artifact, ScriptError> {
        let path = self.find_artifact(contract)?;
        read_json(&path)
    }

    fn read_build_info(&self, contract: &str) -> Result<BuildInfo, ScriptError> {
        let artifact_path = self.find_artifact(contract)?;
        let debug_path = artifact_path.with_file_name(format!("{contract}{DEBUG_ARTIFACT_SUFFIX}"));
        let debug: DebugArtifact = read_json(&debug_path)?;

        let dir = artifact_path.parent().unwrap_or(self.root.as_path());
        let build_info_path = dir.join(debug.build_info);

        let raw: Value = read_json(&build_info_path)?;
        let mut build_info: BuildInfo = serde_json::from_value(raw.clone()).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{}: {e}", build_info_path.display()))
        })?;
        build_info.raw = raw;

        Ok(build_info)
    }
}

/// Recursively collect the files named `file_name` under `dir`,
/// skipping the build info directory
fn collect_files(dir: &Path, file_name: &str, out: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", dir.display())))?;

    for entry in entries {
        let path = entry
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?
            .path();

        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == BUILD_INFO_DIR) {
                continue;
            }
            collect_files(&path, file_name, out)?;
        } else if path.file_name().is_some_and(|name| name == file_name) {
            out.push(path);
        }
    }

    Ok(())
}

/// Read & parse a JSON file
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ScriptError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))
}
