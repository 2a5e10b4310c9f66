//! Provenance of a release: the commit deployed from & the repository it lives in

use std::process::Command;

use crate::{constants::GIT_COMMAND, errors::ScriptError};

/// A source of version control information about the working tree
pub trait ProvenanceProvider {
    /// The hash of the commit checked out
    fn commit_hash(&self) -> Result<String, ScriptError>;

    /// The URL of the repository's origin remote
    fn remote_url(&self) -> Result<String, ScriptError>;
}

/// A [`ProvenanceProvider`] shelling out to `git` in the current directory
#[derive(Clone, Copy, Debug, Default)]
pub struct GitProvenance;

impl ProvenanceProvider for GitProvenance {
    fn commit_hash(&self) -> Result<String, ScriptError> {
        let mut cmd = Command::new(GIT_COMMAND);
        cmd.args(["log", "-1", "--format=%H"]);
        command_output_or(cmd, "could not read the current commit")
    }

    fn remote_url(&self) -> Result<String, ScriptError> {
        let mut cmd = Command::new(GIT_COMMAND);
        cmd.args(["config", "--get", "remote.origin.url"]);
        command_output_or(cmd, "could not read the origin remote URL")
    }
}

/// Run a command, returning its trimmed stdout on success
/// or an error with the given message otherwise
fn command_output_or(mut cmd: Command, err_msg: &str) -> Result<String, ScriptError> {
    let output = cmd
        .output()
        .map_err(|e| ScriptError::Provenance(format!("{err_msg}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScriptError::Provenance(format!("{err_msg}: {}", stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
