//! File names & defaults shared by the stores and the scripts

/// The default location of the address book, relative to the working directory
pub const DEFAULT_ADDRESS_BOOK_PATH: &str = "addresses.json";

/// The name of the release manifest file within a release directory
pub const RELEASE_MANIFEST_FILE: &str = "deployed.json";

/// The name of the release metadata file within a release directory
pub const RELEASE_METADATA_FILE: &str = "index.yml";

/// The placeholder shown in place of a field missing from a deployment record
pub const UNKNOWN_ADDRESS: &str = "unknown";
