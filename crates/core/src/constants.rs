//! Constants used throughout the checkpost core crate.

/// Filename of the YAML record snapshot inside the configured data directory.
pub const SNAPSHOT_FILENAME: &str = "records.yaml";

/// Temporary filename the snapshot is written to before being renamed into place.
pub const SNAPSHOT_TMP_FILENAME: &str = "records.yaml.tmp";

/// Page size used by listings when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Search parameter that matches every record.
pub const MATCH_ALL: &str = "*";

/// Date format for a person's date of birth.
pub const DATE_OF_BIRTH_FORMAT: &str = "%Y-%m-%d";
