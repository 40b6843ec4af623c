/// Extension of the append-only log holding the runs of one series
pub const SERIES_FILE_EXTENSION: &str = "jsonl";

/// Extension of the lock file serializing writers of one series
pub const LOCK_FILE_EXTENSION: &str = "lock";
