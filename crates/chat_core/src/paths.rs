use std::path::PathBuf;

/// Branchchat data directory (~/.branchchat)
pub fn branchchat_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".branchchat")
}

/// Path of the user-level config.json
pub fn config_json_path() -> PathBuf {
    branchchat_dir().join("config.json")
}

/// Default directory for persisted conversations
pub fn conversations_dir() -> PathBuf {
    branchchat_dir().join("conversations")
}
