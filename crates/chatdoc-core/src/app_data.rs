//! Where ChatDoc stores its own data (config).
//!
//! Documents stay wherever the user keeps them; the index lives only in memory.

use std::path::PathBuf;

/// Returns the directory where ChatDoc stores its config.
/// On macOS: `~/Library/Application Support/ChatDoc/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "ChatDoc", "ChatDoc")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.is_dir());
            assert!(dir.to_string_lossy().to_lowercase().contains("chatdoc"));
        }
    }
}
