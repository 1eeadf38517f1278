//! API key resolution and storage
//!
//! The live endpoint requires one secret. Resolution order: the
//! `GEMINI_API_KEY` environment variable, then the OS keyring, then a
//! restricted-permission fallback file for systems without a usable
//! keyring. Absence is a hard session-start failure; there is no
//! anonymous mode.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Environment variable consulted first
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const SERVICE_NAME: &str = "woosh-live";
const API_KEY_USER: &str = "gemini-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Read the key from the environment only
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn api_key_from_keyring() -> Option<String> {
    let entry = keyring::Entry::new(SERVICE_NAME, API_KEY_USER).ok()?;
    entry.get_password().ok().filter(|key| !key.is_empty())
}

fn api_key_from_file() -> Option<String> {
    let path = api_key_file_path().ok()?;
    let key = fs::read_to_string(path).ok()?;
    let key = key.trim().to_string();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Resolve the API key from any configured source
pub fn resolve_api_key() -> Option<String> {
    api_key_from_env()
        .or_else(api_key_from_keyring)
        .or_else(api_key_from_file)
}

/// Whether any source currently holds a key
pub fn is_configured() -> bool {
    resolve_api_key().is_some()
}

/// Store the key: keyring first, file as backup in case keyring retrieval
/// fails later.
pub fn set_api_key(key: &str) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USER) {
        if entry.set_password(key).is_ok() {
            let _ = save_to_file(key);
            return Ok(());
        }
    }

    save_to_file(key)?;
    println!("Note: using file-based storage (keyring unavailable)");
    Ok(())
}

/// Remove the key from the keyring and the fallback file
pub fn delete_api_key() -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, API_KEY_USER) {
        let _ = entry.delete_credential();
    }

    let path = api_key_file_path()?;
    if path.exists() {
        fs::remove_file(&path).context("failed to delete API key file")?;
    }
    Ok(())
}

fn save_to_file(key: &str) -> Result<()> {
    let path = api_key_file_path()?;
    fs::write(&path, key).context("failed to write API key file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("failed to set API key file permissions")?;
    }

    Ok(())
}

fn api_key_file_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "woosh-live", "woosh-live")
        .context("failed to resolve project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("failed to create config directory")?;
    Ok(dir.join(API_KEY_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is kept to this single test to avoid races with
    // parallel test threads.
    #[test]
    fn test_env_resolution() {
        std::env::remove_var(API_KEY_ENV);
        assert_eq!(api_key_from_env(), None);

        std::env::set_var(API_KEY_ENV, "  test-key-123  ");
        assert_eq!(api_key_from_env().as_deref(), Some("test-key-123"));

        std::env::set_var(API_KEY_ENV, "   ");
        assert_eq!(api_key_from_env(), None, "blank keys do not count");

        std::env::remove_var(API_KEY_ENV);
    }
}
