use crate::error::{Result, SportError};
use std::fs;
use std::path::{Path, PathBuf};

const SERVICE_NAME: &str = "sport-toolkit";

/// Somewhere a serialized token lives between runs.
/// The clients only need to read it and write a refreshed one back.
pub trait TokenStore {
    fn get_access_token(&self) -> Result<String>;
    fn store_access_token(&self, token: &str) -> Result<()>;
    /// Human readable location, for messages
    fn describe(&self) -> String;
}

/// Token kept in a local file, readable only by the owner
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl TokenStore for FileTokenStore {
    fn get_access_token(&self) -> Result<String> {
        if !self.path.exists() {
            return Err(SportError::config(format!(
                "Token file not found: {}",
                self.path.display()
            )));
        }
        Ok(fs::read_to_string(&self.path)?)
    }

    fn store_access_token(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            super::ensure_dir(parent)?;
        }
        fs::write(&self.path, token)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Token kept in the system keyring under the `sport-toolkit` service
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE_NAME, &self.account)
            .map_err(|e| SportError::Keyring(e.to_string()))
    }
}

impl TokenStore for KeyringTokenStore {
    fn get_access_token(&self) -> Result<String> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(token),
            Err(keyring::Error::NoEntry) => Err(SportError::config(format!(
                "No token stored in keyring for {}",
                self.account
            ))),
            Err(e) => Err(SportError::Keyring(e.to_string())),
        }
    }

    fn store_access_token(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .map_err(|e| SportError::Keyring(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("keyring {}/{}", SERVICE_NAME, self.account)
    }
}

/// Fixed token, for tests and replayed sessions. Storing is a no-op.
pub struct StaticTokenStore {
    token: String,
}

impl StaticTokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenStore for StaticTokenStore {
    fn get_access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn store_access_token(&self, _token: &str) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "static token".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(temp_dir.path().join("nested").join("token.json"));
        assert!(!store.exists());

        store.store_access_token(r#"{"access_token": "abc"}"#).unwrap();
        assert!(store.exists());
        assert_eq!(store.get_access_token().unwrap(), r#"{"access_token": "abc"}"#);
        assert!(store.describe().contains("token.json"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(temp_dir.path().join("token.json"));
        store.store_access_token("secret").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(temp_dir.path().join("absent.json"));
        let err = store.get_access_token().unwrap_err();
        assert!(matches!(err, SportError::Config(ref m) if m.contains("absent.json")));
    }

    #[test]
    fn test_static_store_ignores_writes() {
        let store = StaticTokenStore::new("fixed");
        store.store_access_token("other").unwrap();
        assert_eq!(store.get_access_token().unwrap(), "fixed");
    }
}
