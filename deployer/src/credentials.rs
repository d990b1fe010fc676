//! Persistence of an account's private key and address between runs.
use std::{fs, io::ErrorKind, path::PathBuf};

use alloy::primitives::Address;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    config::{PRIVATE_KEY, SMART_ACCOUNT_ADDRESS},
    Result,
};

/// A private key and the account address it controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Hex-encoded private key, `0x`-prefixed.
    pub private_key: String,
    /// Address of the account.
    pub address: Address,
}

/// Somewhere credentials survive the process.
pub trait CredentialStore {
    /// Reads previously saved credentials, if any.
    ///
    /// # Errors
    ///
    /// May fail if the store exists but can't be read or parsed.
    fn load(&self) -> Result<Option<Credentials>>;

    /// Persists `credentials`, replacing whatever was saved before.
    ///
    /// # Errors
    ///
    /// May fail if the store can't be written.
    fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// Stores credentials as `PRIVATE_KEY=` and `SMART_ACCOUNT_ADDRESS=` lines of
/// a dotenv file, leaving every other line untouched.
#[derive(Clone, Debug)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    /// Store backed by the dotenv file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for EnvFileStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut private_key = None;
        let mut address = None;
        for item in dotenvy::from_path_iter(&self.path)? {
            let (key, value) = item?;
            if value.trim().is_empty() {
                continue;
            }
            match key.as_str() {
                PRIVATE_KEY => private_key = Some(value),
                SMART_ACCOUNT_ADDRESS => address = Some(value),
                _ => {}
            }
        }

        let (Some(private_key), Some(address)) = (private_key, address) else {
            return Ok(None);
        };
        // An unparsable address is as good as none: a new account is made.
        Ok(address
            .trim()
            .parse()
            .ok()
            .map(|address| Credentials { private_key, address }))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let address = credentials.address.to_string();
        for (key, value) in [
            (PRIVATE_KEY, credentials.private_key.as_str()),
            (SMART_ACCOUNT_ADDRESS, address.as_str()),
        ] {
            contents = set_var(&contents, key, value)?;
        }

        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Replaces the `key=` line in `contents`, or appends one.
fn set_var(contents: &str, key: &str, value: &str) -> Result<String> {
    let line = format!("{key}={value}");
    let re = Regex::new(&format!(r"(?m)^{}=.*$", regex::escape(key)))?;
    if re.is_match(contents) {
        return Ok(re.replace(contents, NoExpand(&line)).into_owned());
    }

    let mut contents = contents.to_owned();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&line);
    contents.push('\n');
    Ok(contents)
}

/// Stores credentials as a JSON object.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for JsonFileStore {
    fn load(&self) -> Result<Option<Credentials>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let contents = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}
