//! Source registration with the network's compilation service, so explorers
//! can show verified code for deployed implementations.
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{network::CodeRegistry, Error, Result};

/// Solidity version the contracts are built with.
pub const COMPILER_VERSION: &str = "0.8.28";

/// Matches every form of `import "…"`, capturing the path.
const IMPORT_PATTERN: &str =
    r#"(?m)^\s*import\s+(?:[^"';]*?\s+from\s+)?["']([^"']+)["']"#;

/// Request body of `cometa_compileContract`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerInput {
    /// Always `Solidity`.
    pub language: String,
    /// `<file>:<contract>`.
    pub contract_name: String,
    /// `solc` version, e.g. `0.8.28`.
    pub compiler_version: String,
    /// Sources keyed by import path.
    pub sources: BTreeMap<String, Source>,
    /// `solc` standard-JSON settings.
    pub settings: Value,
}

/// A single source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Text of the file.
    pub content: String,
}

/// Compiler settings the artifacts were produced with.
#[must_use]
pub fn compiler_settings() -> Value {
    json!({
        "metadata": {
            "appendCBOR": false,
            "bytecodeHash": "none",
        },
        "debug": {
            "debugInfo": ["location"],
        },
        "outputSelection": {
            "*": {
                "*": ["*"],
            },
        },
        "evmVersion": "cancun",
        "optimizer": {
            "enabled": false,
            "runs": 200,
        },
    })
}

/// Solidity sources on disk: project contracts plus installed packages.
#[derive(Clone, Debug)]
pub struct SourceTree {
    contracts_dir: PathBuf,
    node_modules: PathBuf,
}

impl SourceTree {
    /// Project sources under `contracts_dir`, installed packages under
    /// `node_modules`.
    pub fn new(
        contracts_dir: impl Into<PathBuf>,
        node_modules: impl Into<PathBuf>,
    ) -> Self {
        Self {
            contracts_dir: contracts_dir.into(),
            node_modules: node_modules.into(),
        }
    }

    /// File backing the import path `key`.
    ///
    /// Keys naming an installed package, scoped (`@scope/pkg/…`) or not
    /// (`hardhat/console.sol`), resolve under `node_modules`; everything else
    /// under `contracts_dir`.
    #[must_use]
    pub fn path_of(&self, key: &str) -> PathBuf {
        let package = key.split('/').next().unwrap_or(key);
        let installed = key.starts_with('@')
            || (key.contains('/') && self.node_modules.join(package).is_dir());
        if installed {
            self.node_modules.join(key)
        } else {
            self.contracts_dir.join(key)
        }
    }

    /// `entry` and everything it transitively imports, keyed by import path.
    ///
    /// # Errors
    ///
    /// May fail if a source file is missing or unreadable.
    pub fn collect(&self, entry: &str) -> Result<BTreeMap<String, Source>> {
        let imports = Regex::new(IMPORT_PATTERN)?;
        let mut sources = BTreeMap::new();
        let mut pending = vec![entry.to_owned()];

        while let Some(key) = pending.pop() {
            if sources.contains_key(&key) {
                continue;
            }
            let content = read_source(&self.path_of(&key))?;
            for import in imports.captures_iter(&content) {
                let resolved = resolve_import(&key, &import[1]);
                if !sources.contains_key(&resolved) {
                    pending.push(resolved);
                }
            }
            sources.insert(key, Source { content });
        }

        Ok(sources)
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::SourceNotFound(path.to_owned()),
        _ => e.into(),
    })
}

/// Import path of `import` as seen from the file keyed `from`.
fn resolve_import(from: &str, import: &str) -> String {
    if !import.starts_with('.') {
        return import.to_owned();
    }

    let mut segments: Vec<&str> = from.split('/').collect();
    segments.pop();
    for segment in import.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Compiles a contract's sources with the network's service and attaches
/// the result to a deployed address.
pub struct VerificationRegistrar<'a, R> {
    registry: &'a R,
    sources: SourceTree,
}

impl<'a, R: CodeRegistry> VerificationRegistrar<'a, R> {
    /// Registrar submitting sources from `sources` to `registry`.
    pub fn new(registry: &'a R, sources: SourceTree) -> Self {
        Self { registry, sources }
    }

    /// Compiler input for `contract`, read from `<contract>.sol`.
    ///
    /// # Errors
    ///
    /// May fail if a source file is missing or unreadable.
    pub fn compiler_input(&self, contract: &str) -> Result<CompilerInput> {
        let entry = format!("{contract}.sol");
        Ok(CompilerInput {
            language: "Solidity".to_owned(),
            contract_name: format!("{entry}:{contract}"),
            compiler_version: COMPILER_VERSION.to_owned(),
            sources: self.sources.collect(&entry)?,
            settings: compiler_settings(),
        })
    }

    /// Compile `contract` and register it against `address`.
    ///
    /// # Errors
    ///
    /// May fail if sources are missing or the service rejects a request.
    pub async fn register(&self, contract: &str, address: Address) -> Result<()> {
        let input = self.compiler_input(contract)?;
        info!(contract, sources = input.sources.len(), "compilation started");
        let output = self.registry.compile_contract(&input).await?;

        info!(contract, %address, "registering contract");
        self.registry.register_contract_data(&output, address).await?;
        info!(contract, %address, "registration complete");
        Ok(())
    }

    /// [`Self::register`], logging failures instead of returning them.
    /// Returns whether registration succeeded.
    pub async fn register_or_log(&self, contract: &str, address: Address) -> bool {
        match self.register(contract, address).await {
            Ok(()) => true,
            Err(e) => {
                error!(contract, %address, error = %e, "registration failed");
                false
            }
        }
    }
}
