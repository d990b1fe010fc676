//! Compiled contracts and where to find them.
use std::{fs, io::ErrorKind, path::PathBuf};

use alloy::{
    json_abi::{Function, JsonAbi},
    primitives::Bytes,
};
use serde::Deserialize;

use crate::{Error, Result};

/// First version of the example implementation.
pub const IMPLEMENTATION_V1: &str = "UUPSUpgradeableExample";
/// Second version of the example implementation.
pub const IMPLEMENTATION_V2: &str = "UUPSUpgradeableExampleV2";
/// The ERC1967 proxy.
pub const PROXY: &str = "MyERC1967Proxy";

/// ABI and creation bytecode of a compiled contract.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Name of the contract.
    pub contract_name: String,
    /// Application binary interface.
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Whether the ABI declares a function called `name`.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some_and(|overloads| !overloads.is_empty())
    }

    /// The function called `name` taking `arity` arguments, or its only
    /// overload when `arity` is `None`.
    ///
    /// # Errors
    ///
    /// May fail if no such function exists.
    pub fn function(&self, name: &str, arity: Option<usize>) -> Result<&Function> {
        let overloads = self.abi.function(name).map(Vec::as_slice).unwrap_or_default();
        let found = match arity {
            Some(arity) => overloads
                .iter()
                .find(|f| f.inputs.len() == arity)
                .or_else(|| overloads.first()),
            None => overloads.first(),
        };
        found.ok_or_else(|| Error::MissingFunction {
            contract: self.contract_name.clone(),
            function: name.to_owned(),
        })
    }
}

/// Resolves a contract name to its compiled artifact.
pub trait ArtifactProvider {
    /// The artifact of contract `name`.
    ///
    /// # Errors
    ///
    /// May fail if the artifact is missing, malformed or has no bytecode.
    fn artifact(&self, name: &str) -> Result<ContractArtifact>;
}

/// Artifacts laid out the way Hardhat writes them:
/// `<root>/contracts/<Name>.sol/<Name>.json`.
#[derive(Clone, Debug)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Provider reading from the artifacts directory `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the artifact of contract `name` is expected.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root
            .join("contracts")
            .join(format!("{name}.sol"))
            .join(format!("{name}.json"))
    }
}

impl ArtifactProvider for HardhatArtifacts {
    fn artifact(&self, name: &str) -> Result<ContractArtifact> {
        let path = self.path_of(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ArtifactNotFound {
                    name: name.to_owned(),
                    path,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let artifact: ContractArtifact = serde_json::from_str(&contents)?;
        if artifact.bytecode.is_empty() {
            return Err(Error::EmptyBytecode(name.to_owned()));
        }
        Ok(artifact)
    }
}
