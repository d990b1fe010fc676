//! Dynamic ABI encoding against artifact ABIs.
//!
//! Artifacts are loaded at runtime, so calls are encoded by function name
//! rather than through generated bindings.
use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt, Specifier},
    json_abi::Param,
    primitives::{Address, Bytes, U256},
};

use crate::{artifact::ContractArtifact, Error, Result};

/// Calldata for `function(args…)` as declared in `artifact`.
///
/// # Errors
///
/// May fail if the function is missing or `args` don't match its inputs.
pub fn encode_call(
    artifact: &ContractArtifact,
    function: &str,
    args: &[DynSolValue],
) -> Result<Bytes> {
    let f = artifact.function(function, Some(args.len()))?;
    check_arity(function, &f.inputs, args.len())?;
    Ok(f.abi_encode_input(args)?.into())
}

/// Decodes what `function` returned.
///
/// # Errors
///
/// May fail if the function is missing or `data` doesn't match its outputs.
pub fn decode_output(
    artifact: &ContractArtifact,
    function: &str,
    arity: usize,
    data: &[u8],
) -> Result<Vec<DynSolValue>> {
    let f = artifact.function(function, Some(arity))?;
    Ok(f.abi_decode_output(data)?)
}

/// ABI-encoded constructor arguments, to be appended to the bytecode.
///
/// # Errors
///
/// May fail if `args` don't match the constructor's inputs.
pub fn encode_constructor(
    artifact: &ContractArtifact,
    args: &[DynSolValue],
) -> Result<Bytes> {
    match &artifact.abi.constructor {
        Some(constructor) => {
            check_arity("constructor", &constructor.inputs, args.len())?;
            Ok(constructor.abi_encode_input(args)?.into())
        }
        None if args.is_empty() => Ok(Bytes::new()),
        None => Err(Error::ArgumentCount {
            function: "constructor".to_owned(),
            expected: 0,
            actual: args.len(),
        }),
    }
}

/// Parses command-line strings into values typed after `function`'s inputs,
/// e.g. `["42"]` for `initialize(uint256)`.
///
/// # Errors
///
/// May fail if the function is missing, the number of arguments is wrong or
/// a string can't be coerced to its input type.
pub fn parse_args(
    artifact: &ContractArtifact,
    function: &str,
    raw: &[String],
) -> Result<Vec<DynSolValue>> {
    let f = artifact.function(function, Some(raw.len()))?;
    check_arity(function, &f.inputs, raw.len())?;
    f.inputs
        .iter()
        .zip(raw)
        .map(|(param, value)| Ok(param.resolve()?.coerce_str(value)?))
        .collect()
}

fn check_arity(function: &str, inputs: &[Param], actual: usize) -> Result<()> {
    if inputs.len() == actual {
        return Ok(());
    }
    Err(Error::ArgumentCount {
        function: function.to_owned(),
        expected: inputs.len(),
        actual,
    })
}

/// The single address returned by `function`.
pub(crate) fn single_address(
    function: &str,
    values: &[DynSolValue],
) -> Result<Address> {
    match values {
        [value] => value.as_address(),
        _ => None,
    }
    .ok_or_else(|| Error::UnexpectedReturn(function.to_owned()))
}

/// The single unsigned integer returned by `function`.
pub(crate) fn single_uint(
    function: &str,
    values: &[DynSolValue],
) -> Result<U256> {
    match values {
        [value] => value.as_uint().map(|(value, _)| value),
        _ => None,
    }
    .ok_or_else(|| Error::UnexpectedReturn(function.to_owned()))
}
