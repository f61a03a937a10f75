//! JSON codec for the `{merges, vocab}` tokenizer artifact.

use std::fs;
use std::path::Path;

use serde_json::error::Category;

use crate::error::{DbpeError, Result};
use crate::model::BpeModel;

/// Serialises a model to the artifact JSON document.
pub fn to_artifact_json(model: &BpeModel, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(model)?
    } else {
        serde_json::to_string(model)?
    };
    Ok(json)
}

/// Parses an artifact JSON document.
///
/// Syntax errors surface as [`DbpeError::Serialization`]; well-formed JSON that does not
/// match the artifact layout (missing `merges` or `vocab`, merges that are not string
/// pairs, bad vocabulary keys) surfaces as [`DbpeError::MalformedArtifact`].
pub fn from_artifact_json(json: &str) -> Result<BpeModel> {
    serde_json::from_str(json).map_err(|err| match err.classify() {
        Category::Data => DbpeError::MalformedArtifact(err.to_string()),
        _ => DbpeError::Serialization(err.to_string()),
    })
}

/// Persists the model at `path`, creating parent directories as needed.
pub fn save_artifact<P: AsRef<Path>>(model: &BpeModel, path: P, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| DbpeError::io(err, Some(parent.to_path_buf())))?;
    }
    let json = to_artifact_json(model, pretty)?;
    fs::write(path, json).map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))
}

/// Loads a model artifact from disk.
pub fn load_artifact<P: AsRef<Path>>(path: P) -> Result<BpeModel> {
    let path = path.as_ref();
    let json =
        fs::read_to_string(path).map_err(|err| DbpeError::io(err, Some(path.to_path_buf())))?;
    from_artifact_json(&json)
}
