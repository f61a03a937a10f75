//! Helpers for (de)serialising trained models.

pub mod artifact;
pub mod merges;

pub use artifact::{from_artifact_json, load_artifact, save_artifact, to_artifact_json};
pub use merges::{merges_listing, save_merges_txt, write_merges_txt};
