//! Model serialization and deserialization via bincode.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::Forest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope written by [`Forest::save`].
#[derive(serde::Serialize)]
struct ModelEnvelopeRef<'a, P> {
    format_version: u32,
    num_of_trees: usize,
    num_of_classes: usize,
    forest: &'a Forest<P>,
}

/// Owned mirror of [`ModelEnvelopeRef`] read by [`Forest::load`].
#[derive(serde::Deserialize)]
struct ModelEnvelope<P> {
    format_version: u32,
    num_of_trees: usize,
    num_of_classes: usize,
    forest: Forest<P>,
}

impl<P: Serialize> Forest<P> {
    /// Save the forest to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelopeRef {
            format_version: FORMAT_VERSION,
            num_of_trees: self.trees.len(),
            num_of_classes: self.num_of_classes,
            forest: self,
        };

        let bytes =
            bincode::serialize(&envelope).map_err(|e| ForestError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            num_of_trees = self.trees.len(),
            "model saved"
        );

        Ok(())
    }
}

impl<P: DeserializeOwned> Forest<P> {
    /// Load a forest from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: ModelEnvelope<P> =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        let forest = &envelope.forest;
        let mismatch = if envelope.num_of_trees != forest.trees.len() {
            Some(format!(
                "envelope declares {} trees, found {}",
                envelope.num_of_trees,
                forest.trees.len()
            ))
        } else if envelope.num_of_classes != forest.num_of_classes {
            Some(format!(
                "envelope declares {} classes, forest has {}",
                envelope.num_of_classes, forest.num_of_classes
            ))
        } else {
            forest
                .trees
                .iter()
                .position(|tree| !tree.has_consistent_arena())
                .map(|t| format!("tree {t} has a malformed node arena"))
        };
        if let Some(reason) = mismatch {
            return Err(ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: Box::new(bincode::ErrorKind::Custom(reason)),
            });
        }

        debug!(
            num_of_trees = envelope.num_of_trees,
            num_of_classes = envelope.num_of_classes,
            "model loaded"
        );

        Ok(envelope.forest)
    }
}
