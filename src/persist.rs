//! Parameter persistence
//!
//! Artifacts are small JSON documents holding a model's parameters and fit-time
//! penalty. They are written to a temporary file next to the destination and
//! renamed into place, so a reader sees either the previous artifact or the new
//! one, never a partial write.

use crate::config::ArtifactPaths;
use crate::error::{LtvError, Result};
use crate::model::{GammaGamma, ModifiedBetaGeo, ParametricModel};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact<P> {
    model: String,
    params: P,
    penalizer_coef: f64,
}

/// Persist a fitted model's parameters to `path`.
pub fn save_model<M: ParametricModel>(model: &M, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, &artifact_bytes(model, path)?)
}

fn artifact_bytes<M: ParametricModel>(model: &M, path: &Path) -> Result<Vec<u8>> {
    let artifact = ModelArtifact {
        model: M::KIND.to_string(),
        params: model.params(),
        penalizer_coef: model.penalizer_coef(),
    };
    serde_json::to_vec_pretty(&artifact)
        .map_err(|e| LtvError::persistence(path, std::io::Error::new(ErrorKind::InvalidData, e)))
}

/// Rebuild a model from an artifact written by [`save_model`].
pub fn load_model<M: ParametricModel>(path: impl AsRef<Path>) -> Result<M> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => LtvError::model_load(path, "artifact not found"),
        _ => LtvError::model_load(path, e),
    })?;

    let artifact: ModelArtifact<M::Params> =
        serde_json::from_slice(&bytes).map_err(|e| LtvError::model_load(path, e))?;
    if artifact.model != M::KIND {
        return Err(LtvError::model_load(
            path,
            format!("expected a {} artifact, found {}", M::KIND, artifact.model),
        ));
    }

    M::from_parts(artifact.params, artifact.penalizer_coef)
        .map_err(|reason| LtvError::model_load(path, reason))
}

/// Persist both fitted models.
///
/// Both artifacts are fully written to temporary files before either is renamed
/// into place, so a failed write leaves the previous pair untouched.
pub fn save_models(
    frequency_model: &ModifiedBetaGeo,
    monetary_model: &GammaGamma,
    paths: &ArtifactPaths,
) -> Result<()> {
    let staged_frequency = stage(
        &paths.frequency_model,
        &artifact_bytes(frequency_model, &paths.frequency_model)?,
    )?;
    let staged_monetary = stage(
        &paths.monetary_model,
        &artifact_bytes(monetary_model, &paths.monetary_model)?,
    )?;

    commit(staged_frequency, &paths.frequency_model)?;
    commit(staged_monetary, &paths.monetary_model)?;
    log::info!(
        "Model shape and scale parameters saved to {} and {}",
        paths.frequency_model.display(),
        paths.monetary_model.display()
    );
    Ok(())
}

/// Load both fitted models.
pub fn load_models(paths: &ArtifactPaths) -> Result<(ModifiedBetaGeo, GammaGamma)> {
    let frequency_model = load_model(&paths.frequency_model)?;
    let monetary_model = load_model(&paths.monetary_model)?;
    log::info!("Model shape and scale parameters loaded");
    Ok((frequency_model, monetary_model))
}

/// Replace the contents of `path` with `bytes` via write-then-rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    commit(stage(path, bytes)?, path)
}

/// Write `bytes` to a synced temporary file in the directory of `path`.
/// Dropping the returned file without committing removes it.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LtvError::persistence(path, e))?;
    tmp.write_all(bytes).map_err(|e| LtvError::persistence(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| LtvError::persistence(path, e))?;
    Ok(tmp)
}

fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged
        .persist(path)
        .map_err(|e| LtvError::persistence(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GammaGammaParams, MbgParams};

    fn fitted_models() -> (ModifiedBetaGeo, GammaGamma) {
        let mbg = ModifiedBetaGeo::from_parts(
            MbgParams {
                r: 0.243_012_345_678_901_2,
                alpha: 4.413_789_012_345_678,
                a: 0.793_123_456_789_012_3,
                b: 2.426_987_654_321_098,
            },
            0.1,
        )
        .unwrap();
        let ggf = GammaGamma::from_parts(
            GammaGammaParams {
                p: 6.248_802_1,
                q: 3.744_564_7,
                v: 15.447_198_3,
            },
            0.0,
        )
        .unwrap();
        (mbg, ggf)
    }

    #[test]
    fn test_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let (mbg, ggf) = fitted_models();

        save_models(&mbg, &ggf, &paths).unwrap();
        let (loaded_mbg, loaded_ggf) = load_models(&paths).unwrap();

        assert_eq!(loaded_mbg, mbg);
        assert_eq!(loaded_ggf, ggf);
        assert_eq!(loaded_mbg.params().alpha.to_bits(), mbg.params().alpha.to_bits());
    }

    #[test]
    fn test_artifact_holds_parameters_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let (mbg, ggf) = fitted_models();
        save_models(&mbg, &ggf, &paths).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.frequency_model).unwrap()).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["model", "params", "penalizer_coef"]);
        assert_eq!(json["model"], "ModifiedBetaGeo");
    }

    #[test]
    fn test_missing_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());

        let err = load_models(&paths).unwrap_err();
        assert!(matches!(err, LtvError::ModelLoad { .. }));
    }

    #[test]
    fn test_corrupt_or_mismatched_artifacts_are_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let (mbg, _) = fitted_models();

        std::fs::write(&paths.frequency_model, b"{not json").unwrap();
        assert!(matches!(
            load_model::<ModifiedBetaGeo>(&paths.frequency_model),
            Err(LtvError::ModelLoad { .. })
        ));

        // A frequency artifact where the monetary one is expected
        save_model(&mbg, &paths.monetary_model).unwrap();
        assert!(matches!(
            load_model::<GammaGamma>(&paths.monetary_model),
            Err(LtvError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_failed_pair_write_keeps_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths {
            frequency_model: dir.path().join("mbg.json"),
            monetary_model: dir.path().join("missing").join("ggf.json"),
        };
        let (mbg, ggf) = fitted_models();
        std::fs::write(&paths.frequency_model, b"previous").unwrap();

        let err = save_models(&mbg, &ggf, &paths).unwrap_err();
        assert!(matches!(err, LtvError::Persistence { .. }));
        assert_eq!(std::fs::read(&paths.frequency_model).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_overwrite_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mbg.json");
        let (mbg, _) = fitted_models();

        std::fs::write(&path, b"stale").unwrap();
        save_model(&mbg, &path).unwrap();

        let loaded: ModifiedBetaGeo = load_model(&path).unwrap();
        assert_eq!(loaded, mbg);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
