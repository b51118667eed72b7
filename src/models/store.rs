//! Persisted scaler + model bundle

use crate::error::{PipelineError, Result};
use crate::models::logistic::ModelState;
use crate::scaler::ScalingParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Bumped whenever the bundle layout changes
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

const BUNDLE_FILE: &str = "model_bundle.json";

/// Scaling parameters and model state from one training run, stored together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    /// Run that fitted both halves
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub scaling: ScalingParameters,
    pub model: ModelState,
}

impl ModelBundle {
    pub fn new(run_id: Uuid, scaling: ScalingParameters, model: ModelState) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            run_id,
            created_at: Utc::now(),
            scaling,
            model,
        }
    }

    /// Check the version stamp, that every stored parameter is usable, and that
    /// model and scaler describe the same features.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(PipelineError::Persistence(format!(
                "bundle format version {} is not supported (expected {})",
                self.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        let scaling = &self.scaling;
        if scaling.mean.len() != scaling.len() || scaling.std.len() != scaling.len() {
            return Err(PipelineError::Persistence(
                "scaling parameters do not match their column list".to_string(),
            ));
        }
        if scaling.mean.iter().any(|m| !m.is_finite()) {
            return Err(PipelineError::Persistence(
                "scaling means must be finite".to_string(),
            ));
        }
        if let Some((column, s)) = scaling
            .columns
            .iter()
            .zip(&scaling.std)
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(PipelineError::Persistence(format!(
                "scaling divisor for column '{}' must be finite and positive, found {}",
                column, s
            )));
        }
        let model = &self.model;
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::Persistence(
                "model parameters must be finite".to_string(),
            ));
        }
        if self.model.n_features() != scaling.len() {
            return Err(PipelineError::SchemaMismatch {
                expected: scaling.columns.clone(),
                found: vec![format!("{} model coefficients", self.model.n_features())],
            });
        }
        Ok(())
    }
}

/// Directory-backed store holding the most recent bundle.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the bundle file.
    pub fn bundle_path(&self) -> PathBuf {
        self.dir.join(BUNDLE_FILE)
    }

    /// Write `bundle` atomically: temp file in the same directory, fsync, rename.
    pub fn save(&self, bundle: &ModelBundle) -> Result<PathBuf> {
        bundle.validate()?;
        fs::create_dir_all(&self.dir)?;

        let path = self.bundle_path();
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", BUNDLE_FILE, Uuid::new_v4()));

        let json = serde_json::to_vec_pretty(bundle)?;
        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        info!(
            run_id = %bundle.run_id,
            path = %path.display(),
            features = bundle.scaling.len(),
            "Model bundle saved"
        );
        Ok(path)
    }

    /// Load the stored bundle, or `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<ModelBundle>> {
        let path = self.bundle_path();
        if !path.exists() {
            debug!(path = %path.display(), "No model bundle found");
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let bundle: ModelBundle = serde_json::from_slice(&data)?;
        bundle.validate()?;

        debug!(run_id = %bundle.run_id, path = %path.display(), "Model bundle loaded");
        Ok(Some(bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> ModelBundle {
        ModelBundle::new(
            Uuid::new_v4(),
            ScalingParameters {
                columns: vec!["V1".to_string(), "Amount".to_string()],
                mean: vec![0.5, 88.0],
                std: vec![1.2, 250.0],
            },
            ModelState {
                coefficients: vec![0.8, -0.3],
                intercept: -2.1,
                iterations: 7,
            },
        )
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let bundle = sample_bundle();

        let path = store.save(&bundle).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(path, store.bundle_path());
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        store.save(&sample_bundle()).unwrap();
        store.save(&sample_bundle()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![BUNDLE_FILE.to_string()]);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut bundle = sample_bundle();
        bundle.format_version = BUNDLE_FORMAT_VERSION + 1;

        fs::write(store.bundle_path(), serde_json::to_vec(&bundle).unwrap()).unwrap();

        assert_eq!(store.load().unwrap_err().kind(), "PersistenceError");
    }

    #[test]
    fn test_damaged_parameters_rejected() {
        let mut zero_std = sample_bundle();
        zero_std.scaling.std[1] = 0.0;
        let err = zero_std.validate().unwrap_err();
        assert_eq!(err.kind(), "PersistenceError");
        assert!(err.to_string().contains("Amount"));

        let mut nan_mean = sample_bundle();
        nan_mean.scaling.mean[0] = f64::NAN;
        assert_eq!(nan_mean.validate().unwrap_err().kind(), "PersistenceError");

        let mut negative_std = sample_bundle();
        negative_std.scaling.std[0] = -1.2;
        assert_eq!(negative_std.validate().unwrap_err().kind(), "PersistenceError");

        let mut infinite_coef = sample_bundle();
        infinite_coef.model.coefficients[0] = f64::INFINITY;
        assert_eq!(infinite_coef.validate().unwrap_err().kind(), "PersistenceError");
    }

    #[test]
    fn test_load_rejects_zero_divisor_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut bundle = sample_bundle();
        bundle.scaling.std[0] = 0.0;

        fs::write(store.bundle_path(), serde_json::to_vec(&bundle).unwrap()).unwrap();

        assert_eq!(store.load().unwrap_err().kind(), "PersistenceError");
    }

    #[test]
    fn test_mismatched_halves_rejected() {
        let mut bundle = sample_bundle();
        bundle.model.coefficients.push(0.1);

        assert_eq!(bundle.validate().unwrap_err().kind(), "SchemaMismatchError");

        let dir = tempfile::tempdir().unwrap();
        assert!(ArtifactStore::new(dir.path()).save(&bundle).is_err());
    }
}
