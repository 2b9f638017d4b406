//! Persisting the winning estimator and its parameters into a run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tabrun_core::persistence::StagedFile;
use tabrun_core::RunContext;
use tracing::{info, warn};

use crate::error::{MlError, Result};
use crate::models::{Model, Regressor};
use crate::params::ParamSet;
use crate::search::SearchOutcome;

pub const MODEL_EXTENSION: &str = "bin";
pub const PARAMETERS_SUFFIX: &str = "_parameters.json";

/// Files written by [`persist`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    pub model_path: PathBuf,
    pub parameters_path: PathBuf,
}

impl ModelArtifacts {
    pub fn for_run(context: &RunContext, model_name: &str) -> Result<Self> {
        validate_name(model_name)?;
        Ok(Self {
            model_path: context.model_file(&format!("{model_name}.{MODEL_EXTENSION}")),
            parameters_path: context.model_file(&format!("{model_name}{PARAMETERS_SUFFIX}")),
        })
    }
}

fn validate_name(model_name: &str) -> Result<()> {
    let valid = !model_name.is_empty()
        && model_name != "."
        && model_name != ".."
        && !model_name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(MlError::Artifact(format!(
            "'{model_name}' cannot be used as an artifact name"
        )))
    }
}

/// Write `models/<name>.bin` and `models/<name>_parameters.json`.
///
/// Both files are staged before either is renamed into place. If the second
/// rename fails the first file is removed again, so a run never holds a
/// model without its parameters.
pub fn persist<M>(
    outcome: &SearchOutcome<M>,
    context: &RunContext,
    model_name: &str,
) -> Result<ModelArtifacts>
where
    M: Regressor + Serialize,
{
    let artifacts = ModelArtifacts::for_run(context, model_name)?;

    let model_bytes = bincode::serialize(&outcome.best_estimator)?;
    let params_json = serde_json::to_string_pretty(&outcome.best_parameters)?;

    let staged_model = StagedFile::write(&artifacts.model_path, &model_bytes)
        .map_err(|e| stage_error(&artifacts.model_path, e))?;
    let staged_params = StagedFile::write(&artifacts.parameters_path, params_json.as_bytes())
        .map_err(|e| stage_error(&artifacts.parameters_path, e))?;

    staged_model
        .commit()
        .map_err(|e| stage_error(&artifacts.model_path, e))?;
    if let Err(e) = staged_params.commit() {
        if let Err(rm) = std::fs::remove_file(&artifacts.model_path) {
            warn!(
                path = %artifacts.model_path.display(),
                error = %rm,
                "Failed to roll back model artifact"
            );
        }
        return Err(stage_error(&artifacts.parameters_path, e));
    }

    info!(
        model = %artifacts.model_path.display(),
        parameters = %artifacts.parameters_path.display(),
        "Model artifacts saved"
    );
    Ok(artifacts)
}

fn stage_error(path: &Path, e: std::io::Error) -> MlError {
    MlError::Artifact(format!("failed to write {}: {e}", path.display()))
}

/// Restore an estimator written by [`persist`].
pub fn load_model(path: &Path) -> Result<Model> {
    let bytes = std::fs::read(path)
        .map_err(|e| MlError::Artifact(format!("failed to read {}: {e}", path.display())))?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Read a parameter file written by [`persist`].
pub fn load_parameters(path: &Path) -> Result<ParamSet> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MlError::Artifact(format!("failed to read {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}
