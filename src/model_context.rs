//! Everything a prediction run needs, loaded once and passed by reference.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::elo::EloConfig;
use crate::encoding::EncoderArtifact;
use crate::estimator::{Estimator, TrainingReport};
use crate::features::{FEATURE_NAMES, FEATURE_SET_VERSION, FeatureAssembler};
use crate::h2h::H2hConfig;
use crate::persist::{read_json, write_json_atomic};

pub const ENCODERS_FILE: &str = "encoders.json";
pub const ESTIMATOR_FILE: &str = "estimator.json";
pub const CONTEXT_FILE: &str = "context.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelContext {
    pub encoders: EncoderArtifact,
    pub estimator: Estimator,
    pub elo: EloConfig,
    pub h2h: H2hConfig,
    pub trained_at: DateTime<Utc>,
    pub report: Option<TrainingReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContextFile {
    feature_set_version: u32,
    feature_names: Vec<String>,
    encoder_fingerprint: String,
    elo: EloConfig,
    h2h: H2hConfig,
    trained_at: DateTime<Utc>,
    #[serde(default)]
    report: Option<TrainingReport>,
}

impl ModelContext {
    pub fn assembler(&self) -> FeatureAssembler<'_> {
        FeatureAssembler::new(&self.encoders, self.elo, self.h2h)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create model dir {}", dir.display()))?;
        let fingerprint = self.encoders.save(&dir.join(ENCODERS_FILE))?;
        write_json_atomic(&dir.join(ESTIMATOR_FILE), &self.estimator)?;
        // Written last: a directory without context.json is not a model.
        let ctx = ContextFile {
            feature_set_version: FEATURE_SET_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            encoder_fingerprint: fingerprint,
            elo: self.elo,
            h2h: self.h2h,
            trained_at: self.trained_at,
            report: self.report.clone(),
        };
        write_json_atomic(&dir.join(CONTEXT_FILE), &ctx)?;
        info!(dir = %dir.display(), "model context saved");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let ctx: ContextFile = read_json(&dir.join(CONTEXT_FILE))?
            .ok_or_else(|| anyhow!("no trained model in {}", dir.display()))?;
        if ctx.feature_set_version != FEATURE_SET_VERSION {
            bail!(
                "model was trained on feature set v{}, this build uses v{FEATURE_SET_VERSION}; retrain",
                ctx.feature_set_version
            );
        }
        if ctx.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            bail!("model feature names do not match the current feature order; retrain");
        }

        let encoders =
            EncoderArtifact::load(&dir.join(ENCODERS_FILE), Some(&ctx.encoder_fingerprint))?;
        let estimator: Estimator = read_json(&dir.join(ESTIMATOR_FILE))?
            .ok_or_else(|| anyhow!("missing {ESTIMATOR_FILE} in {}", dir.display()))?;
        estimator
            .validate_shape()
            .context("estimator does not fit the feature set")?;

        Ok(Self {
            encoders,
            estimator,
            elo: ctx.elo,
            h2h: ctx.h2h,
            trained_at: ctx.trained_at,
            report: ctx.report,
        })
    }
}
