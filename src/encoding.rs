use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CategoryKind, UnknownCategoryError};
use crate::season::Season;

pub const ENCODER_ARTIFACT_VERSION: u32 = 1;

// Stadiums that appear under more than one spelling in fixture exports.
static VENUE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "The American Express Stadium",
            "The American Express Community Stadium",
        ),
        ("St Mary's Stadium", "St. Mary's Stadium"),
    ])
});

pub fn canonical_venue(name: &str) -> &str {
    let trimmed = name.trim();
    VENUE_ALIASES.get(trimmed).copied().unwrap_or(trimmed)
}

/// Dense bijection between a fixed category set and `0..n`.
///
/// Classes are kept sorted, so fitting the same set of values always yields
/// the same codes regardless of the order they were seen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub kind: CategoryKind,
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<'a, I>(kind: CategoryKind, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<String> = values
            .into_iter()
            .map(|v| canonicalize(kind, v).to_string())
            .filter(|v| !v.is_empty())
            .collect();
        Self {
            kind,
            classes: classes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Result<u32, UnknownCategoryError> {
        let canonical = canonicalize(self.kind, value);
        self.classes
            .binary_search_by(|c| c.as_str().cmp(canonical))
            .map(|idx| idx as u32)
            .map_err(|_| UnknownCategoryError {
                kind: self.kind,
                value: value.to_string(),
            })
    }

    pub fn inverse(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }
}

fn canonicalize(kind: CategoryKind, value: &str) -> &str {
    match kind {
        CategoryKind::Team => value.trim(),
        CategoryKind::Venue => canonical_venue(value),
    }
}

/// Everything needed to encode identities the same way at training and
/// inference time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub version: u32,
    pub first_season: Season,
    pub teams: CategoryEncoder,
    pub venues: CategoryEncoder,
}

impl EncoderArtifact {
    pub fn new(first_season: Season, teams: CategoryEncoder, venues: CategoryEncoder) -> Self {
        Self {
            version: ENCODER_ARTIFACT_VERSION,
            first_season,
            teams,
            venues,
        }
    }

    pub fn season_code(&self, season: Season) -> i64 {
        season.ordinal() - self.first_season.ordinal() + 1
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).context("serialize encoder artifact")
    }

    pub fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint_bytes(&self.to_bytes()?))
    }

    pub fn save(&self, path: &Path) -> Result<String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create encoder dir {}", parent.display()))?;
        }
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).context("write encoder artifact")?;
        fs::rename(&tmp, path).context("swap encoder artifact")?;
        Ok(fingerprint_bytes(&bytes))
    }

    /// Loads the artifact and checks it against the fingerprint recorded at
    /// training time.
    pub fn load(path: &Path, expected_fingerprint: Option<&str>) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("read encoder artifact {}", path.display()))?;
        if let Some(expected) = expected_fingerprint {
            let actual = fingerprint_bytes(&bytes);
            if actual != expected {
                return Err(anyhow!(
                    "encoder artifact {} does not match its model version (fingerprint {actual}, expected {expected})",
                    path.display()
                ));
            }
        }
        let artifact: EncoderArtifact =
            serde_json::from_slice(&bytes).context("parse encoder artifact")?;
        if artifact.version != ENCODER_ARTIFACT_VERSION {
            return Err(anyhow!(
                "unsupported encoder artifact version {}",
                artifact.version
            ));
        }
        Ok(artifact)
    }
}

fn fingerprint_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}
