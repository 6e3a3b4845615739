//! Process-wide settings: thresholds, fusion weights, model/endpoint
//! configuration and artifact paths.
//!
//! Loaded once at process start from environment variables (with an
//! optional calibration JSON overlay) and never mutated afterward; every
//! request reads the same immutable [`Settings`].

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use fault_fusion::calibration::normalize_weight_mapping;
use fault_fusion::Weights;
use serde::Deserialize;

/// Gray-zone routing thresholds. `gray_low` must be `<= pass`; [`Settings::from_env`]
/// does not enforce this itself (an operator who inverts them gets a router
/// whose gray band is empty, not a panic).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub pass: f32,
    pub gray_low: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { pass: 0.84, gray_low: 0.65 }
    }
}

/// LLM endpoint credentials and model selection.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Paths to on-disk artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub data_file: Option<PathBuf>,
    pub hnsw_index_path: Option<PathBuf>,
    pub tfidf_cache_path: Option<PathBuf>,
    pub score_calibration_path: Option<PathBuf>,
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: Thresholds,
    pub fusion_weights: Weights,
    pub embedding_model: Option<String>,
    pub reranker_model: Option<String>,
    pub llm: LlmSettings,
    pub paths: ArtifactPaths,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            fusion_weights: Weights::default(),
            embedding_model: None,
            reranker_model: None,
            llm: LlmSettings::default(),
            paths: ArtifactPaths::default(),
        }
    }
}

/// Shape of the optional calibration JSON pointed to by
/// `SCORE_CALIBRATION_PATH`. Unknown keys are ignored by `serde`'s default
/// behavior; missing keys fall back to [`Settings`] defaults.
#[derive(Debug, Deserialize, Default)]
struct CalibrationFile {
    pass_threshold: Option<f32>,
    gray_low_threshold: Option<f32>,
    fusion_weights: Option<FusionWeightsFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FusionWeightsFile {
    rerank: Option<f32>,
    cosine: Option<f32>,
    bm25: Option<f32>,
    kg_prior: Option<f32>,
    popularity: Option<f32>,
}

impl Settings {
    /// Load settings from environment variables, applying the optional
    /// `SCORE_CALIBRATION_PATH` overlay and any `FUSION_<SOURCE>_WEIGHT`
    /// overrides, then re-normalizing the fusion weights.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Some(path) = env_path("SCORE_CALIBRATION_PATH") {
            if let Some(calibration) = load_calibration_file(&path) {
                apply_calibration(&mut settings, calibration);
            }
            settings.paths.score_calibration_path = Some(path);
        }

        settings.thresholds.pass = env_f32("PASS_THRESHOLD", settings.thresholds.pass);
        settings.thresholds.gray_low = env_f32("GRAY_LOW_THRESHOLD", settings.thresholds.gray_low);

        settings.fusion_weights = apply_weight_overrides(settings.fusion_weights);

        settings.embedding_model = env_string("EMBEDDING_MODEL");
        settings.reranker_model = env_string("RERANKER_MODEL");

        settings.llm = LlmSettings {
            api_base: env_string("OPENAI_API_BASE"),
            api_key: env_string("OPENAI_API_KEY"),
            model: env_string("OPENAI_MODEL"),
        };

        settings.paths.data_file = env_path("DATA_FILE");
        settings.paths.hnsw_index_path = env_path("HNSW_INDEX_PATH");
        settings.paths.tfidf_cache_path = env_path("TFIDF_CACHE_PATH");

        settings
    }
}

fn apply_calibration(settings: &mut Settings, calibration: CalibrationFile) {
    if let Some(pass) = calibration.pass_threshold {
        settings.thresholds.pass = pass;
    }
    if let Some(gray_low) = calibration.gray_low_threshold {
        settings.thresholds.gray_low = gray_low;
    }
    if let Some(weights) = calibration.fusion_weights {
        let current = settings.fusion_weights;
        settings.fusion_weights = Weights {
            rerank: weights.rerank.unwrap_or(current.rerank),
            cosine: weights.cosine.unwrap_or(current.cosine),
            bm25: weights.bm25.unwrap_or(current.bm25),
            kg_prior: weights.kg_prior.unwrap_or(current.kg_prior),
            popularity: weights.popularity.unwrap_or(current.popularity),
        }
        .normalized();
    }
}

fn load_calibration_file(path: &std::path::Path) -> Option<CalibrationFile> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| tracing::warn!(?path, error = %e, "failed to read calibration file"))
        .ok()?;
    serde_json::from_str(&contents)
        .map_err(|e| tracing::warn!(?path, error = %e, "failed to parse calibration file"))
        .ok()
}

/// Apply any `FUSION_<SOURCE>_WEIGHT` environment overrides on top of
/// `base`, re-normalizing via [`normalize_weight_mapping`] so a partial or
/// degenerate override still yields a valid weight set.
fn apply_weight_overrides(base: Weights) -> Weights {
    let mut map = HashMap::from([
        ("rerank".to_string(), base.rerank),
        ("cosine".to_string(), base.cosine),
        ("bm25".to_string(), base.bm25),
        ("kg_prior".to_string(), base.kg_prior),
        ("popularity".to_string(), base.popularity),
    ]);

    let mut overridden = false;
    for (source, key) in [
        ("RERANK", "rerank"),
        ("COSINE", "cosine"),
        ("BM25", "bm25"),
        ("KG_PRIOR", "kg_prior"),
        ("POPULARITY", "popularity"),
    ] {
        if let Some(value) = env_f32_opt(&format!("FUSION_{source}_WEIGHT")) {
            map.insert(key.to_string(), value);
            overridden = true;
        }
    }

    if !overridden {
        return base;
    }

    let defaults = HashMap::from([
        ("rerank".to_string(), Weights::default().rerank),
        ("cosine".to_string(), Weights::default().cosine),
        ("bm25".to_string(), Weights::default().bm25),
        ("kg_prior".to_string(), Weights::default().kg_prior),
        ("popularity".to_string(), Weights::default().popularity),
    ]);
    let normalized = normalize_weight_mapping(&map, &defaults);

    Weights {
        rerank: normalized["rerank"],
        cosine: normalized["cosine"],
        bm25: normalized["bm25"],
        kg_prior: normalized["kg_prior"],
        popularity: normalized["popularity"],
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_f32_opt(key).unwrap_or(default)
}

fn env_f32_opt(key: &str) -> Option<f32> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_spec_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.thresholds.pass, 0.84);
        assert_eq!(settings.thresholds.gray_low, 0.65);
        assert_eq!(settings.fusion_weights, Weights::default());
    }

    #[test]
    fn weight_override_without_any_env_var_is_a_no_op() {
        let base = Weights::default();
        assert_eq!(apply_weight_overrides(base), base);
    }

    #[test]
    fn calibration_file_overlay_falls_back_to_defaults_for_missing_keys() {
        let mut settings = Settings::default();
        let calibration = CalibrationFile {
            pass_threshold: Some(0.9),
            gray_low_threshold: None,
            fusion_weights: None,
        };
        apply_calibration(&mut settings, calibration);
        assert_eq!(settings.thresholds.pass, 0.9);
        assert_eq!(settings.thresholds.gray_low, 0.65);
    }

    #[test]
    fn partial_weight_overlay_keeps_unspecified_components() {
        let mut settings = Settings::default();
        let calibration = CalibrationFile {
            pass_threshold: None,
            gray_low_threshold: None,
            fusion_weights: Some(FusionWeightsFile {
                rerank: Some(1.0),
                cosine: Some(0.0),
                bm25: Some(0.0),
                kg_prior: Some(0.0),
                popularity: Some(0.0),
            }),
        };
        apply_calibration(&mut settings, calibration);
        assert_eq!(settings.fusion_weights.rerank, 1.0);
    }
}
