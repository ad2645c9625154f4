use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::job::JobId;
use crate::models::results::{AnalysisResults, ProcessingInfo};

/// Full quality analysis of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub job_id: JobId,
    pub quality_analysis: AnalysisResults,
    #[serde(default)]
    pub processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceMetricsReport {
    pub job_id: JobId,
    pub surface_metrics: SurfaceMetrics,
    pub terrain_classification: TerrainClassification,
}

/// Elevation, slope and roughness statistics. Individual statistics vary
/// between pipeline versions, so each group stays raw JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    #[serde(default)]
    pub elevation_stats: Map<String, Value>,
    #[serde(default)]
    pub slope_analysis: Map<String, Value>,
    #[serde(default)]
    pub roughness_metrics: Map<String, Value>,
    #[serde(default)]
    pub mission_metrics: Map<String, Value>,
    #[serde(default)]
    pub quality_score: f64,
}

impl SurfaceMetrics {
    /// Numeric elevation statistic, e.g. `min`, `max`, `mean`.
    pub fn elevation(&self, stat: &str) -> Option<f64> {
        self.elevation_stats.get(stat).and_then(Value::as_f64)
    }
}

/// Terrain assessment for landing-site selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainClassification {
    #[serde(default)]
    pub crater_features: u64,
    #[serde(default)]
    pub ridge_features: u64,
    #[serde(default)]
    pub flat_terrain_percent: f64,
    #[serde(default)]
    pub landing_sites: u64,
}

/// Text and structured analysis reports written by the pipeline.
/// At least one of the two is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub job_id: JobId,
    #[serde(default)]
    pub text_report: Option<String>,
    #[serde(default)]
    pub detailed_analysis: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceComparison {
    pub job_id: JobId,
    pub comparison_status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub available_comparisons: Vec<String>,
}
