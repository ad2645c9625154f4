use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::job::JobId;

/// Aggregated output of a completed DEM job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub processing_info: Option<ProcessingInfo>,
    #[serde(default)]
    pub analysis_results: Option<AnalysisResults>,
    #[serde(default)]
    pub output_files: OutputManifest,
    #[serde(default)]
    pub download_zip: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    #[serde(default)]
    pub image_file: Option<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub converged: Option<bool>,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// Quality metrics, surface statistics and terrain assessment. Only the
/// overall score is typed; the remaining sections are kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

impl AnalysisResults {
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputManifest {
    #[serde(default)]
    pub geotiff: Option<String>,
    #[serde(default)]
    pub obj_model: Option<String>,
    #[serde(default)]
    pub visualizations: Vec<String>,
    #[serde(default)]
    pub analysis: Vec<String>,
}

impl OutputManifest {
    /// Every file name in the manifest, primary outputs first.
    pub fn all_files(&self) -> Vec<&str> {
        self.geotiff
            .iter()
            .chain(self.obj_model.iter())
            .chain(self.visualizations.iter())
            .chain(self.analysis.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Listing of downloadable files for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFileListing {
    pub job_id: JobId,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub files: Vec<ResultFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub filename: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_payload() {
        let body = r#"{
            "job_id": "abc123",
            "status": "completed",
            "processing_info": {
                "image_file": "crater.png",
                "iterations": 180,
                "converged": true,
                "job_id": "abc123",
                "processed_at": "2024-03-01T10:20:00"
            },
            "analysis_results": {
                "quality_score": 85,
                "surface_statistics": {"min_elevation": -120.5, "max_elevation": 340.2},
                "mission_metrics": {"flat_terrain_percent": 22.4}
            },
            "output_files": {
                "geotiff": "lunar_dem.tif",
                "obj_model": "lunar_surface.obj",
                "visualizations": ["ultra_clear_dem.png", "lunar_terrain_3d.png"],
                "analysis": ["analysis_report.txt"]
            },
            "download_zip": "luna_results_abc123.zip",
            "cloudinary_urls": {},
            "completed_at": "2024-03-01T10:20:01"
        }"#;

        let result: JobResult = serde_json::from_str(body).unwrap();
        let analysis = result.analysis_results.as_ref().unwrap();
        assert_eq!(analysis.quality_score, Some(85.0));
        assert!(analysis.section("surface_statistics").is_some());
        assert_eq!(result.processing_info.as_ref().unwrap().iterations, Some(180));
        assert_eq!(
            result.output_files.all_files(),
            vec![
                "lunar_dem.tif",
                "lunar_surface.obj",
                "ultra_clear_dem.png",
                "lunar_terrain_3d.png",
                "analysis_report.txt"
            ]
        );
    }

    #[test]
    fn test_file_listing() {
        let body = r#"{
            "job_id": "abc123",
            "total_files": 1,
            "files": [{
                "filename": "lunar_dem.tif",
                "path": "lunar_dem.tif",
                "size_bytes": 2048,
                "size_mb": 0.0,
                "type": "image",
                "mime_type": "image/tiff"
            }]
        }"#;
        let listing: ResultFileListing = serde_json::from_str(body).unwrap();
        assert_eq!(listing.files[0].file_type.as_deref(), Some("image"));
        assert_eq!(listing.files[0].size_bytes, 2048);
    }
}
