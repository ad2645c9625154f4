use luna_job_tracker::{
    client::LunaClient,
    config::ClientConfig,
    models::{job::JobStatus, upload::UploadRequest},
    tracker::{self, StatusCallback, TrackError},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let Some(image_path) = std::env::args().nth(1) else {
        eprintln!("usage: luna-track <image-path>");
        return ExitCode::from(2);
    };

    // Load configuration from environment
    let config = ClientConfig::from_env().expect("Failed to load configuration from environment");

    if let Some(addr) = &config.metrics_bind_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid METRICS_BIND_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus metrics exporter");
        tracing::info!("Serving metrics on {}", addr);
    }

    metrics::describe_counter!("job_uploads_total", "Image uploads by outcome");
    metrics::describe_counter!("job_status_polls_total", "Job status polls by outcome");
    metrics::describe_histogram!("job_status_poll_seconds", "Latency of a single status poll");
    metrics::describe_counter!("job_sessions_total", "Polling sessions by how they ended");

    let client = LunaClient::new(&config).expect("Failed to initialize API client");

    tracing::info!(path = %image_path, api = %config.api_base_url, "Submitting image for DEM processing");

    let request = match UploadRequest::from_path(&image_path).await {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(path = %image_path, error = %e, "Failed to read image");
            return ExitCode::FAILURE;
        }
    };

    let receipt = match client.uploads.submit(request).await {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            return ExitCode::FAILURE;
        }
    };

    let job_id = receipt.job_id;
    let mut scheduler = client.scheduler();
    let on_update: StatusCallback = Box::new(|status: &JobStatus| {
        tracing::info!(
            job_id = %status.job_id,
            status = %status.status,
            progress = status.progress,
            message = status.message.as_deref().unwrap_or(""),
            "Job progress"
        );
    });

    let tracked = tokio::select! {
        result = tracker::wait_for_outcome(&mut scheduler, job_id.clone(), Some(on_update)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(tracked) = tracked else {
        scheduler.stop_polling();
        match client.status.cancel(&job_id).await {
            Ok(receipt) => tracing::info!(job_id = %job_id, status = %receipt.status, "Interrupted; job cancelled"),
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Interrupted; could not cancel job"),
        }
        return ExitCode::from(130);
    };

    match tracked {
        Ok(_) => {}
        Err(TrackError::JobFailed { message, .. }) => {
            tracing::error!(job_id = %job_id, error = %message, "Processing failed");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Stopped tracking job");
            return ExitCode::FAILURE;
        }
    }

    match client.results.summary(&job_id).await {
        Ok(summary) => {
            let quality = summary
                .analysis_results
                .as_ref()
                .and_then(|a| a.quality_score);
            tracing::info!(
                job_id = %job_id,
                quality_score = ?quality,
                files = summary.output_files.all_files().len(),
                "Processing complete"
            );
        }
        Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Could not fetch result summary"),
    }

    match client.analysis.surface_metrics(&job_id).await {
        Ok(report) => {
            let terrain = &report.terrain_classification;
            tracing::info!(
                job_id = %job_id,
                craters = terrain.crater_features,
                ridges = terrain.ridge_features,
                flat_terrain_percent = terrain.flat_terrain_percent,
                landing_sites = terrain.landing_sites,
                "Terrain assessment"
            );
        }
        Err(e) => tracing::debug!(job_id = %job_id, error = %e, "No terrain assessment available"),
    }

    match client.results.save_archive(&job_id, &config.output_dir).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to download results");
            ExitCode::FAILURE
        }
    }
}
