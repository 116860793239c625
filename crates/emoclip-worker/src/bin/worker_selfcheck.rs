use std::path::Path;
use std::process::Command;

use emoclip_media::{check_ffmpeg, check_ffprobe};
use emoclip_ml_client::classifier_from_env;
use emoclip_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_ffmpeg()?;
    ensure_classifier().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    check_ffmpeg()?;
    check_ffprobe()?;

    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}

async fn ensure_classifier() -> anyhow::Result<()> {
    let classifier = classifier_from_env()?;
    if !classifier.health_check().await? {
        return Err(anyhow::anyhow!(
            "{} classifier is not healthy",
            classifier.name()
        ));
    }
    println!("worker-selfcheck: classifier {} healthy", classifier.name());
    Ok(())
}
