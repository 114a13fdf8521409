use std::path::Path;
use std::process::Command;

use mclip_models::parse_word_timings;
use mclip_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with output_dir={}",
        config.output_dir.display()
    );
    ensure_output_dir(&config.output_dir).await?;
    ensure_ffmpeg()?;
    ensure_file(&config.video_path)?;
    ensure_word_timings(&config.word_timings_path).await?;

    match &config.transcript_path {
        Some(transcript) => {
            ensure_file(transcript)?;
            if config.detector.is_none() {
                anyhow::bail!("MCLIP_TRANSCRIPT is set but GROQ_API_KEY / MCLIP_LLM_API_KEY is missing");
            }
        }
        None => ensure_file(&config.moments_path)?,
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_output_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let ffmpeg = mclip_media::check_ffmpeg()?;
    let output = Command::new(&ffmpeg)
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

fn ensure_file(path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        return Err(anyhow::anyhow!("missing input file {}", path.display()));
    }
    Ok(())
}

async fn ensure_word_timings(path: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path).await?;
    let words = parse_word_timings(&content)?;
    println!("worker-selfcheck: {} word timings", words.len());
    Ok(())
}
