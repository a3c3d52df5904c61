//! Quillpost CLI: prepare, hash and upload post media, and submit drafts.
//!
//! Backend settings come from QUILLPOST_* environment variables (a `.env`
//! file is read first). `prepare` and `hash` work offline.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use quillpost_api_client::HttpPostDispatcher;
use quillpost_cli::{default_output_path, init_tracing, load_asset, read_draft, PreparedReport};
use quillpost_core::models::{MediaKind, MediaSource};
use quillpost_core::{ClientConfig, ContentHash, PipelineConfig};
use quillpost_processing::MediaPipeline;
use quillpost_services::{MediaService, MediaSlot, PostService, SlotOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quillpost", about = "Prepare and upload post media")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and re-encode a file without uploading it
    Prepare {
        file: PathBuf,
        /// image or video
        #[arg(long, value_parser = parse_kind)]
        kind: MediaKind,
        /// Where to write the prepared file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override the image target size in KiB
        #[arg(long)]
        target_kb: Option<usize>,
    },
    /// Prepare and upload a file
    Upload {
        file: PathBuf,
        #[arg(long, value_parser = parse_kind)]
        kind: MediaKind,
        #[arg(long)]
        category: String,
        /// Uploader id recorded with the metadata
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the SHA-256 content hash of a file
    Hash { file: PathBuf },
    /// Upload the local media of a draft and submit it
    Submit {
        draft: PathBuf,
        #[arg(long)]
        user: Option<String>,
        /// Validate and prepare everything, but upload and dispatch nothing
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_kind(s: &str) -> Result<MediaKind, String> {
    MediaKind::parse(s).map_err(|e| e.to_string())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn pipeline_config(target_kb: Option<usize>) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env().context("Invalid media settings")?;
    if let Some(kb) = target_kb {
        config.image_target_bytes = kb * 1024;
        config.validate()?;
    }
    Ok(config)
}

fn client_config() -> anyhow::Result<ClientConfig> {
    ClientConfig::from_env()
        .context("Failed to configure backend client. Set QUILLPOST_API_URL (and QUILLPOST_API_TOKEN)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            file,
            kind,
            out,
            target_kb,
        } => {
            let pipeline = MediaPipeline::new(pipeline_config(target_kb)?);
            let asset = load_asset(&file).await?;
            let prepared = pipeline.prepare_async(Some(asset.clone()), kind).await?;

            let output = out.unwrap_or_else(|| default_output_path(&file, &prepared.name));
            tokio::fs::write(&output, &prepared.data)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!(
                output = %output.display(),
                format = prepared.mime_type(),
                "Prepared file written"
            );
            print_json(&PreparedReport::new(&asset, &prepared, Some(output)))?;
        }
        Commands::Upload {
            file,
            kind,
            category,
            user,
        } => {
            let client = client_config()?;
            let user = user.or_else(|| client.user_id.clone());
            let service = MediaService::from_config(pipeline_config(None)?, &client)?;
            let slot = MediaSlot::new(file.display().to_string(), kind);
            let asset = load_asset(&file).await?;

            match service
                .select(&slot, Some(asset), &category, user.as_deref())
                .await
            {
                SlotOutcome::Uploaded(result) => print_json(&result)?,
                SlotOutcome::Failed(message) => bail!(message),
                SlotOutcome::Superseded => bail!("Upload was superseded"),
            }
        }
        Commands::Hash { file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            print_json(&serde_json::json!({
                "file": file,
                "hash": ContentHash::of(&data),
                "sizeBytes": data.len(),
            }))?;
        }
        Commands::Submit {
            draft: draft_path,
            user,
            dry_run,
        } => {
            let mut draft = read_draft(&draft_path).await?;
            let base_dir = draft_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            if dry_run {
                let user = user.or_else(|| std::env::var("QUILLPOST_USER_ID").ok());
                draft.validate_for_submit(user.as_deref())?;
                let pipeline = MediaPipeline::new(pipeline_config(None)?);

                let mut media = Vec::new();
                for (kind, field) in draft.media_fields_mut() {
                    if let Some(MediaSource::Local { path }) = field.as_ref() {
                        let asset = load_asset(&base_dir.join(path)).await?;
                        let prepared = pipeline
                            .prepare_async(Some(asset.clone()), kind)
                            .await
                            .with_context(|| format!("Failed to prepare {}", path.display()))?;
                        media.push(PreparedReport::new(&asset, &prepared, None));
                    }
                }
                print_json(&serde_json::json!({ "valid": true, "media": media }))?;
            } else {
                let client = client_config()?;
                let user = user.or_else(|| client.user_id.clone());
                let service = PostService::new(
                    MediaService::from_config(pipeline_config(None)?, &client)?,
                    Arc::new(HttpPostDispatcher::from_config(&client)?),
                );
                let response = service
                    .submit(&mut draft, &base_dir, user.as_deref())
                    .await?;
                print_json(&response)?;
            }
        }
    }

    Ok(())
}
