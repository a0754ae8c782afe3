use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use plateshot_contracts::edits::EditMode;
use plateshot_contracts::endpoints::ResponseKind;
use plateshot_contracts::prompt::build_prompt;
use plateshot_contracts::receipts::{
    now_utc_iso, write_receipt, RunReceipt, RECEIPT_SCHEMA_VERSION,
};
use plateshot_engine::{
    non_empty_env, render_placeholder, ImageBytes, InferenceClient, InferenceOutput, SourceImage,
};
use sha2::{Digest, Sha256};

#[derive(Debug, Parser)]
#[command(
    name = "plateshot",
    version,
    about = "Food hero-shot client for hosted inference models"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a styled hero shot from a food category.
    Style(StyleArgs),
    /// Segment the background out of a source photo.
    Clean(EditArgs),
    /// Upscale and sharpen a source photo.
    Enhance(EditArgs),
    /// List the endpoint table.
    Modes,
}

#[derive(Debug, Parser)]
struct StyleArgs {
    #[arg(long)]
    food: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    api_key: Option<String>,
    /// Accepted for parity with the other modes; the style endpoint never
    /// receives it.
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    offline: bool,
    #[arg(long)]
    emit_data_url: bool,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    food: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    emit_data_url: bool,
}

fn main() {
    env_logger::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("plateshot error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Style(args) => run_style(args)?,
        Command::Clean(args) => run_edit(EditMode::BackgroundCleaning, args)?,
        Command::Enhance(args) => run_edit(EditMode::QualityImprovement, args)?,
        Command::Modes => run_modes()?,
    }
    Ok(0)
}

fn run_style(args: StyleArgs) -> Result<()> {
    if let Some(image) = &args.image {
        info!(
            "the style endpoint does not take a source photo; ignoring {}",
            image.display()
        );
    }
    let mode = EditMode::Style;
    let client = InferenceClient::new();
    let prompt = build_prompt(&args.food, mode.label());

    let output = if args.offline {
        InferenceOutput::Image(render_placeholder(&args.food, mode.label(), 1024, 1024)?)
    } else {
        let api_key = resolve_api_key(args.api_key.as_deref())?;
        client.render(&api_key, &args.food, mode.label(), None)?
    };

    present_output(
        &args.out,
        mode,
        &client.registry().resolve(mode).model,
        Some(&args.food),
        Some(&prompt),
        None,
        &output,
        args.offline,
        args.emit_data_url,
    )
}

fn run_edit(mode: EditMode, args: EditArgs) -> Result<()> {
    let api_key = resolve_api_key(args.api_key.as_deref())?;
    let source = SourceImage::from_path(&args.image)?;
    let client = InferenceClient::new();
    let food = args.food.as_deref().unwrap_or("food");

    let output = client.render(&api_key, food, mode.label(), Some(&source))?;

    present_output(
        &args.out,
        mode,
        &client.registry().resolve(mode).model,
        args.food.as_deref(),
        None,
        Some(&args.image),
        &output,
        false,
        args.emit_data_url,
    )
}

fn run_modes() -> Result<()> {
    let client = InferenceClient::new();
    for descriptor in client.registry().list() {
        let shape = match descriptor.response {
            ResponseKind::ImageBytes => "binary image",
            ResponseKind::SegmentationJson => "segmentation mask",
        };
        println!(
            "{:<22} {:<45} {shape}",
            descriptor.mode.label(),
            descriptor.model
        );
    }
    Ok(())
}

fn present_output(
    out_dir: &Path,
    mode: EditMode,
    model: &str,
    food: Option<&str>,
    prompt: Option<&str>,
    source_image: Option<&Path>,
    output: &InferenceOutput,
    offline: bool,
    emit_data_url: bool,
) -> Result<()> {
    let artifact = output.image();
    let artifact_path = out_dir.join(artifact_name(artifact, prompt.unwrap_or(model)));
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    fs::write(&artifact_path, &artifact.bytes)
        .with_context(|| format!("failed to write {}", artifact_path.display()))?;

    let dims = image::load_from_memory(&artifact.bytes)
        .ok()
        .map(|decoded| (decoded.width(), decoded.height()));
    let alt_text = alt_text_for(mode, food, prompt, output.is_mask());

    let receipt = RunReceipt {
        schema_version: RECEIPT_SCHEMA_VERSION,
        created_at: now_utc_iso(),
        mode,
        model: model.to_string(),
        food: food.map(str::to_string),
        prompt: prompt.map(str::to_string),
        source_image: source_image.map(|path| path.to_string_lossy().to_string()),
        artifact_path: artifact_path.to_string_lossy().to_string(),
        alt_text: alt_text.clone(),
        width: dims.map(|(width, _)| width),
        height: dims.map(|(_, height)| height),
        offline,
    };
    write_receipt(&artifact_path.with_extension("json"), &receipt)?;

    match dims {
        Some((width, height)) => println!(
            "wrote {} ({width}x{height}): {alt_text}",
            artifact_path.display()
        ),
        None => println!("wrote {}: {alt_text}", artifact_path.display()),
    }
    if emit_data_url {
        println!("{}", artifact.to_data_url());
    }
    Ok(())
}

fn alt_text_for(mode: EditMode, food: Option<&str>, prompt: Option<&str>, is_mask: bool) -> String {
    if is_mask {
        return match food {
            Some(food) => format!("Foreground mask for {food}"),
            None => "Foreground segmentation mask".to_string(),
        };
    }
    match prompt {
        Some(prompt) => prompt.to_string(),
        None => match food {
            Some(food) => format!("Edited photo of {food} ({mode})"),
            None => format!("Edited photo ({mode})"),
        },
    }
}

fn resolve_api_key(flag: Option<&str>) -> Result<String> {
    flag.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env("HF_API_KEY"))
        .context("no API key supplied; pass --api-key or set HF_API_KEY")
}

fn artifact_name(artifact: &ImageBytes, seed_text: &str) -> String {
    format!(
        "artifact-{}-{}.{}",
        timestamp_millis(),
        short_id(seed_text),
        extension_for_mime(artifact.mime_type.as_deref())
    )
}

fn extension_for_mime(mime: Option<&str>) -> &'static str {
    if let Some(mime) = mime {
        let lowered = mime.to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
    }
    "png"
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

fn short_id(seed_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed_text.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

#[cfg(test)]
mod tests {
    use super::{alt_text_for, extension_for_mime, short_id};
    use plateshot_contracts::edits::EditMode;

    #[test]
    fn extension_prefers_the_response_mime_type() {
        assert_eq!(extension_for_mime(Some("image/jpeg")), "jpg");
        assert_eq!(extension_for_mime(Some("IMAGE/WEBP")), "webp");
        assert_eq!(extension_for_mime(Some("image/png")), "png");
        assert_eq!(extension_for_mime(None), "png");
    }

    #[test]
    fn short_id_is_stable_hex() {
        let first = short_id("Pizza hero shot");
        let second = short_id("Pizza hero shot");
        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn mask_alt_text_names_the_food_when_known() {
        assert_eq!(
            alt_text_for(EditMode::BackgroundCleaning, Some("Pizza"), None, true),
            "Foreground mask for Pizza"
        );
        assert_eq!(
            alt_text_for(EditMode::QualityImprovement, Some("Ramen"), None, false),
            "Edited photo of Ramen (quality-improvement)"
        );
    }
}
