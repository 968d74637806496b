//! Image upscaling command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use srvk_sr::{Image, PoolConfig, Recipe, SuperResolution, WorkerPool};
use tokio::task::JoinSet;
use tracing::info;

use super::{get_profile, output_result, EngineArgs};
use crate::Cli;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Upscale an image, or every image in a directory.
///
/// With a directory input the output is a directory; files keep their names.
/// In isolated mode each image runs in its own worker process, so a driver
/// crash fails that image only.
#[derive(Args)]
pub struct UpscaleCommand {
    /// Input image or directory
    input: PathBuf,

    /// Output image or directory
    #[arg(value_name = "DEST")]
    dest: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

/// One finished image.
#[derive(Debug, Serialize)]
struct Upscaled {
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    model: String,
    scale: u32,
    isolated: bool,
    images: Vec<Upscaled>,
}

impl UpscaleCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut profile = get_profile(cli)?;
        self.engine.apply(&mut profile);
        profile.engine.validate()?;

        let jobs = plan_jobs(&self.input, &self.dest)?;
        if jobs.is_empty() {
            anyhow::bail!("no images found in {}", self.input.display());
        }
        info!(images = jobs.len(), isolated = profile.isolated, "upscaling");

        let images = if profile.isolated {
            let mut pool_config = PoolConfig::current_exe()?.with_workers(profile.worker_count());
            if let Some(timeout) = profile.timeout() {
                pool_config = pool_config.with_timeout(timeout);
            }
            let pool = Arc::new(WorkerPool::new(pool_config)?);
            let images = run_isolated(pool.clone(), Recipe::from(&profile.engine), jobs).await;
            pool.shutdown().await;
            images?
        } else {
            let engine = profile.engine.clone();
            tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Upscaled>> {
                let sr = SuperResolution::new(engine)?;
                jobs.into_iter().map(|(input, output)| run_direct(&sr, input, output)).collect()
            })
            .await??
        };

        output_result(
            cli,
            &Report {
                model: profile.engine.model.clone(),
                scale: profile.engine.scale,
                isolated: profile.isolated,
                images,
            },
        )
    }
}

fn run_direct(sr: &SuperResolution, input: PathBuf, output: PathBuf) -> anyhow::Result<Upscaled> {
    let start = Instant::now();
    let image = load_image(&input)?;
    let result = sr
        .process(&image)
        .with_context(|| format!("failed to upscale {}", input.display()))?;
    finish(input, output, result, start)
}

async fn run_isolated(
    pool: Arc<WorkerPool>,
    recipe: Recipe,
    jobs: Vec<(PathBuf, PathBuf)>,
) -> anyhow::Result<Vec<Upscaled>> {
    let mut set = JoinSet::new();
    for (index, (input, output)) in jobs.into_iter().enumerate() {
        let pool = pool.clone();
        let recipe = recipe.clone();
        set.spawn(async move {
            let start = Instant::now();
            let image = load_image(&input)?;
            let result = pool
                .submit(recipe, image)
                .await
                .with_context(|| format!("failed to upscale {}", input.display()))?;
            finish(input, output, result, start).map(|done| (index, done))
        });
    }

    let mut done = Vec::new();
    while let Some(joined) = set.join_next().await {
        done.push(joined??);
    }
    done.sort_by_key(|(index, _)| *index);
    Ok(done.into_iter().map(|(_, upscaled)| upscaled).collect())
}

fn finish(input: PathBuf, output: PathBuf, result: Image, start: Instant) -> anyhow::Result<Upscaled> {
    let (width, height) = (result.width(), result.height());
    save_image(result, &output)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(input = %input.display(), output = %output.display(), width, height, elapsed_ms, "saved");
    Ok(Upscaled {
        input,
        output,
        width,
        height,
        elapsed_ms,
    })
}

/// Pairs each input image with its output path.
fn plan_jobs(input: &Path, output: &Path) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    if !input.is_dir() {
        return Ok(vec![(input.to_path_buf(), output.to_path_buf())]);
    }
    std::fs::create_dir_all(output).with_context(|| format!("failed to create {}", output.display()))?;

    let mut jobs = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let path = entry?.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        if let Some(name) = path.file_name() {
            jobs.push((path.clone(), output.join(name)));
        }
    }
    jobs.sort();
    Ok(jobs)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn load_image(path: &Path) -> anyhow::Result<Image> {
    let decoded = image::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Image::from_dynamic(&decoded)?)
}

fn save_image(image: Image, path: &Path) -> anyhow::Result<()> {
    let mut out = image.into_dynamic()?;
    // JPEG has no alpha channel.
    if matches!(ImageFormat::from_path(path), Ok(ImageFormat::Jpeg)) && out.color().has_alpha() {
        out = DynamicImage::ImageRgb8(out.to_rgb8());
    }
    out.save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}
