use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use octa_renderer::{ImageBuffer, SceneDescription, WorkerPool};

/// Render a JSON scene to a TIFF or PNG image
#[derive(Parser, Debug)]
#[command(name = "octa", version, about)]
struct Args {
    /// Scene description (JSON)
    scene: PathBuf,

    /// Output image; `.png` writes PNG, anything else TIFF
    #[arg(short = 'o', long, default_value = "out.tif")]
    output: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Extra rays per critical pixel, 0 disables antialiasing
    #[arg(long)]
    aa_rays: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Intersect primitives linearly instead of through the octree
    #[arg(long, action)]
    no_bvt: bool,
}

impl Args {
    fn apply(&self, desc: &mut SceneDescription) {
        let settings = &mut desc.settings;
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(threads) = self.threads {
            settings.threads = threads;
        }
        if let Some(aa_rays) = self.aa_rays {
            settings.aa_rays = aa_rays;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if self.no_bvt {
            settings.use_bvt = false;
        }
    }
}

fn save(image: &ImageBuffer, path: &Path) -> Result<()> {
    let rgb = image.to_rgb8();
    let is_png = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);

    if is_png {
        let buffer = image::RgbImage::from_raw(image.width, image.height, rgb)
            .context("Image buffer does not match its dimensions")?;
        buffer.save(path)?;
    } else {
        octa_core::tiff::save_rgb(path, image.width, image.height, &rgb)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let start = Instant::now();

    let mut desc = SceneDescription::load(&args.scene)
        .with_context(|| format!("Failed to load scene {}", args.scene.display()))?;
    args.apply(&mut desc);

    let scene = desc.prepare().context("Failed to prepare scene")?;

    let pool = WorkerPool::from_settings(&scene.settings)?;
    let image = pool.render_all(&scene)?;

    save(&image, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    log::info!("Wrote {} in {:.2?}", args.output.display(), start.elapsed());

    Ok(())
}
