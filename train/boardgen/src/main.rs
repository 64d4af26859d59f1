use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut},
    rect::Rect,
};
use log::{info, warn};

use boardgen::{
    config::{Colour, DatasetConfig},
    dataset,
    engine::{RulesEngine, ShakmatyEngine},
    raster::Rasterizer,
    render::{BoardRenderer, SvgBoardRenderer},
};
use overlay::{
    BackgroundCalibration, BoardPoint, Square, SquareMapper,
    calibration::{DEFAULT_SIDE_TOLERANCE, read_corners},
    composite,
};

const MARK: Rgb<u8> = Rgb([230, 20, 40]);

#[derive(Parser)]
#[command(
    name = "boardgen",
    version,
    about = "Render chess games into a background screenshot and label every move"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play random games and write frames plus moves.json per game
    Generate(GenerateArgs),
    /// Validate a corners file against a background and print the geometry
    Calibrate {
        #[arg(long)]
        background: PathBuf,
        #[arg(long)]
        corners: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SIDE_TOLERANCE)]
        tolerance: f64,
    },
    /// Render a single position, optionally composited with square markers
    Preview(PreviewArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dataset_dir: Option<PathBuf>,
    #[arg(long)]
    background: Option<PathBuf>,
    #[arg(long)]
    corners: Option<PathBuf>,
    #[arg(long)]
    moves_per_game: Option<usize>,
    #[arg(long)]
    first_episode: Option<usize>,
    #[arg(long)]
    episodes: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    workers: Option<usize>,
    /// Write coordinates on the 0..1000 scale
    #[arg(long)]
    normalize: bool,
    #[arg(long)]
    image_ext: Option<String>,
    #[arg(long)]
    light: Option<Colour>,
    #[arg(long)]
    dark: Option<Colour>,
    #[arg(long)]
    highlight_last_move: bool,
}

#[derive(Args)]
struct PreviewArgs {
    #[arg(short, long)]
    out: PathBuf,
    /// Position to draw; the initial position if omitted
    #[arg(long)]
    fen: Option<String>,
    /// Board size in pixels when no background is given
    #[arg(long, default_value_t = 360)]
    size: u32,
    #[arg(long)]
    coordinates: bool,
    #[arg(long, requires = "corners")]
    background: Option<PathBuf>,
    #[arg(long, requires = "background")]
    corners: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_SIDE_TOLERANCE)]
    tolerance: f64,
    /// Square to mark, e.g. e4; repeatable
    #[arg(long = "mark")]
    marks: Vec<Square>,
    #[arg(long, default_value = "assets/fonts")]
    font_dir: PathBuf,
}

impl GenerateArgs {
    fn into_config(self) -> Result<DatasetConfig> {
        let mut cfg = match &self.config {
            Some(path) => DatasetConfig::load(path)?,
            None => DatasetConfig::default(),
        };
        if let Some(v) = self.dataset_dir {
            cfg.dataset_dir = v;
        }
        if let Some(v) = self.background {
            cfg.background_path = v;
        }
        if let Some(v) = self.corners {
            cfg.corners_path = v;
        }
        if let Some(v) = self.moves_per_game {
            cfg.moves_per_game = v;
        }
        if let Some(v) = self.first_episode {
            cfg.first_episode = v;
        }
        if let Some(v) = self.episodes {
            cfg.episodes = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.workers {
            cfg.workers = v;
        }
        if let Some(v) = self.image_ext {
            cfg.image_ext = v;
        }
        if let Some(v) = self.light {
            cfg.style.light = v;
        }
        if let Some(v) = self.dark {
            cfg.style.dark = v;
        }
        cfg.normalize |= self.normalize;
        cfg.style.highlight_last_move |= self.highlight_last_move;
        Ok(cfg)
    }
}

fn calibrate(background: PathBuf, corners: PathBuf, tolerance: f64) -> Result<BackgroundCalibration> {
    let points = read_corners(&corners).with_context(|| format!("reading {}", corners.display()))?;
    let image = image::open(&background)
        .with_context(|| format!("opening {}", background.display()))?
        .to_rgb8();
    Ok(BackgroundCalibration::resolve(image, points, tolerance)?)
}

fn mark_board(img: &mut RgbImage, center: (f64, f64), cell: f64) {
    let radius = (cell / 8.0).max(2.0) as i32;
    draw_filled_circle_mut(img, (center.0 as i32, center.1 as i32), radius, MARK);
    let x = (center.0 - cell / 2.0).round() as i32;
    let y = (center.1 - cell / 2.0).round() as i32;
    let side = cell.round().max(1.0) as u32;
    draw_hollow_rect_mut(img, Rect::at(x, y).of_size(side, side), MARK);
}

fn preview(args: PreviewArgs) -> Result<()> {
    let engine = match &args.fen {
        Some(fen) => ShakmatyEngine::from_fen(fen)?,
        None => ShakmatyEngine::new(),
    };
    let style = boardgen::config::BoardStyle {
        coordinates: args.coordinates,
        ..Default::default()
    };
    let svg = SvgBoardRenderer.render(&engine.current_state(), &style)?;
    let rasterizer = Rasterizer::new(&args.font_dir);

    let out = match (args.background, args.corners) {
        (Some(background), Some(corners)) => {
            let cal = calibrate(background, corners, args.tolerance)?;
            if args.coordinates {
                warn!("coordinate labels are drawn on the board; generated datasets never have them");
            }
            let raster = rasterizer.rasterize(&svg, cal.side_px(), &style)?;
            let mut frame = composite(&cal, &raster)?;
            let mapper = SquareMapper::new(&cal);
            let cell = cal.side_px() as f64 / 8.0;
            for sq in &args.marks {
                let p = mapper.image_point(*sq);
                info!(
                    "{sq}: image ({:.1}, {:.1}) label {:?} normalized {:?}",
                    p.x,
                    p.y,
                    mapper.label(*sq, false),
                    mapper.normalized(*sq)
                );
                mark_board(&mut frame, (p.x, p.y), cell);
            }
            frame
        }
        (None, None) => {
            if args.size < 8 {
                bail!("--size must be at least 8 pixels");
            }
            let mut raster = rasterizer.rasterize(&svg, args.size, &style)?;
            let cell = args.size as f64 / 8.0;
            for sq in &args.marks {
                let p = BoardPoint::square_center(*sq, args.size as f64);
                mark_board(&mut raster, (p.x, p.y), cell);
            }
            raster
        }
        _ => bail!("--background and --corners go together"),
    };

    out.save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!("wrote {}", args.out.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => {
            let cfg = args.into_config()?;
            let summaries = dataset::generate(&cfg)?;
            let moves: usize = summaries.iter().map(|s| s.moves).sum();
            info!(
                "wrote {} game(s), {} frame(s) under {}",
                summaries.len(),
                moves,
                cfg.dataset_dir.display()
            );
        }
        Command::Calibrate {
            background,
            corners,
            tolerance,
        } => {
            let cal = calibrate(background, corners, tolerance)?;
            let (width, height) = cal.frame_dimensions();
            let report = serde_json::json!({
                "background": [width, height],
                "corners": cal.corners(),
                "bounds": cal.bounds(),
                "side_length": cal.side_length(),
                "side_px": cal.side_px(),
                "square_px": cal.side_px() as f64 / 8.0,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Preview(args) => preview(args)?,
    }
    Ok(())
}
