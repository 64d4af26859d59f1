use std::thread;

use anyhow::{Context, bail};
use log::{error, info};
use rand::{RngCore, SeedableRng};
use rand_xoshiro::SplitMix64;

use overlay::{BackgroundCalibration, calibration::read_corners};

use crate::{
    config::DatasetConfig,
    engine::{RandomPolicy, ShakmatyEngine},
    episode::{EpisodeContext, EpisodeError, EpisodeSummary, run_episode},
    io::EpisodeWriter,
    raster::Rasterizer,
    render::SvgBoardRenderer,
};

/// Seed for one episode's move policy; independent of which worker runs it.
pub fn episode_seed(base: u64, index: usize) -> u64 {
    let mut sm = SplitMix64::seed_from_u64(base ^ index as u64);
    sm.next_u64()
}

pub fn load_calibration(cfg: &DatasetConfig) -> anyhow::Result<BackgroundCalibration> {
    let corners = read_corners(&cfg.corners_path)
        .with_context(|| format!("reading corners from {}", cfg.corners_path.display()))?;
    let background = image::open(&cfg.background_path)
        .with_context(|| format!("opening background {}", cfg.background_path.display()))?
        .to_rgb8();
    BackgroundCalibration::resolve(background, corners, cfg.side_tolerance)
        .context("calibration corners do not describe an upright square")
}

/// Generates every configured episode and returns their summaries in index order.
///
/// Calibration problems abort before any episode starts. Episode failures are
/// logged as they happen and reported together once all workers are done.
pub fn generate(cfg: &DatasetConfig) -> anyhow::Result<Vec<EpisodeSummary>> {
    cfg.validate()?;
    let format = cfg.image_format()?;
    let calibration = load_calibration(cfg)?;
    let bounds = calibration.bounds();
    info!(
        "board region x={}..{} y={}..{} ({} px), {} episode(s) x {} moves",
        bounds.min_x,
        bounds.max_x,
        bounds.min_y,
        bounds.max_y,
        calibration.side_px(),
        cfg.episodes,
        cfg.moves_per_game
    );

    let rasterizer = Rasterizer::new(&cfg.font_dir);
    let ctx = EpisodeContext {
        calibration: &calibration,
        renderer: &SvgBoardRenderer,
        rasterizer: &rasterizer,
        style: &cfg.style,
        moves_per_game: cfg.moves_per_game,
        normalize: cfg.normalize,
    };

    let run_one = |index: usize| -> Result<EpisodeSummary, EpisodeError> {
        let writer = EpisodeWriter::create(&cfg.dataset_dir, index, &cfg.image_ext, format)?;
        let mut engine = ShakmatyEngine::new();
        let mut policy = RandomPolicy::seeded(episode_seed(cfg.seed, index));
        run_episode(&ctx, index, &mut engine, &mut policy, writer)
    };

    let indices: Vec<usize> = cfg.episode_indices().collect();
    let workers = cfg.workers.min(indices.len()).max(1);
    let mut results: Vec<(usize, Result<EpisodeSummary, EpisodeError>)> = if workers == 1 {
        indices.iter().map(|&i| (i, run_one(i))).collect()
    } else {
        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let mine: Vec<usize> = indices.iter().copied().skip(w).step_by(workers).collect();
                    let run_one = &run_one;
                    s.spawn(move || mine.into_iter().map(|i| (i, run_one(i))).collect::<Vec<_>>())
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    };
    results.sort_by_key(|(i, _)| *i);

    let mut summaries = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (index, result) in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!("game {index} aborted: {e}");
                failed.push(index);
            }
        }
    }
    if !failed.is_empty() {
        bail!("{} episode(s) failed: {:?}", failed.len(), failed);
    }
    Ok(summaries)
}
