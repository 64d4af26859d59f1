use std::{fmt, io};

use log::{debug, info};
use thiserror::Error;

use overlay::{BackgroundCalibration, DimensionMismatchError, SquareMapper, composite};

use crate::{
    config::BoardStyle,
    engine::{MovePolicy, RulesEngine},
    io::EpisodeWriter,
    raster::Rasterizer,
    record::MoveRecord,
    render::{BoardRenderer, RenderError},
};

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("move {move_number}: {source}")]
    Render {
        move_number: usize,
        source: RenderError,
    },
    #[error("move {move_number}: {source}")]
    Dimension {
        move_number: usize,
        source: DimensionMismatchError,
    },
    #[error("move {move_number} ({notation}) has no origin square")]
    MissingOrigin { move_number: usize, notation: String },
    #[error("move {move_number}: failed to write frame: {source}")]
    Frame {
        move_number: usize,
        source: image::ImageError,
    },
    #[error("episode output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    GameOver,
    MoveCap,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::GameOver => write!(f, "game over"),
            Termination::MoveCap => write!(f, "move cap reached"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeSummary {
    pub index: usize,
    pub moves: usize,
    pub termination: Termination,
}

/// Everything an episode reads but never changes; shared across episodes.
pub struct EpisodeContext<'a, R> {
    pub calibration: &'a BackgroundCalibration,
    pub renderer: &'a R,
    pub rasterizer: &'a Rasterizer,
    pub style: &'a BoardStyle,
    pub moves_per_game: usize,
    pub normalize: bool,
}

/// Plays one game and writes a frame plus a label for every move.
///
/// Stops at `moves_per_game` or when the engine reports the game over.
/// The manifest is written only if every move made it to disk; on error the
/// episode directory may hold frames but no `moves.json`.
pub fn run_episode<R, E, P>(
    ctx: &EpisodeContext<'_, R>,
    index: usize,
    engine: &mut E,
    policy: &mut P,
    writer: EpisodeWriter,
) -> Result<EpisodeSummary, EpisodeError>
where
    R: BoardRenderer,
    E: RulesEngine,
    P: MovePolicy,
{
    let mapper = SquareMapper::new(ctx.calibration);
    let side = ctx.calibration.side_px();
    let mut records = Vec::with_capacity(ctx.moves_per_game);
    let mut termination = Termination::MoveCap;

    for move_number in 0..ctx.moves_per_game {
        if engine.is_over() {
            termination = Termination::GameOver;
            break;
        }
        let Some(mv) = policy.choose(&engine.legal_moves()) else {
            termination = Termination::GameOver;
            break;
        };

        let uci = engine.to_notation(&mv);
        let (from, to) = engine
            .squares_of(&mv)
            .ok_or_else(|| EpisodeError::MissingOrigin {
                move_number,
                notation: uci.clone(),
            })?;
        engine.apply(&mv);

        let svg = ctx
            .renderer
            .render(&engine.current_state(), ctx.style)
            .map_err(|source| EpisodeError::Render { move_number, source })?;
        let raster = ctx
            .rasterizer
            .rasterize(&svg, side, ctx.style)
            .map_err(|source| EpisodeError::Render { move_number, source })?;
        let frame = composite(ctx.calibration, &raster)
            .map_err(|source| EpisodeError::Dimension { move_number, source })?;
        let image = writer
            .write_frame(move_number, &frame)
            .map_err(|source| EpisodeError::Frame { move_number, source })?;
        drop(frame);

        let record = MoveRecord {
            move_number,
            uci,
            from_square: from.to_string(),
            to_square: to.to_string(),
            from_coords: mapper.label(from, ctx.normalize),
            to_coords: mapper.label(to, ctx.normalize),
            image,
        };
        debug!(
            "game {index} move {move_number}: {} {:?} -> {:?}",
            record.uci, record.from_coords, record.to_coords
        );
        records.push(record);
    }

    let manifest = writer.finish(&records)?;
    info!(
        "game {index}: {} moves, {termination}, manifest {}",
        records.len(),
        manifest.display()
    );
    Ok(EpisodeSummary {
        index,
        moves: records.len(),
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        board::BoardState,
        engine::{RandomPolicy, ShakmatyEngine},
        io::{MANIFEST_NAME, episode_dir, read_manifest},
        render::{SvgBoardRenderer, VectorImage},
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use overlay::{Corner, Square, calibration::DEFAULT_SIDE_TOLERANCE};
    use std::{
        cell::Cell,
        fs,
        path::{Path, PathBuf},
    };

    /// Scripted engine: plays the listed moves in order, then reports game over.
    struct ScriptedEngine {
        moves: Vec<(&'static str, &'static str)>,
        played: usize,
    }

    impl ScriptedEngine {
        fn new(moves: &[(&'static str, &'static str)]) -> Self {
            Self {
                moves: moves.to_vec(),
                played: 0,
            }
        }
    }

    impl RulesEngine for ScriptedEngine {
        type Move = (&'static str, &'static str);

        fn current_state(&self) -> BoardState {
            BoardState::empty()
        }

        fn legal_moves(&self) -> Vec<Self::Move> {
            self.moves.get(self.played).copied().into_iter().collect()
        }

        fn apply(&mut self, _mv: &Self::Move) {
            self.played += 1;
        }

        fn is_over(&self) -> bool {
            self.played >= self.moves.len()
        }

        fn to_notation(&self, mv: &Self::Move) -> String {
            format!("{}{}", mv.0, mv.1)
        }

        fn squares_of(&self, mv: &Self::Move) -> Option<(Square, Square)> {
            Some((mv.0.parse().ok()?, mv.1.parse().ok()?))
        }
    }

    struct FirstMove;

    impl MovePolicy for FirstMove {
        fn choose<M: Clone>(&mut self, moves: &[M]) -> Option<M> {
            moves.first().cloned()
        }
    }

    /// Solid green board; fails from the `fail_at`-th call on.
    struct FlatRenderer {
        calls: Cell<usize>,
        fail_at: Option<usize>,
    }

    impl FlatRenderer {
        fn new(fail_at: Option<usize>) -> Self {
            Self {
                calls: Cell::new(0),
                fail_at,
            }
        }
    }

    impl BoardRenderer for FlatRenderer {
        fn render(&self, _state: &BoardState, _style: &BoardStyle) -> Result<VectorImage, RenderError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if self.fail_at.is_some_and(|k| n >= k) {
                return Err(RenderError::Svg("renderer offline".into()));
            }
            Ok(VectorImage(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect width="8" height="8" fill="#00ff00"/></svg>"##
                    .to_string(),
            ))
        }
    }

    fn calibration() -> BackgroundCalibration {
        let corners = [
            Corner::new(16, 8),
            Corner::new(80, 8),
            Corner::new(80, 72),
            Corner::new(16, 72),
        ];
        BackgroundCalibration::resolve(
            RgbImage::from_pixel(120, 90, Rgb([0, 0, 255])),
            corners,
            DEFAULT_SIDE_TOLERANCE,
        )
        .unwrap()
    }

    fn run<E: RulesEngine, R: BoardRenderer>(
        root: &Path,
        renderer: &R,
        engine: &mut E,
        moves_per_game: usize,
        normalize: bool,
    ) -> Result<EpisodeSummary, EpisodeError> {
        let cal = calibration();
        let rasterizer = Rasterizer::new("/nonexistent/fonts");
        let style = BoardStyle::default();
        let ctx = EpisodeContext {
            calibration: &cal,
            renderer,
            rasterizer: &rasterizer,
            style: &style,
            moves_per_game,
            normalize,
        };
        let writer = EpisodeWriter::create(root, 0, "png", ImageFormat::Png).unwrap();
        run_episode(&ctx, 0, engine, &mut FirstMove, writer)
    }

    fn images_in(dir: PathBuf) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("move_"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn one_move_episode() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("e2", "e4"), ("e7", "e5")]);
        let summary = run(root.path(), &FlatRenderer::new(None), &mut engine, 1, false).unwrap();
        assert_eq!(summary.moves, 1);
        assert_eq!(summary.termination, Termination::MoveCap);

        let dir = episode_dir(root.path(), 0);
        assert_eq!(images_in(dir.clone()), vec!["move_0.png"]);
        let records = read_manifest(dir.join(MANIFEST_NAME)).unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.move_number, 0);
        assert_eq!(rec.uci, "e2e4");
        assert_eq!((rec.from_square.as_str(), rec.to_square.as_str()), ("e2", "e4"));
        // 64px board at (16, 8): 8px squares, centres at +4.
        assert_eq!(rec.from_coords, [16 + 36, 8 + 52]);
        assert_eq!(rec.to_coords, [16 + 36, 8 + 36]);
        assert_eq!(rec.image, "move_0.png");

        let frame = image::open(dir.join("move_0.png")).unwrap().to_rgb8();
        assert_eq!(frame.dimensions(), (120, 90));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 255]));
        assert_eq!(*frame.get_pixel(rec.to_coords[0], rec.to_coords[1]), Rgb([0, 255, 0]));
    }

    #[test]
    fn zero_move_cap_writes_empty_manifest() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("e2", "e4")]);
        let summary = run(root.path(), &FlatRenderer::new(None), &mut engine, 0, false).unwrap();
        assert_eq!(summary.moves, 0);

        let dir = episode_dir(root.path(), 0);
        assert!(images_in(dir.clone()).is_empty());
        assert!(read_manifest(dir.join(MANIFEST_NAME)).unwrap().is_empty());
    }

    #[test]
    fn stops_when_game_is_over() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("e2", "e4"), ("e7", "e5"), ("g1", "f3")]);
        let summary = run(root.path(), &FlatRenderer::new(None), &mut engine, 10, false).unwrap();
        assert_eq!(summary.moves, 3);
        assert_eq!(summary.termination, Termination::GameOver);

        let records = read_manifest(episode_dir(root.path(), 0).join(MANIFEST_NAME)).unwrap();
        let numbers: Vec<_> = records.iter().map(|r| r.move_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn render_failure_leaves_no_manifest() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("e2", "e4"), ("e7", "e5"), ("g1", "f3")]);
        let err = run(root.path(), &FlatRenderer::new(Some(1)), &mut engine, 3, false).unwrap_err();
        assert!(matches!(err, EpisodeError::Render { move_number: 1, .. }), "{err}");

        let dir = episode_dir(root.path(), 0);
        assert!(!dir.join(MANIFEST_NAME).exists());
        assert_eq!(images_in(dir), vec!["move_0.png"]);
    }

    #[test]
    fn missing_origin_aborts() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("??", "e4")]);
        let err = run(root.path(), &FlatRenderer::new(None), &mut engine, 1, false).unwrap_err();
        assert!(matches!(err, EpisodeError::MissingOrigin { move_number: 0, .. }));
        assert!(!episode_dir(root.path(), 0).join(MANIFEST_NAME).exists());
    }

    #[test]
    fn normalized_labels_use_frame_extents() {
        let root = tempfile::tempdir().unwrap();
        let mut engine = ScriptedEngine::new(&[("e2", "e4")]);
        run(root.path(), &FlatRenderer::new(None), &mut engine, 1, true).unwrap();
        let rec = &read_manifest(episode_dir(root.path(), 0).join(MANIFEST_NAME)).unwrap()[0];
        // e4 centre is (52, 44) in a 120x90 frame.
        assert_eq!(rec.to_coords, [52 * 1000 / 90, 44 * 1000 / 120]);
    }

    #[test]
    fn random_chess_game_with_real_renderer() {
        let root = tempfile::tempdir().unwrap();
        let cal = calibration();
        let rasterizer = Rasterizer::new("/nonexistent/fonts");
        let style = BoardStyle::default();
        let ctx = EpisodeContext {
            calibration: &cal,
            renderer: &SvgBoardRenderer,
            rasterizer: &rasterizer,
            style: &style,
            moves_per_game: 4,
            normalize: false,
        };
        let writer = EpisodeWriter::create(root.path(), 7, "png", ImageFormat::Png).unwrap();
        let summary = run_episode(
            &ctx,
            7,
            &mut ShakmatyEngine::new(),
            &mut RandomPolicy::seeded(11),
            writer,
        )
        .unwrap();
        assert_eq!(summary.moves, 4);

        let records = read_manifest(episode_dir(root.path(), 7).join(MANIFEST_NAME)).unwrap();
        assert_eq!(records.len(), 4);
        let bounds = cal.bounds();
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.move_number, i);
            assert_eq!(r.uci.len(), 4);
            assert!(r.uci.starts_with(&r.from_square));
            for [x, y] in [r.from_coords, r.to_coords] {
                assert!(x >= bounds.min_x && x < bounds.max_x);
                assert!(y >= bounds.min_y && y < bounds.max_y);
            }
        }
    }
}
