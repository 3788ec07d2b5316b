use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use opencv::imgcodecs;
use opencv::prelude::*;

use crate::calibration::{BoardDetector, CalibrationViews};
use crate::display::{FrameViewer, is_escape};
use crate::error::Result;

pub const DETECTION_WINDOW: &str = "ChArUco Detection";

/// Пути `<dir>/<i>.<ext>` для i = first..first+count.
pub fn image_sequence(dir: &Path, first: u32, count: u32, extension: &str) -> Vec<PathBuf> {
    let extension = extension.trim_start_matches('.');
    (first..first.saturating_add(count))
        .map(|i| dir.join(format!("{}.{}", i, extension)))
        .collect()
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub views: CalibrationViews,
    pub shown: usize,          // сколько изображений показано
    pub skipped: Vec<PathBuf>, // не удалось прочитать
    pub failed: Vec<PathBuf>,  // ошибка OpenCV при обработке
    pub aborted: bool,         // прервано по ESC
}

/// Проход по калибровочным изображениям: детекция, отрисовка, ожидание клавиши.
/// Файлы читаются по одному, непрочитанные пропускаются.
pub fn run_batch(
    paths: &[PathBuf],
    detector: &BoardDetector,
    viewer: &mut impl FrameViewer,
    min_corners: usize,
) -> Result<BatchOutcome> {
    let frames = paths.iter().map(|path| (path.clone(), read_image(path)));
    run_batch_frames(frames, detector, viewer, min_corners)
}

fn read_image(path: &Path) -> Option<Mat> {
    match imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR) {
        Ok(img) if !img.empty() => Some(img),
        Ok(_) => {
            error!("Не удалось прочитать {}", path.display());
            None
        }
        Err(e) => {
            error!("Не удалось прочитать {}: {}", path.display(), e);
            None
        }
    }
}

/// Основной цикл над уже загруженными кадрами. `None` - кадр не прочитан.
/// Окно закрывается при любом исходе.
pub fn run_batch_frames(
    frames: impl IntoIterator<Item = (PathBuf, Option<Mat>)>,
    detector: &BoardDetector,
    viewer: &mut impl FrameViewer,
    min_corners: usize,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome {
        views: CalibrationViews::new(min_corners),
        shown: 0,
        skipped: Vec::new(),
        failed: Vec::new(),
        aborted: false,
    };

    viewer.open_window(DETECTION_WINDOW, false)?;
    let looped = batch_loop(frames, detector, viewer, &mut outcome);
    let closed = viewer.close_all();
    looped?;
    closed?;

    info!(
        "Показано {} изображений, пропущено {}, с ошибками {}, пригодных для калибровки {}",
        outcome.shown,
        outcome.skipped.len(),
        outcome.failed.len(),
        outcome.views.len()
    );
    Ok(outcome)
}

fn batch_loop(
    frames: impl IntoIterator<Item = (PathBuf, Option<Mat>)>,
    detector: &BoardDetector,
    viewer: &mut impl FrameViewer,
    outcome: &mut BatchOutcome,
) -> Result<()> {
    for (path, image) in frames {
        let Some(mut image) = image else {
            outcome.skipped.push(path);
            continue;
        };

        match annotate(detector, &mut outcome.views, &mut image) {
            Ok((true, _)) => info!("Обработано {}", path.display()),
            Ok((false, 0)) => {}
            Ok((false, corners)) => warn!(
                "{}: найдено только {} углов, кадр не используется",
                path.display(),
                corners
            ),
            Err(e) => {
                error!("Ошибка обработки {}: {}", path.display(), e);
                outcome.failed.push(path);
                continue;
            }
        }

        viewer.show(DETECTION_WINDOW, &image)?;
        outcome.shown += 1;
        if is_escape(viewer.wait_key(0)?) {
            info!("Прервано пользователем");
            outcome.aborted = true;
            break;
        }
    }
    Ok(())
}

/// Детекция, отрисовка и накопление. Возвращает (принят ли кадр, число углов).
fn annotate(
    detector: &BoardDetector,
    views: &mut CalibrationViews,
    image: &mut Mat,
) -> Result<(bool, usize)> {
    let detection = detector.detect(image)?;
    debug!(
        "маркеров {}, углов ChArUco {}",
        detection.marker_ids.len(),
        detection.corner_count()
    );
    detection.draw(image)?;
    let accepted = views.push(detector.board(), &detection, image.size()?)?;
    Ok((accepted, detection.corner_count()))
}
