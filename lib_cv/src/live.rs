use std::path::Path;

use log::{debug, info};
use opencv::calib3d::undistort_def;
use opencv::prelude::*;
use opencv::videoio::{CAP_ANY, VideoCapture};

use crate::calibration::CameraIntrinsics;
use crate::display::{FrameSource, FrameViewer, is_escape};
use crate::error::{Error, Result};
use crate::storage::load_camera_parameters;

pub const ORIGINAL_WINDOW: &str = "Original";
pub const UNDISTORTED_WINDOW: &str = "Undistorted";

/// Показывает исходные и исправленные кадры до ESC или конца потока.
/// Возвращает количество показанных кадров. Окна закрываются и при ошибке.
pub fn run_undistort_loop(
    source: &mut impl FrameSource,
    intrinsics: &CameraIntrinsics,
    viewer: &mut impl FrameViewer,
) -> Result<usize> {
    viewer.open_window(ORIGINAL_WINDOW, true)?;
    viewer.open_window(UNDISTORTED_WINDOW, true)?;

    let shown = undistort_frames(source, intrinsics, viewer);
    let closed = viewer.close_all();
    let frames = shown?;
    closed?;
    Ok(frames)
}

fn undistort_frames(
    source: &mut impl FrameSource,
    intrinsics: &CameraIntrinsics,
    viewer: &mut impl FrameViewer,
) -> Result<usize> {
    let mut frame = Mat::default();
    let mut undistorted = Mat::default();
    let mut frames = 0;

    loop {
        if !source.next_frame(&mut frame)? || frame.empty() {
            debug!("Поток кадров закончился");
            break;
        }

        undistort_def(
            &frame,
            &mut undistorted,
            &intrinsics.camera_matrix,
            &intrinsics.distortion,
        )?;

        viewer.show(ORIGINAL_WINDOW, &frame)?;
        viewer.show(UNDISTORTED_WINDOW, &undistorted)?;
        frames += 1;

        if is_escape(viewer.wait_key(1)?) {
            break;
        }
    }
    Ok(frames)
}

pub fn open_camera(camera_index: i32) -> Result<VideoCapture> {
    let cap = VideoCapture::new(camera_index, CAP_ANY)
        .map_err(|_| Error::CameraUnavailable(camera_index))?;
    if !cap.is_opened()? {
        return Err(Error::CameraUnavailable(camera_index));
    }
    info!("Камера {} открыта, ESC для выхода", camera_index);
    Ok(cap)
}

/// Загружает параметры и открывает камеру. Ошибка на любом шаге прерывает тест.
pub fn run_live_test(
    calibration_path: &Path,
    camera_index: i32,
    viewer: &mut impl FrameViewer,
) -> Result<usize> {
    run_live_test_with(calibration_path, || open_camera(camera_index), viewer)
}

/// То же, что `run_live_test`, но источник кадров создаёт `open_source`.
/// Источник открывается только после успешной загрузки параметров.
pub fn run_live_test_with<S: FrameSource>(
    calibration_path: &Path,
    open_source: impl FnOnce() -> Result<S>,
    viewer: &mut impl FrameViewer,
) -> Result<usize> {
    let intrinsics = load_camera_parameters(calibration_path)?;
    info!("Параметры камеры загружены из {}", calibration_path.display());

    let mut source = open_source()?;
    let frames = run_undistort_loop(&mut source, &intrinsics, viewer)?;
    info!("Показано {} кадров", frames);
    Ok(frames)
}
