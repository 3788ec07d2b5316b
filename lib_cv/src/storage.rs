use std::path::Path;

use opencv::core::{FileStorage, FileStorage_Mode};
use opencv::prelude::*;

use crate::calibration::CameraIntrinsics;
use crate::error::{Error, Result};

pub const CAMERA_MATRIX_KEY: &str = "camera_matrix";
pub const DISTORTION_KEY: &str = "distortion_coefficients";

/// Формат (YAML/XML/JSON) OpenCV выбирает по расширению файла.
pub fn save_camera_parameters(path: &Path, intrinsics: &CameraIntrinsics) -> Result<()> {
    let unwritable = || Error::ConfigUnwritable(path.to_path_buf());

    let mut fs = FileStorage::new(&path.to_string_lossy(), FileStorage_Mode::WRITE as i32, "")
        .map_err(|_| unwritable())?;
    if !fs.is_opened()? {
        return Err(unwritable());
    }

    fs.write_mat(CAMERA_MATRIX_KEY, &intrinsics.camera_matrix)?;
    fs.write_mat(DISTORTION_KEY, &intrinsics.distortion)?;

    fs.release()?;
    Ok(())
}

pub fn load_camera_parameters(path: &Path) -> Result<CameraIntrinsics> {
    let unreadable = || Error::ConfigUnreadable(path.to_path_buf());

    let mut fs = FileStorage::new(&path.to_string_lossy(), FileStorage_Mode::READ as i32, "")
        .map_err(|_| unreadable())?;
    if !fs.is_opened()? {
        return Err(unreadable());
    }

    let camera_matrix = read_mat(&mut fs, path, CAMERA_MATRIX_KEY)?;
    let distortion = read_mat(&mut fs, path, DISTORTION_KEY)?;
    fs.release()?;

    Ok(CameraIntrinsics {
        camera_matrix,
        distortion,
    })
}

fn read_mat(fs: &mut FileStorage, path: &Path, key: &'static str) -> Result<Mat> {
    let missing = || Error::MissingEntry {
        path: path.to_path_buf(),
        key,
    };
    // отсутствующий ключ даёт пустой узел и пустую матрицу
    let mat = fs.get(key)?.mat().map_err(|_| missing())?;
    if mat.empty() {
        return Err(missing());
    }
    Ok(mat)
}
