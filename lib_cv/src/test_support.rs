//! Синтетические кадры для тестов: доска рисуется самим OpenCV.

use opencv::core::{BORDER_CONSTANT, Point2f, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::board::{BoardConfig, render_board_image};

pub const PX_PER_SQUARE: i32 = 80;
pub const MARGIN: i32 = 40;

/// Фронтальное изображение доски по умолчанию, BGR.
pub fn rendered_board() -> Mat {
    let gray = render_board_image(&BoardConfig::default(), PX_PER_SQUARE, MARGIN).unwrap();
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&gray, &mut bgr, imgproc::COLOR_GRAY2BGR).unwrap();
    bgr
}

/// Несколько перспективных искажений одной доски, чтобы у калибровки были разные ракурсы.
pub fn tilted_views() -> Vec<Mat> {
    let board = rendered_board();
    let w = board.cols() as f32;
    let h = board.rows() as f32;
    let dx = w * 0.08;
    let dy = h * 0.08;

    let src: Vector<Point2f> = Vector::from_iter([
        Point2f::new(0.0, 0.0),
        Point2f::new(w, 0.0),
        Point2f::new(w, h),
        Point2f::new(0.0, h),
    ]);
    let targets = [
        // наклон влево
        [(dx, dy), (w, 0.0), (w, h), (dx, h - dy)],
        // наклон вправо
        [(0.0, 0.0), (w - dx, dy), (w - dx, h - dy), (0.0, h)],
        // наклон вверх
        [(dx, dy), (w - dx, dy), (w, h), (0.0, h)],
        // наклон вниз
        [(0.0, 0.0), (w, 0.0), (w - dx, h - dy), (dx, h - dy)],
    ];

    targets
        .iter()
        .map(|corners| {
            let dst: Vector<Point2f> = corners
                .iter()
                .map(|&(x, y)| Point2f::new(x, y))
                .collect();
            let homography = imgproc::get_perspective_transform_def(&src, &dst).unwrap();
            let mut warped = Mat::default();
            imgproc::warp_perspective(
                &board,
                &mut warped,
                &homography,
                board.size().unwrap(),
                imgproc::INTER_LINEAR,
                BORDER_CONSTANT,
                Scalar::all(255.0),
            )
            .unwrap();
            warped
        })
        .collect()
}

/// Сохраняет кадр в файл, для тестов пакетного прохода.
pub fn write_image(path: &std::path::Path, image: &Mat) {
    let ok = opencv::imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::new()).unwrap();
    assert!(ok, "не удалось записать {}", path.display());
}
