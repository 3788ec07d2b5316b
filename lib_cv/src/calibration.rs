use opencv::calib3d::calibrate_camera;
use opencv::core::{CV_64F, Point2f, Scalar, Size, TermCriteria, Vector};
use opencv::imgproc;
use opencv::objdetect::{
    CharucoBoard, CharucoDetector, draw_detected_corners_charuco, draw_detected_markers,
};
use opencv::prelude::*;

use crate::error::{Error, Result};

/// Меньше трёх ракурсов калибровку не запускаем.
pub const MIN_CALIBRATION_VIEWS: usize = 3;

/// Минимум углов на кадре, при котором OpenCV принимает плоский вид.
pub const DEFAULT_MIN_CORNERS: usize = 4;

/// Детектор ChArUco, созданный один раз для всей серии изображений.
pub struct BoardDetector {
    board: CharucoBoard,
    detector: CharucoDetector,
}

impl BoardDetector {
    pub fn new(board: CharucoBoard) -> Result<Self> {
        let detector = CharucoDetector::new_def(&board)?;
        Ok(Self { board, detector })
    }

    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }

    /// Поиск маркеров и интерполяция углов шахматки. Цветные кадры переводятся в серый.
    pub fn detect(&self, image: &Mat) -> Result<CharucoDetection> {
        let gray = to_grayscale(image)?;

        let mut detection = CharucoDetection::default();
        self.detector.detect_board(
            &gray,
            &mut detection.charuco_corners,
            &mut detection.charuco_ids,
            &mut detection.marker_corners,
            &mut detection.marker_ids,
        )?;
        Ok(detection)
    }
}

fn to_grayscale(image: &Mat) -> Result<Mat> {
    let code = match image.channels() {
        1 => return Ok(image.clone()),
        3 => imgproc::COLOR_BGR2GRAY,
        4 => imgproc::COLOR_BGRA2GRAY,
        n => {
            return Err(opencv::Error::new(
                opencv::core::StsBadArg,
                format!("Неподдерживаемое число каналов: {}", n),
            )
            .into());
        }
    };
    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, code)?;
    Ok(gray)
}

#[derive(Debug, Default)]
pub struct CharucoDetection {
    pub marker_corners: Vector<Vector<Point2f>>,
    pub marker_ids: Vector<i32>,
    pub charuco_corners: Vector<Point2f>,
    pub charuco_ids: Vector<i32>,
}

impl CharucoDetection {
    pub fn corner_count(&self) -> usize {
        self.charuco_ids.len()
    }

    /// Маркеры рисуются зелёным, углы ChArUco синим.
    pub fn draw(&self, image: &mut Mat) -> Result<()> {
        if !self.marker_ids.is_empty() {
            draw_detected_markers(
                image,
                &self.marker_corners,
                &self.marker_ids,
                Scalar::new(0.0, 255.0, 0.0, 255.0),
            )?;
        }
        if !self.charuco_ids.is_empty() {
            draw_detected_corners_charuco(
                image,
                &self.charuco_corners,
                &self.charuco_ids,
                Scalar::new(255.0, 0.0, 0.0, 255.0),
            )?;
        }
        Ok(())
    }
}

/// Накопленные по всем изображениям соответствия точек доски и изображения.
pub struct CalibrationViews {
    min_corners: usize,
    object_points: Vector<Mat>,
    image_points: Vector<Mat>,
    image_size: Option<Size>,
}

impl CalibrationViews {
    pub fn new(min_corners: usize) -> Self {
        Self {
            min_corners: min_corners.max(1),
            object_points: Vector::new(),
            image_points: Vector::new(),
            image_size: None,
        }
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    /// Размер последнего принятого изображения.
    pub fn image_size(&self) -> Option<Size> {
        self.image_size
    }

    /// Добавляет вид, если углов достаточно. Возвращает `true`, если вид принят.
    pub fn push(
        &mut self,
        board: &CharucoBoard,
        detection: &CharucoDetection,
        image_size: Size,
    ) -> Result<bool> {
        if detection.corner_count() < self.min_corners {
            return Ok(false);
        }

        let mut obj_points = Mat::default();
        let mut img_points = Mat::default();
        board.match_image_points(
            &detection.charuco_corners,
            &detection.charuco_ids,
            &mut obj_points,
            &mut img_points,
        )?;
        if obj_points.empty() || img_points.empty() {
            return Ok(false);
        }

        self.object_points.push(obj_points);
        self.image_points.push(img_points);
        self.image_size = Some(image_size);
        Ok(true)
    }
}

impl std::fmt::Debug for CalibrationViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationViews")
            .field("views", &self.len())
            .field("image_size", &self.image_size)
            .finish()
    }
}

/// Внутренние параметры камеры. Содержимое матриц не проверяется.
#[derive(Debug, Clone)]
pub struct CameraIntrinsics {
    pub camera_matrix: Mat,
    pub distortion: Mat,
}

#[derive(Debug)]
pub struct CalibrationResult {
    pub reprojection_error: f64,
    pub intrinsics: CameraIntrinsics,
    pub r_vecs: Vector<Mat>,
    pub t_vecs: Vector<Mat>,
    pub image_size: Size,
    pub view_count: usize,
}

pub fn calibrate(views: &CalibrationViews) -> Result<CalibrationResult> {
    let image_size = match views.image_size {
        Some(size) if views.len() >= MIN_CALIBRATION_VIEWS => size,
        _ => {
            return Err(Error::NotEnoughViews {
                found: views.len(),
                required: MIN_CALIBRATION_VIEWS,
            });
        }
    };

    let mut camera_matrix = Mat::default();
    let mut dist_coeffs = Mat::default();
    let mut r_vecs = Vector::<Mat>::new();
    let mut t_vecs = Vector::<Mat>::new();

    let criteria = TermCriteria::new(
        opencv::core::TermCriteria_COUNT + opencv::core::TermCriteria_EPS,
        30,
        f64::EPSILON,
    )?;

    let reprojection_error = calibrate_camera(
        &views.object_points,
        &views.image_points,
        image_size,
        &mut camera_matrix,
        &mut dist_coeffs,
        &mut r_vecs,
        &mut t_vecs,
        0,
        criteria,
    )?;

    Ok(CalibrationResult {
        reprojection_error,
        intrinsics: CameraIntrinsics {
            camera_matrix,
            distortion: dist_coeffs,
        },
        r_vecs,
        t_vecs,
        image_size,
        view_count: views.len(),
    })
}

/// Построчное текстовое представление матрицы для вывода в консоль.
pub fn format_matrix(mat: &Mat) -> Result<String> {
    let mut values = Mat::default();
    mat.convert_to(&mut values, CV_64F, 1.0, 0.0)?;

    let mut rows = Vec::with_capacity(values.rows() as usize);
    for r in 0..values.rows() {
        let mut row = Vec::with_capacity(values.cols() as usize);
        for c in 0..values.cols() {
            row.push(format!("{:.6}", *values.at_2d::<f64>(r, c)?));
        }
        rows.push(format!("[{}]", row.join(", ")));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use crate::test_support::{rendered_board, tilted_views};

    fn detector() -> BoardDetector {
        BoardDetector::new(BoardConfig::default().build_board().unwrap()).unwrap()
    }

    #[test]
    fn detects_corners_on_rendered_board() {
        let detector = detector();
        let image = rendered_board();
        let detection = detector.detect(&image).unwrap();

        let max = BoardConfig::default().max_corners();
        assert!(!detection.marker_ids.is_empty());
        assert!(detection.corner_count() >= max / 2);
        assert!(detection.corner_count() <= max);
        assert_eq!(detection.charuco_corners.len(), detection.corner_count());
    }

    #[test]
    fn blank_image_has_no_detection() {
        let detector = detector();
        let blank =
            Mat::new_rows_cols_with_default(240, 320, opencv::core::CV_8UC3, Scalar::all(255.0))
                .unwrap();
        let detection = detector.detect(&blank).unwrap();
        assert_eq!(detection.corner_count(), 0);

        let mut views = CalibrationViews::new(DEFAULT_MIN_CORNERS);
        let accepted = views
            .push(detector.board(), &detection, Size::new(320, 240))
            .unwrap();
        assert!(!accepted);
        assert!(views.is_empty());
        assert_eq!(views.image_size(), None);
    }

    #[test]
    fn views_below_corner_threshold_are_rejected() {
        let detector = detector();
        let image = rendered_board();
        let detection = detector.detect(&image).unwrap();

        let mut strict = CalibrationViews::new(detection.corner_count() + 1);
        assert!(!strict.push(detector.board(), &detection, image.size().unwrap()).unwrap());

        let mut relaxed = CalibrationViews::new(DEFAULT_MIN_CORNERS);
        assert!(relaxed.push(detector.board(), &detection, image.size().unwrap()).unwrap());
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed.image_size(), Some(image.size().unwrap()));
    }

    #[test]
    fn calibration_requires_three_views() {
        let detector = detector();
        let image = rendered_board();
        let detection = detector.detect(&image).unwrap();

        let mut views = CalibrationViews::new(DEFAULT_MIN_CORNERS);
        for _ in 0..2 {
            views
                .push(detector.board(), &detection, image.size().unwrap())
                .unwrap();
        }

        match calibrate(&views) {
            Err(Error::NotEnoughViews { found, required }) => {
                assert_eq!(found, 2);
                assert_eq!(required, MIN_CALIBRATION_VIEWS);
            }
            other => panic!("ожидалась ошибка NotEnoughViews, получено {:?}", other),
        }
    }

    #[test]
    fn empty_views_are_not_calibrated() {
        let views = CalibrationViews::new(DEFAULT_MIN_CORNERS);
        assert!(matches!(
            calibrate(&views),
            Err(Error::NotEnoughViews { found: 0, .. })
        ));
    }

    #[test]
    fn calibrates_from_tilted_views() {
        let detector = detector();
        let mut views = CalibrationViews::new(DEFAULT_MIN_CORNERS);
        for image in tilted_views() {
            let detection = detector.detect(&image).unwrap();
            views
                .push(detector.board(), &detection, image.size().unwrap())
                .unwrap();
        }
        assert!(views.len() >= MIN_CALIBRATION_VIEWS);

        let result = calibrate(&views).unwrap();
        assert!(result.reprojection_error.is_finite());
        assert_eq!(result.view_count, views.len());
        assert_eq!(result.r_vecs.len(), views.len());
        assert_eq!(result.intrinsics.camera_matrix.rows(), 3);
        assert_eq!(result.intrinsics.camera_matrix.cols(), 3);
        assert!(!result.intrinsics.distortion.empty());
    }

    #[test]
    fn formats_matrix_rows() {
        let mat = Mat::from_slice_2d(&[[1.0f64, 0.0], [0.5, 2.0]]).unwrap();
        let text = format_matrix(&mat).unwrap();
        assert_eq!(text, "[1.000000, 0.000000]\n[0.500000, 2.000000]");
    }
}
