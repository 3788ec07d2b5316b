use opencv::core::Size;
use opencv::objdetect::{CharucoBoard, PredefinedDictionaryType, get_predefined_dictionary};
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Геометрия ChArUco доски.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub squares_x: i32,     // количество клеток по горизонтали
    pub squares_y: i32,     // количество клеток по вертикали
    pub square_length: f32, // сторона клетки (метры)
    pub marker_length: f32, // сторона маркера (в тех же единицах)
    pub dictionary: String, // имя словаря в стиле OpenCV, например DICT_6X6_250
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            squares_x: 7,
            squares_y: 5,
            square_length: 0.02,
            marker_length: 0.015,
            dictionary: "DICT_6X6_250".to_string(),
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.squares_x < 2 || self.squares_y < 2 {
            return Err(Error::InvalidBoard(format!(
                "нужно минимум 2x2 клетки, задано {}x{}",
                self.squares_x, self.squares_y
            )));
        }
        if self.square_length <= 0.0 || self.marker_length <= 0.0 {
            return Err(Error::InvalidBoard(
                "размеры клетки и маркера должны быть положительными".to_string(),
            ));
        }
        if self.marker_length >= self.square_length {
            return Err(Error::InvalidBoard(format!(
                "маркер ({}) должен быть меньше клетки ({})",
                self.marker_length, self.square_length
            )));
        }
        Ok(())
    }

    pub fn dictionary_type(&self) -> Result<PredefinedDictionaryType> {
        dictionary_by_name(&self.dictionary)
    }

    /// Количество внутренних углов шахматки, т.е. максимум ChArUco углов на одном кадре.
    pub fn max_corners(&self) -> usize {
        ((self.squares_x - 1) * (self.squares_y - 1)).max(0) as usize
    }

    pub fn build_board(&self) -> Result<CharucoBoard> {
        self.validate()?;
        let dictionary = get_predefined_dictionary(self.dictionary_type()?)?;
        let board = CharucoBoard::new_def(
            Size::new(self.squares_x, self.squares_y),
            self.square_length,
            self.marker_length,
            &dictionary,
        )?;
        Ok(board)
    }
}

/// Ищет предопределённый словарь по имени, перебирая все известные OpenCV типы.
pub fn dictionary_by_name(name: &str) -> Result<PredefinedDictionaryType> {
    let wanted = name.trim().to_ascii_uppercase();
    (0..=21i32)
        .filter_map(|i| PredefinedDictionaryType::try_from(i).ok())
        .find(|dict_type| format!("{:?}", dict_type).to_ascii_uppercase() == wanted)
        .ok_or_else(|| Error::UnknownDictionary(name.to_string()))
}

/// Рисует доску для печати. `margin` - белое поле вокруг доски в пикселях.
pub fn render_board_image(
    config: &BoardConfig,
    px_per_square: i32,
    margin: i32,
) -> Result<Mat> {
    if px_per_square <= 0 || margin < 0 {
        return Err(Error::InvalidBoard(format!(
            "некорректный размер изображения: {} px на клетку, поле {}",
            px_per_square, margin
        )));
    }
    let board = config.build_board()?;
    let mut image = Mat::default();
    board.generate_image(
        Size::new(
            config.squares_x * px_per_square + 2 * margin,
            config.squares_y * px_per_square + 2 * margin,
        ),
        &mut image,
        margin,
        1,
    )?;
    Ok(image)
}
