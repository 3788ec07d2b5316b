//! JSON конфигурация калибровки. Все поля необязательны, значения по умолчанию
//! соответствуют стандартной съёмке: 43 кадра `imgs/1.jpg` ... `imgs/43.jpg`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::image_sequence;
use crate::board::BoardConfig;
use crate::calibration::DEFAULT_MIN_CORNERS;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub image_dir: PathBuf,
    pub first_index: u32,
    pub image_count: u32,
    pub extension: String,
    pub calibration_path: PathBuf,
    pub camera_index: i32,
    pub min_corners: usize,
    pub board: BoardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("imgs"),
            first_index: 1,
            image_count: 43,
            extension: "jpg".to_string(),
            calibration_path: PathBuf::from("calibration.yaml"),
            camera_index: 0,
            min_corners: DEFAULT_MIN_CORNERS,
            board: BoardConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn image_paths(&self) -> Vec<PathBuf> {
        image_sequence(
            &self.image_dir,
            self.first_index,
            self.image_count,
            &self.extension,
        )
    }
}
