use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Недостаточно изображений для калибровки: {found} (требуется минимум {required})")]
    NotEnoughViews { found: usize, required: usize },
    #[error("Не удалось открыть файл калибровки {0}")]
    ConfigUnreadable(PathBuf),
    #[error("Не удалось открыть файл {0} для записи")]
    ConfigUnwritable(PathBuf),
    #[error("В файле {path} нет записи `{key}`")]
    MissingEntry { path: PathBuf, key: &'static str },
    #[error("Не удалось открыть камеру с индексом {0}")]
    CameraUnavailable(i32),
    #[error("Неизвестный словарь маркеров: {0}")]
    UnknownDictionary(String),
    #[error("Некорректные параметры доски: {0}")]
    InvalidBoard(String),
}

pub type Result<T> = std::result::Result<T, Error>;
