use opencv::highgui;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, VideoCaptureTrait};

pub const ESC_KEY: i32 = 27;

/// `wait_key` может вернуть код с модификаторами в старших битах.
pub fn is_escape(key: i32) -> bool {
    key >= 0 && key & 0xFF == ESC_KEY
}

/// Окна вывода и клавиатура. В тестах подменяется сценарием нажатий.
pub trait FrameViewer {
    /// `resizable == false` - окно подстраивается под размер кадра.
    fn open_window(&mut self, name: &str, resizable: bool) -> opencv::Result<()>;
    fn show(&mut self, name: &str, frame: &Mat) -> opencv::Result<()>;
    /// `delay_ms == 0` блокирует до нажатия. Без нажатия возвращает -1.
    fn wait_key(&mut self, delay_ms: i32) -> opencv::Result<i32>;
    fn close_all(&mut self) -> opencv::Result<()>;
}

#[derive(Debug, Default)]
pub struct HighguiViewer;

impl HighguiViewer {
    pub fn new() -> Self {
        Self
    }
}

impl FrameViewer for HighguiViewer {
    fn open_window(&mut self, name: &str, resizable: bool) -> opencv::Result<()> {
        let flags = if resizable {
            highgui::WINDOW_NORMAL
        } else {
            highgui::WINDOW_AUTOSIZE
        };
        highgui::named_window(name, flags)
    }

    fn show(&mut self, name: &str, frame: &Mat) -> opencv::Result<()> {
        highgui::imshow(name, frame)
    }

    fn wait_key(&mut self, delay_ms: i32) -> opencv::Result<i32> {
        highgui::wait_key(delay_ms)
    }

    fn close_all(&mut self) -> opencv::Result<()> {
        highgui::destroy_all_windows()
    }
}

/// Источник кадров живого теста.
pub trait FrameSource {
    /// `false`, когда кадров больше нет.
    fn next_frame(&mut self, frame: &mut Mat) -> opencv::Result<bool>;
}

impl FrameSource for VideoCapture {
    fn next_frame(&mut self, frame: &mut Mat) -> opencv::Result<bool> {
        VideoCaptureTrait::read(self, frame)
    }
}
