use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use lib_cv::batch::run_batch;
use lib_cv::board::render_board_image;
use lib_cv::calibration::{BoardDetector, calibrate, format_matrix};
use lib_cv::config::AppConfig;
use lib_cv::display::HighguiViewer;
use lib_cv::live::run_live_test;
use lib_cv::storage::save_camera_parameters;
use log::{error, info};
use opencv::core::Vector;
use opencv::imgcodecs;

#[derive(Parser)]
#[command(name = "calibration_app")]
#[command(about = "Калибровка камеры по ChArUco доске и проверка на живом видео")]
#[command(version)]
struct Cli {
    /// JSON файл с настройками (см. `init-config`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Пройти по снимкам доски, откалибровать камеру и сохранить параметры.
    Calibrate(CalibrateArgs),

    /// Исправлять дисторсию видео с камеры по сохранённым параметрам.
    Live {
        /// Файл с параметрами камеры.
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Индекс камеры.
        #[arg(long)]
        camera: Option<i32>,
    },

    /// Сохранить изображение доски для печати.
    Board {
        #[arg(long, default_value = "charuco_board.png")]
        output: PathBuf,

        #[arg(long, default_value_t = 100)]
        px_per_square: i32,

        #[arg(long, default_value_t = 20)]
        margin: i32,
    },

    /// Записать настройки по умолчанию в JSON.
    InitConfig { path: PathBuf },
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Папка со снимками `1.jpg`, `2.jpg`, ...
    #[arg(long)]
    images: Option<PathBuf>,

    /// Количество снимков.
    #[arg(long)]
    count: Option<u32>,

    /// Куда сохранить параметры камеры (YAML).
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    camera: Option<i32>,

    /// Не запускать проверку на живом видео после калибровки.
    #[arg(long)]
    no_live: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match AppConfig::load_json(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Не удалось загрузить настройки {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    let result = match cli.command {
        Commands::Calibrate(args) => run_calibrate(config, &args),
        Commands::Live {
            calibration,
            camera,
        } => run_live(config, calibration, camera),
        Commands::Board {
            output,
            px_per_square,
            margin,
        } => run_board(&config, &output, px_per_square, margin),
        Commands::InitConfig { path } => config.write_json(&path).map(|_| {
            info!("Настройки записаны в {}", path.display());
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_calibrate(mut config: AppConfig, args: &CalibrateArgs) -> lib_cv::Result<()> {
    if let Some(images) = &args.images {
        config.image_dir = images.clone();
    }
    if let Some(count) = args.count {
        config.image_count = count;
    }
    if let Some(output) = &args.output {
        config.calibration_path = output.clone();
    }
    if let Some(camera) = args.camera {
        config.camera_index = camera;
    }

    info!(
        "Поиск калибровочных изображений в: {}",
        config.image_dir.display()
    );
    let detector = BoardDetector::new(config.board.build_board()?)?;
    let mut viewer = HighguiViewer::new();

    let outcome = run_batch(
        &config.image_paths(),
        &detector,
        &mut viewer,
        config.min_corners,
    )?;

    let result = calibrate(&outcome.views)?;
    info!(
        "Калибровка по {} изображениям размером {}x{}",
        result.view_count, result.image_size.width, result.image_size.height
    );

    println!("Ошибка репроекции: {}", result.reprojection_error);
    println!("Матрица камеры:\n{}", format_matrix(&result.intrinsics.camera_matrix)?);
    println!(
        "Коэффициенты дисторсии:\n{}",
        format_matrix(&result.intrinsics.distortion)?
    );

    save_camera_parameters(&config.calibration_path, &result.intrinsics)?;
    info!(
        "Калибровка сохранена в {}",
        config.calibration_path.display()
    );

    if args.no_live {
        return Ok(());
    }
    run_live_test(&config.calibration_path, config.camera_index, &mut viewer)?;
    Ok(())
}

fn run_live(
    config: AppConfig,
    calibration: Option<PathBuf>,
    camera: Option<i32>,
) -> lib_cv::Result<()> {
    let path = calibration.unwrap_or(config.calibration_path);
    let camera = camera.unwrap_or(config.camera_index);
    run_live_test(&path, camera, &mut HighguiViewer::new())?;
    Ok(())
}

fn run_board(
    config: &AppConfig,
    output: &Path,
    px_per_square: i32,
    margin: i32,
) -> lib_cv::Result<()> {
    let image = render_board_image(&config.board, px_per_square, margin)?;
    let written = imgcodecs::imwrite(&output.to_string_lossy(), &image, &Vector::new())?;
    if !written {
        return Err(lib_cv::Error::Io(std::io::Error::other(format!(
            "OpenCV не смог записать {}",
            output.display()
        ))));
    }
    info!(
        "Доска {}x{} ({}) сохранена в {}",
        config.board.squares_x,
        config.board.squares_y,
        config.board.dictionary,
        output.display()
    );
    Ok(())
}
