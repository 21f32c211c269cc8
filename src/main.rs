/// Monocular visual odometry driver.
///
/// mono-vo -k K.txt (-i images/ | --euroc V1_01_easy/) [--feature-type fast|sift|orb|gftt]
///         [--true-scale --ground-truth poses.txt] [--output estimated_poses.txt]
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use opencv::core::{Mat, Point2i, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::imgcodecs;
use opencv::imgproc::LINE_8;
use opencv::prelude::*;

use mono_vo::config::DetectorKind;
use mono_vo::dataset::{extract_frames, DatasetTrait, EuRoCDataset, ImageFolder};
use mono_vo::estimator::{EngineState, ScaleProvider, VisualOdometry};
use mono_vo::feature_tracker::cv::{draw_track, LucasKanadeTracker, OpenCvDetector};
use mono_vo::global_types::GlobalPose;
use mono_vo::pose_estimator::cv::EssentialMatEstimator;
use mono_vo::save::{read_trajectory, TrajectoryWriter};
use mono_vo::{CalibrationMatrix, OdometryConfig};

#[derive(Parser, Debug)]
#[command(name = "mono-vo", version, about = "Monocular visual odometry")]
struct Cli {
    /// Camera intrinsic matrix, 9 comma-separated values.
    #[arg(short = 'k', long = "calibration")]
    calibration: PathBuf,

    /// Image sequence directory.
    #[arg(short = 'i', long = "images", required_unless_present = "euroc")]
    images: Option<PathBuf>,

    /// EuRoC MAV sequence root, read instead of an image directory.
    #[arg(long = "euroc", conflicts_with_all = ["images", "video"])]
    euroc: Option<PathBuf>,

    /// Feature detector: FAST, SIFT, ORB or GFTT.
    #[arg(long = "feature-type")]
    feature_type: Option<String>,

    #[arg(long = "image-format", default_value = ".png")]
    image_format: String,

    /// Scale each step by the ground-truth displacement.
    #[arg(long = "true-scale")]
    true_scale: bool,

    /// Ground-truth trajectory, KITTI pose format.
    #[arg(long = "ground-truth")]
    ground_truth: Option<PathBuf>,

    /// Extract the frames of this video into the image directory first.
    #[arg(long = "video")]
    video: Option<PathBuf>,

    /// JSON tuning file.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    #[arg(long = "output", default_value = "estimated_poses.txt")]
    output: PathBuf,

    /// Show tracked keypoints and the trajectory.
    #[arg(long = "display")]
    display: bool,
}

const FREQUENCY: i32 = 30;
const CANVAS_SIZE: i32 = 600;

fn imread_gray(path: &Path) -> anyhow::Result<Mat> {
    let path_str = path
        .to_str()
        .with_context(|| format!("non-utf8 image path {:?}", path))?;
    let img = imgcodecs::imread(path_str, imgcodecs::IMREAD_GRAYSCALE)?;
    if img.empty() {
        bail!("failed to decode {:?}", path);
    }
    Ok(img)
}

/// 显示特征点与俯视轨迹 (x-z 平面)
fn show(img: &Mat, state: &EngineState<Mat>, canvas: &mut Mat) -> anyhow::Result<()> {
    let img_track = draw_track(img, state.active_points())?;
    let t = state.pose().translation;
    let center = Point2i::new(
        t.x as i32 + CANVAS_SIZE / 2,
        CANVAS_SIZE - (t.z as i32 + CANVAS_SIZE / 6),
    );
    opencv::imgproc::circle(canvas, center, 1, Scalar::from((0, 0, 255)), 2, LINE_8, 0)?;
    highgui::imshow("Tracks", &img_track)?;
    highgui::imshow("Trajectory", canvas)?;
    highgui::wait_key(1000 / FREQUENCY)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_nanos()
        .init();

    let cli = Cli::parse();

    let calibration = CalibrationMatrix::from_file(&cli.calibration)?;
    let mut config = match &cli.config {
        Some(path) => OdometryConfig::load(path)?,
        None => OdometryConfig::default(),
    };
    if let Some(feature_type) = &cli.feature_type {
        config.detector.kind = feature_type.parse::<DetectorKind>()?;
    }

    let dataset: Box<dyn DatasetTrait> = match (&cli.euroc, &cli.images) {
        (Some(root), _) => {
            let euroc = EuRoCDataset::open(root)?;
            log::info!("EuRoC sequence {:?}, {:.1} s", root, euroc.duration());
            Box::new(euroc)
        }
        (None, Some(images)) => {
            if let Some(video) = &cli.video {
                extract_frames(video, images, &cli.image_format)?;
            }
            log::info!("listing images from {:?}", images);
            Box::new(ImageFolder::open(images, &cli.image_format)?)
        }
        (None, None) => bail!("either --images or --euroc is required"),
    };
    if dataset.len() < 2 {
        bail!("sequence holds {} images, at least 2 needed", dataset.len());
    }

    let ground_truth = match &cli.ground_truth {
        Some(path) => Some(read_trajectory(path)?),
        None => None,
    };
    let scale = ScaleProvider::from_options(cli.true_scale, ground_truth)?;
    if let Some(scale) = &scale {
        scale.ensure_covers(dataset.len())?;
    }

    let detector = OpenCvDetector::new(&config.detector)?;
    let tracker = LucasKanadeTracker::new(&config.tracker);
    let estimator = EssentialMatEstimator::new(&config.essential);
    let mut vo = VisualOdometry::new(detector, tracker, estimator, &calibration, &config)?
        .with_scale(scale);

    let mut writer = TrajectoryWriter::create(&cli.output)?;
    let mut state = EngineState::<Mat>::new();
    let mut canvas =
        Mat::new_rows_cols_with_default(CANVAS_SIZE, CANVAS_SIZE, CV_8UC3, Scalar::all(0.0))?;

    let paths = dataset.image_paths();
    let image1 = imread_gray(&paths[0])?;
    let image2 = imread_gray(&paths[1])?;
    let mut last: GlobalPose = vo.initialize(&mut state, image1, image2)?;
    writer.write_pose(&last)?;

    for (i, path) in paths.iter().enumerate().skip(2) {
        log::info!("processing frame {}", i);
        let image = imread_gray(path)?;
        let shown = if cli.display { Some(image.try_clone()?) } else { None };
        match vo.update(&mut state, image) {
            Ok(pose) => last = pose,
            Err(err) if !err.is_fatal() => {
                log::warn!("{}, keeping the last pose", err);
                // keeps frame numbers aligned with the ground truth
                state.skip_frame()?;
            }
            Err(err) => return Err(err.into()),
        }
        writer.write_pose(&last)?;
        if let Some(img) = shown {
            show(&img, &state, &mut canvas)?;
        }
    }

    writer.flush()?;
    log::info!(
        "done: {} poses written to {:?}",
        writer.written(),
        cli.output
    );
    Ok(())
}
