//! 数据集处理
//!
//! Image sequences: a plain directory of numbered frames, or the camera
//! stream of an EuRoC MAV recording <https://paperswithcode.com/dataset/euroc-mav>.
mod euroc;
mod image_dir;
#[cfg(feature = "opencv")]
mod video;

use std::path::PathBuf;

pub use euroc::EuRoCDataset;
pub use image_dir::ImageFolder;
#[cfg(feature = "opencv")]
pub use video::extract_frames;

pub trait DatasetTrait {
    /// 图像路径，按帧顺序
    fn image_paths(&self) -> &[PathBuf];

    fn len(&self) -> usize {
        self.image_paths().len()
    }

    fn is_empty(&self) -> bool {
        self.image_paths().is_empty()
    }
}

/// `.png`, `png` and `PNG` all name the same extension.
pub(crate) fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}
