use std::path::Path;

use anyhow::{bail, Context, Result};
use opencv::{core::Mat, core::Vector, imgcodecs, prelude::*, videoio};

use super::normalize_extension;

/// Decodes `video` into `out_dir/000000.<ext>`, `000001.<ext>`, ... and
/// returns the number of frames written.
pub fn extract_frames(video: &Path, out_dir: &Path, extension: &str) -> Result<usize> {
    let video_str = video
        .to_str()
        .with_context(|| format!("non-utf8 video path {:?}", video))?;
    let mut capture = videoio::VideoCapture::from_file(video_str, videoio::CAP_ANY)?;
    if !capture.is_opened()? {
        bail!("cannot open video {:?}", video);
    }
    std::fs::create_dir_all(out_dir).with_context(|| format!("create {:?}", out_dir))?;

    let extension = normalize_extension(extension);
    let mut frame = Mat::default();
    let mut count = 0;
    while capture.read(&mut frame)? {
        if frame.empty() {
            break;
        }
        let path = out_dir.join(format!("{:06}.{}", count, extension));
        let path_str = path
            .to_str()
            .with_context(|| format!("non-utf8 frame path {:?}", path))?;
        if !imgcodecs::imwrite(path_str, &frame, &Vector::new())? {
            bail!("failed to write {:?}", path);
        }
        count += 1;
    }
    log::info!("extracted {} frames from {:?} into {:?}", count, video, out_dir);
    Ok(count)
}
