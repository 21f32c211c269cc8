use crate::error::SequencingError;
use crate::global_types::{GlobalPose, Keypoints};

/// Tracking anchor: the last processed image and the keypoints found on it.
/// The two are only ever replaced together.
#[derive(Debug, Clone)]
pub struct Anchor<I> {
    pub(crate) image: I,
    pub(crate) points: Keypoints,
    /// 输入序列中该图像的帧号
    pub(crate) frame: usize,
}

impl<I> Anchor<I> {
    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn points(&self) -> &Keypoints {
        &self.points
    }

    pub fn frame(&self) -> usize {
        self.frame
    }
}

/// Everything a running trajectory owns. One per image sequence; the
/// engine mutates it in place and never keeps past poses.
#[derive(Debug, Clone)]
pub struct EngineState<I> {
    pub(crate) pose: GlobalPose,
    pub(crate) anchor: Option<Anchor<I>>,
    /// 帧计数，初始化后为 2
    pub(crate) frame_index: usize,
}

impl<I> Default for EngineState<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> EngineState<I> {
    pub fn new() -> Self {
        Self {
            pose: GlobalPose::default(),
            anchor: None,
            frame_index: 0,
        }
    }

    pub fn pose(&self) -> &GlobalPose {
        &self.pose
    }

    /// Frames consumed so far, skipped ones included, which is also the
    /// index of the next frame.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn is_initialized(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor(&self) -> Option<&Anchor<I>> {
        self.anchor.as_ref()
    }

    pub fn reference_image(&self) -> Option<&I> {
        self.anchor.as_ref().map(|a| &a.image)
    }

    pub fn active_points(&self) -> &[crate::global_types::Keypoint] {
        self.anchor.as_ref().map_or(&[], |a| a.points.as_slice())
    }

    /// Drops the next input frame: the anchor is kept, so the following
    /// frame is tracked against it across the gap.
    pub fn skip_frame(&mut self) -> Result<(), SequencingError> {
        if !self.is_initialized() {
            return Err(SequencingError::NotInitialized);
        }
        self.frame_index += 1;
        Ok(())
    }
}
