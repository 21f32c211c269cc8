//! Error taxonomy of the odometry engine.
//!
//! Configuration and sequencing errors are fatal for a run, geometry errors
//! only concern the frame that produced them.

use thiserror::Error;

/// Fatal misconfiguration, detected before or while processing frames.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("true-scale mode requires a ground-truth trajectory")]
    MissingGroundTruth,
    #[error("ground-truth trajectory has {available} poses, frame needs {required}")]
    GroundTruthTooShort { required: usize, available: usize },
    #[error("unsupported feature detector `{0}` (expected FAST, SIFT, ORB or GFTT)")]
    UnsupportedDetector(String),
    #[error("invalid calibration matrix: {0}")]
    InvalidCalibration(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Relative pose could not be recovered from the correspondences of a frame.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{found} correspondences tracked, at least {required} needed")]
    TooFewCorrespondences { found: usize, required: usize },
    #[error("no pose solution: {0}")]
    NoSolution(String),
    #[error("degenerate correspondence geometry: {0}")]
    Degenerate(String),
}

/// Engine operations called out of order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencingError {
    #[error("update called before a successful initialize")]
    NotInitialized,
    #[error("initialize called on an already initialized engine")]
    AlreadyInitialized,
}

/// Which external capability failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    Track,
    Estimate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Detect => "detect",
            Stage::Track => "track",
            Stage::Estimate => "estimate",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum OdometryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("frame {frame}: {source}")]
    Geometry {
        frame: usize,
        #[source]
        source: GeometryError,
    },
    #[error(transparent)]
    Sequencing(#[from] SequencingError),
    #[error("frame {frame}: {stage} backend failed: {source}")]
    Provider {
        frame: usize,
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl OdometryError {
    /// Frame index the failure belongs to, if it is tied to one.
    pub fn frame(&self) -> Option<usize> {
        match self {
            OdometryError::Geometry { frame, .. } | OdometryError::Provider { frame, .. } => {
                Some(*frame)
            }
            _ => None,
        }
    }

    /// Fatal errors end the run; the others may be skipped by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OdometryError::Config(_) | OdometryError::Sequencing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OdometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = OdometryError::Geometry {
            frame: 7,
            source: GeometryError::TooFewCorrespondences {
                found: 3,
                required: 8,
            },
        };
        assert_eq!(err.frame(), Some(7));
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "frame 7: 3 correspondences tracked, at least 8 needed"
        );

        let err: OdometryError = ConfigError::MissingGroundTruth.into();
        assert!(err.is_fatal());
        assert_eq!(err.frame(), None);

        let err: OdometryError = SequencingError::NotInitialized.into();
        assert!(err.is_fatal());
    }
}
