use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use nalgebra::{Matrix3, Vector3};

use crate::global_types::GlobalPose;

/// `[R | T]` of one frame, written as
/// `R00 R01 R02 T0 R10 R11 R12 T1 R20 R21 R22 T2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRecord {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl PoseRecord {
    pub fn from_values(values: &[f64; 12]) -> Self {
        let mut rotation = Matrix3::zeros();
        let mut translation = Vector3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                rotation[(i, j)] = values[i * 4 + j];
            }
            translation[i] = values[i * 4 + 3];
        }
        Self {
            rotation,
            translation,
        }
    }

    pub fn values(&self) -> [f64; 12] {
        let mut values = [0.0; 12];
        for i in 0..3 {
            for j in 0..3 {
                values[i * 4 + j] = self.rotation[(i, j)];
            }
            values[i * 4 + 3] = self.translation[i];
        }
        values
    }

    /// Fourth column of the 3x4 matrix, positions 3, 7 and 11 of the line.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// One line, values rounded to 6 decimals.
    pub fn to_line(&self) -> String {
        self.values()
            .iter()
            .map(|v| format!("{:.6}", round6(*v)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&GlobalPose> for PoseRecord {
    fn from(pose: &GlobalPose) -> Self {
        Self {
            rotation: pose.rotation,
            translation: pose.translation,
        }
    }
}

#[inline]
fn round6(v: f64) -> f64 {
    let r = (v * 1e6).round() / 1e6;
    // no "-0.000000"
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Writes one pose line per frame.
pub struct TrajectoryWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write_pose(&mut self, pose: &GlobalPose) -> Result<()> {
        writeln!(self.out, "{}", PoseRecord::from(pose).to_line())
            .context("failed to write pose")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush trajectory")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TrajectoryWriter<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

/// Parses a trajectory, one 12-value pose per non-empty line.
pub fn parse_trajectory<R: Read>(reader: R) -> Result<Vec<PoseRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut poses = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 12 {
            bail!("line {}: expected 12 values, found {}", line, fields.len());
        }
        let mut values = [0.0; 12];
        for (value, field) in values.iter_mut().zip(fields.iter()) {
            *value = field
                .parse::<f64>()
                .with_context(|| format!("line {}: `{}` is not a number", line, field))?;
        }
        poses.push(PoseRecord::from_values(&values));
    }
    Ok(poses)
}

pub fn read_trajectory(path: &Path) -> Result<Vec<PoseRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open trajectory {}", path.display()))?;
    let poses = parse_trajectory(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse trajectory {}", path.display()))?;
    log::info!("{} poses read from {}", poses.len(), path.display());
    Ok(poses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KITTI_HEAD: &str = "\
1.000000e+00 9.043680e-12 2.326809e-11 5.551115e-17 9.043683e-12 1.000000e+00 2.392370e-10 3.330669e-16 2.326810e-11 2.392370e-10 9.999999e-01 -4.440892e-16
9.999978e-01 5.272628e-04 -2.066935e-03 -4.690294e-02 -5.296506e-04 9.999992e-01 -1.154865e-03 -2.839928e-02 2.066324e-03 1.155958e-03 9.999971e-01 8.586941e-01
";

    #[test]
    fn test_parse_kitti_lines() {
        let poses = parse_trajectory(KITTI_HEAD.as_bytes()).unwrap();
        assert_eq!(poses.len(), 2);
        let t = poses[1].translation();
        assert_eq!(*t, Vector3::new(-4.690294e-02, -2.839928e-02, 8.586941e-01));
        assert_eq!(poses[1].rotation[(0, 1)], 5.272628e-04);
        assert_eq!(poses[1].rotation[(2, 0)], 2.066324e-03);
    }

    #[test]
    fn test_parse_tolerates_blank_lines_and_double_spaces() {
        let text = "1 0 0  1 0 1 0 2 0 0 1 3\n\n1 0 0 4 0 1 0 5 0 0 1 6\n";
        let poses = parse_trajectory(text.as_bytes()).unwrap();
        assert_eq!(poses.len(), 2);
        assert_eq!(*poses[0].translation(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(poses[1].rotation, Matrix3::identity());
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let err = parse_trajectory("1 0 0 1 0 1 0 2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected 12 values"));
        assert!(parse_trajectory("1 0 0 1 0 1 0 2 0 0 1 z\n".as_bytes()).is_err());
    }

    #[test]
    fn test_line_layout_and_rounding() {
        let pose = GlobalPose::new(
            Matrix3::new(1.0, 2.0, 3.0, 5.0, 6.0, 7.0, 9.0, 10.0, 11.0),
            Vector3::new(4.0, 8.0, 0.12345678),
        );
        assert_eq!(
            PoseRecord::from(&pose).to_line(),
            "1.000000 2.000000 3.000000 4.000000 5.000000 6.000000 7.000000 \
             8.000000 9.000000 10.000000 11.000000 0.123457"
        );
        let tiny = GlobalPose::new(Matrix3::identity(), Vector3::new(-1e-9, 0.0, 0.0));
        assert!(PoseRecord::from(&tiny).to_line().starts_with("1.000000 0.000000 0.000000 0.000000"));
    }

    #[test]
    fn test_writer_counts_lines() {
        let mut writer = TrajectoryWriter::new(Vec::new());
        writer.write_pose(&GlobalPose::default()).unwrap();
        writer.write_pose(&GlobalPose::default()).unwrap();
        assert_eq!(writer.written(), 2);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let poses = parse_trajectory(text.as_bytes()).unwrap();
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].rotation, Matrix3::identity());
    }
}
