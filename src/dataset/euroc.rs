use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::DatasetTrait;
use crate::global_types::Timestamp;

/// Left camera stream of an EuRoC MAV sequence.
#[derive(Debug, Default)]
pub struct EuRoCDataset {
    pub cam0s: Vec<(Timestamp, PathBuf)>,
    paths: Vec<PathBuf>,
}
impl EuRoCDataset {
    const EUROC_CAM0_PATH: &'static str = "mav0/cam0/";

    /// `data.csv` rows are `timestamp [ns], file name`, the images sit in `data/`.
    pub fn read_cam(path: &Path) -> Result<Vec<(Timestamp, PathBuf)>> {
        let csv_path = path.join("data.csv");
        let data_path = path.join("data");
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(None)
            .from_path(&csv_path)
            .with_context(|| format!("open {:?}", csv_path))?;
        let mut cams = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row = || format!("{:?} row {}", csv_path, line + 2);
            let timestamp = record
                .get(0)
                .with_context(row)?
                .parse::<i64>()
                .with_context(row)?;
            let name = record.get(1).with_context(row)?;
            cams.push((Timestamp(timestamp), data_path.join(name)));
        }
        cams.sort_by_key(|(t, _)| *t);
        Ok(cams)
    }

    pub fn open(root: &Path) -> Result<Self> {
        let cam0s = Self::read_cam(&root.join(Self::EUROC_CAM0_PATH))?;
        log::info!("EuRoC cam0: {} images", cam0s.len());
        let paths = cam0s.iter().map(|(_, p)| p.clone()).collect();
        Ok(Self { cam0s, paths })
    }

    /// 序列时长（秒）
    pub fn duration(&self) -> f64 {
        match (self.cam0s.first(), self.cam0s.last()) {
            (Some((first, _)), Some((last, _))) => last.duration_since(first),
            _ => 0.0,
        }
    }
}
impl DatasetTrait for EuRoCDataset {
    fn image_paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dataset() {
        let root = std::env::temp_dir().join(format!("mono_vo_euroc_{}", std::process::id()));
        let cam = root.join("mav0/cam0");
        std::fs::create_dir_all(&cam).unwrap();
        std::fs::write(
            cam.join("data.csv"),
            "#timestamp [ns],filename\n\
             1403715273312143104,1403715273312143104.png\n\
             1403715273262142976,1403715273262142976.png\n",
        )
        .unwrap();

        let dataset = EuRoCDataset::open(&root).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.cam0s[0].0, Timestamp(1403715273262142976));
        assert_eq!(
            dataset.image_paths()[1],
            cam.join("data").join("1403715273312143104.png")
        );
        assert_relative_eq!(dataset.duration(), 0.05, epsilon = 1e-6);
        assert_eq!(EuRoCDataset::default().duration(), 0.0);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_csv() {
        let root = std::env::temp_dir().join("mono_vo_euroc_missing");
        assert!(EuRoCDataset::open(&root).is_err());
    }
}
