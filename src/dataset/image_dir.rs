use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::{normalize_extension, DatasetTrait};

/// Directory of frames named so that lexicographic order is frame order
/// (`000000.png`, `000001.png`, ...).
#[derive(Debug, Clone)]
pub struct ImageFolder {
    paths: Vec<PathBuf>,
}

impl ImageFolder {
    pub fn open(dir: &Path, extension: &str) -> Result<Self> {
        let extension = normalize_extension(extension);
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("read image dir {:?}", dir))? {
            let path = entry?.path();
            if path.is_dir() {
                continue;
            }
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.to_ascii_lowercase() == extension);
            if !matches {
                bail!(
                    "format inconsistency in {:?}: {:?} is not a .{} image",
                    dir,
                    path.file_name().unwrap_or_default(),
                    extension
                );
            }
            paths.push(path);
        }
        paths.sort();
        if paths.len() < 2 {
            bail!("{:?} holds {} images, at least 2 needed", dir, paths.len());
        }
        log::info!("{} .{} images in {:?}", paths.len(), extension, dir);
        Ok(Self { paths })
    }
}

impl DatasetTrait for ImageFolder {
    fn image_paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mono_vo_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            std::fs::write(dir.join(f), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_open_sorted() {
        let dir = scratch("sorted", &["000002.png", "000000.png", "000001.PNG"]);
        let folder = ImageFolder::open(&dir, ".png").unwrap();
        let names: Vec<_> = folder
            .image_paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["000000.png", "000001.PNG", "000002.png"]);
        assert_eq!(folder.len(), 3);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_format_inconsistency() {
        let dir = scratch("mixed", &["000000.png", "000001.jpg"]);
        let err = ImageFolder::open(&dir, "png").unwrap_err();
        assert!(err.to_string().contains("format inconsistency"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_too_few_images() {
        let dir = scratch("single", &["000000.png"]);
        assert!(ImageFolder::open(&dir, "png").is_err());
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(ImageFolder::open(&dir, "png").is_err());
    }
}
