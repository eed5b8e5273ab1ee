use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::normalize::normalize;

/// Resolution shown when the image header cannot be read.
pub const UNKNOWN_RESOLUTION: &str = "unknown";

/// One image plus its sidecar caption file (same base name, `.txt`).
///
/// Construction never fails: an unreadable image just gets the
/// [`UNKNOWN_RESOLUTION`] sentinel, and a missing sidecar means an empty
/// caption.
#[derive(Debug, Clone)]
pub struct CaptionItem {
    pub img_path: PathBuf,
    pub txt_path: PathBuf,
    pub filename: String,
    pub resolution: String,
    pub caption: String,
}

impl CaptionItem {
    pub fn new(img_path: PathBuf) -> Self {
        let txt_path = img_path.with_extension("txt");
        let filename = img_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let resolution = probe_resolution(&img_path);
        let mut item = Self {
            img_path,
            txt_path,
            filename,
            resolution,
            caption: String::new(),
        };
        item.caption = item.load();
        item
    }

    /// Read the sidecar and return its normalized caption.
    ///
    /// Missing sidecar or read failure degrades to an empty caption.
    pub fn load(&self) -> String {
        if !self.txt_path.exists() {
            debug!("{}: no sidecar file, empty caption", self.filename);
            return String::new();
        }
        match fs::read_to_string(&self.txt_path) {
            Ok(raw) => normalize(&raw),
            Err(err) => {
                error!("{}: failed to read sidecar: {err}", self.filename);
                String::new()
            }
        }
    }

    /// Normalize `content`, overwrite the sidecar, and return the clean
    /// caption. Returns an empty string when the write fails; the in-memory
    /// caption is left untouched in that case so the caller can tell the save
    /// did not happen.
    pub fn save(&mut self, content: &str) -> String {
        let clean = normalize(content);
        match fs::write(&self.txt_path, &clean) {
            Ok(()) => {
                debug!("{}: saved caption ({} bytes)", self.filename, clean.len());
                self.caption = clean.clone();
                clean
            }
            Err(err) => {
                error!("{}: failed to write sidecar: {err}", self.filename);
                String::new()
            }
        }
    }

    /// Display line for the info label.
    pub fn info(&self) -> String {
        format!("{} | {}", self.filename, self.resolution)
    }
}

/// `"{w}×{h}"` from the image header, without decoding pixel data.
fn probe_resolution(path: &Path) -> String {
    match image::image_dimensions(path) {
        Ok((w, h)) => format!("{w}×{h}"),
        Err(err) => {
            error!("{}: failed to read dimensions: {err}", path.display());
            UNKNOWN_RESOLUTION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([120, 40, 200]));
        img.save(path).unwrap();
    }

    #[test]
    fn missing_sidecar_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("cat.png");
        write_png(&img, 4, 3);

        let item = CaptionItem::new(img);
        assert_eq!(item.caption, "");
        assert_eq!(item.resolution, "4×3");
        assert_eq!(item.info(), "cat.png | 4×3");
    }

    #[test]
    fn load_normalizes_sidecar_content() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("dog.png");
        write_png(&img, 2, 2);
        fs::write(tmp.path().join("dog.txt"), "b， a,b\n c").unwrap();

        let item = CaptionItem::new(img);
        assert_eq!(item.caption, "b,a,c");
    }

    #[test]
    fn save_writes_normalized_and_updates_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("bird.png");
        write_png(&img, 2, 2);

        let mut item = CaptionItem::new(img);
        let clean = item.save("x, y，x");
        assert_eq!(clean, "x,y");
        assert_eq!(item.caption, "x,y");
        assert_eq!(fs::read_to_string(tmp.path().join("bird.txt")).unwrap(), "x,y");
    }

    #[test]
    fn save_to_unwritable_path_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("fish.png");
        write_png(&img, 2, 2);
        // Occupy the sidecar path with a directory so the write must fail.
        fs::create_dir(tmp.path().join("fish.txt")).unwrap();

        let mut item = CaptionItem::new(img);
        item.caption = "old".to_string();
        assert_eq!(item.save("a,b"), "");
        assert_eq!(item.caption, "old");
    }

    #[test]
    fn unreadable_image_gets_sentinel_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("broken.png");
        fs::write(&img, b"not an image").unwrap();

        let item = CaptionItem::new(img);
        assert_eq!(item.resolution, UNKNOWN_RESOLUTION);
    }
}
