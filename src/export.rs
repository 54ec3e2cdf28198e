/// Hand-off of rendered bitmaps to disk

use std::path::{Path, PathBuf};

use crate::rendering::Bitmap;
use crate::Result;

/// Writes PNG exports to a fixed path.
///
/// The PNG is encoded fully in memory and written to a `.part` sibling that
/// is renamed over the destination, so an aborted export never leaves a
/// truncated file behind.
#[derive(Debug, Clone)]
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn part_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cover.png".into());
        name.push(".part");
        self.path.with_file_name(name)
    }

    /// Encode and write `bitmap`; returns the number of bytes written.
    pub async fn write(&self, bitmap: &Bitmap) -> Result<usize> {
        let png = bitmap.to_png()?;
        self.write_png(&png).await?;
        Ok(png.len())
    }

    pub async fn write_png(&self, png: &[u8]) -> Result<()> {
        let part = self.part_path();
        if let Err(e) = tokio::fs::write(&part, png).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&part, &self.path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        log::info!("export: wrote {} bytes to {}", png.len(), self.path.display());
        Ok(())
    }
}
