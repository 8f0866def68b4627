use crate::error::{Result, TubeTagError};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Cover image ready to be embedded in an APIC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CoverArt {
    /// Load a jpg/png cover and resize it to `size`x`size`. A size of 0
    /// keeps the original bytes.
    pub fn load<P: AsRef<Path>>(path: P, size: u32) -> Result<Self> {
        let path = path.as_ref();
        let format = cover_format(path)?;

        if !path.is_file() {
            return Err(invalid(path, "file does not exist"));
        }

        let original = std::fs::read(path)?;

        let data = if size == 0 {
            original
        } else {
            let image = image::load_from_memory_with_format(&original, format)
                .map_err(|e| invalid(path, &format!("could not decode image: {}", e)))?;
            let resized = image.resize_exact(size, size, FilterType::Lanczos3);
            debug!(
                path = %path.display(),
                from = ?(image.width(), image.height()),
                to = size,
                "resized cover art"
            );
            encode(resized, format).map_err(|e| invalid(path, &e))?
        };

        Ok(Self {
            mime_type: mime_type(format).to_string(),
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Image format implied by the cover's file extension.
pub fn cover_format(path: &Path) -> Result<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        _ => Err(invalid(
            path,
            &format!("invalid file extension '.{}', convert to '.jpg' or '.png'", ext),
        )),
    }
}

fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        _ => "image/jpeg",
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> std::result::Result<Vec<u8>, String> {
    // JPEG has no alpha channel
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(|e| format!("could not encode image: {}", e))?;
    Ok(buffer.into_inner())
}

fn invalid(path: &Path, message: &str) -> TubeTagError {
    TubeTagError::InvalidCoverArt {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbaImage::from_fn(w, h, |x, _| Rgba([(x % 255) as u8, 10, 200, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_cover_format_from_extension() {
        assert_eq!(cover_format(Path::new("a.jpg")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(cover_format(Path::new("a.JPEG")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(cover_format(Path::new("a.png")).unwrap(), ImageFormat::Png);

        let err = cover_format(Path::new("a.webp")).unwrap_err();
        assert!(err.to_string().contains("'.webp'"));
        assert!(cover_format(Path::new("cover")).is_err());
    }

    #[test]
    fn test_png_is_resized() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "cover.png", 640, 480);

        let cover = CoverArt::load(&path, 300).unwrap();
        assert_eq!(cover.mime_type, "image/png");

        let decoded = image::load_from_memory(&cover.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn test_jpeg_is_resized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover.jpg");
        RgbImage::from_pixel(100, 50, Rgb([20, 40, 60]))
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();

        let cover = CoverArt::load(&path, 64).unwrap();
        assert_eq!(cover.mime_type, "image/jpeg");

        let decoded = image::load_from_memory_with_format(&cover.data, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_size_zero_keeps_original_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "cover.png", 20, 20);

        let cover = CoverArt::load(&path, 0).unwrap();
        assert_eq!(cover.data, std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_missing_cover() {
        let dir = TempDir::new().unwrap();
        let err = CoverArt::load(dir.path().join("nope.png"), 300).unwrap_err();
        assert!(matches!(err, TubeTagError::InvalidCoverArt { .. }));
    }

    #[test]
    fn test_corrupt_cover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = CoverArt::load(&path, 300).unwrap_err();
        assert!(err.to_string().contains("broken.png"));
    }
}
