//! # Image Processing Module
//!
//! Questo modulo converte le immagini sorgente (JPEG/PNG) in WebP.
//!
//! ## Responsabilità:
//! - Decodifica dell'immagine con il crate `image` (formato rilevato dal contenuto)
//! - Ridimensionamento opzionale a una larghezza massima preservando l'aspect ratio
//! - Encoding WebP lossy con `cwebp` oppure con libwebp integrata (crate `webp`)
//! - Pubblicazione atomica del file convertito (file temporaneo + rename)
//!
//! ## Strategia encoder:
//! | Scelta    | Encoder usato                               | Qualità          |
//! |-----------|---------------------------------------------|------------------|
//! | `auto`    | cwebp se installato, altrimenti integrato   | `-q N` / `N`     |
//! | `cwebp`   | cwebp, errore all'avvio se manca            | `-q N`           |
//! | `builtin` | libwebp in-process (crate `webp`)           | `Encoder::encode(N)` |
//!
//! ## Calcolo dimensioni:
//! Se `width > max_width` l'output è `max_width × round(height * max_width / width)`,
//! altrimenti le dimensioni restano invariate. Il filtro è Lanczos3.
//!
//! ## Atomicità:
//! Il WebP viene scritto in un file `.part` nella directory di destinazione e
//! rinominato solo a encoding completato, quindi un'interruzione non lascia mai
//! un file convertito troncato.
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = ImageProcessor::new(EncoderChoice::Auto)?;
//! let converted = processor
//!     .convert(Path::new("Posters/poster1.jpg"), Path::new("Posters/poster1.webp"), Some(800), 85)
//!     .await?;
//! ```

use crate::config::EncoderChoice;
use crate::error::NormalizeError;
use crate::file_manager::FileManager;
use crate::tool_resolver::ToolPathResolver;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::process::Command;
use tracing::{debug, info};

/// Encoder actually used for WebP output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebpEncoder {
    /// External cwebp binary
    Cwebp(PathBuf),
    /// In-process libwebp through the `webp` crate
    Builtin,
}

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub source: PathBuf,
    pub converted: PathBuf,
    /// Source dimensions (width, height)
    pub original: (u32, u32),
    /// Output dimensions (width, height)
    pub output: (u32, u32),
    pub resized: bool,
    pub source_size: u64,
    pub converted_size: u64,
}

/// Decoded (and possibly resized) image waiting to be encoded
struct PreparedImage {
    image: DynamicImage,
    original: (u32, u32),
    resized: bool,
}

/// Converts source images to WebP
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    encoder: WebpEncoder,
}

impl ImageProcessor {
    /// Create a processor, resolving cwebp from the environment
    pub fn new(choice: EncoderChoice) -> Result<Self, NormalizeError> {
        Self::with_resolver(choice, &ToolPathResolver::new())
    }

    /// Create a processor using an explicit tool resolver
    pub fn with_resolver(choice: EncoderChoice, resolver: &ToolPathResolver) -> Result<Self, NormalizeError> {
        let encoder = match choice {
            EncoderChoice::Auto => match resolver.cwebp() {
                Some(path) => WebpEncoder::Cwebp(path),
                None => {
                    info!("cwebp not found, using the built-in libwebp encoder");
                    WebpEncoder::Builtin
                }
            },
            EncoderChoice::Cwebp => WebpEncoder::Cwebp(
                resolver
                    .check_tool_with_instructions("cwebp")
                    .map_err(NormalizeError::MissingTool)?,
            ),
            EncoderChoice::Builtin => WebpEncoder::Builtin,
        };

        debug!("WebP encoder: {:?}", encoder);
        Ok(Self { encoder })
    }

    /// Processor that always uses the built-in encoder
    pub fn builtin() -> Self {
        Self {
            encoder: WebpEncoder::Builtin,
        }
    }

    pub fn encoder(&self) -> &WebpEncoder {
        &self.encoder
    }

    /// Output dimensions for an image of `width × height` under `max_width`
    pub fn target_dimensions(width: u32, height: u32, max_width: Option<u32>) -> (u32, u32) {
        match max_width {
            Some(max) if width > max => {
                let new_height = (height as f64 * max as f64 / width as f64).round() as u32;
                (max, new_height.max(1))
            }
            _ => (width, height),
        }
    }

    /// Convert `source` into a WebP file at `target`.
    ///
    /// The image is downscaled with Lanczos3 when wider than `max_width`.
    /// An existing file at `target` is replaced.
    pub async fn convert(
        &self,
        source: &Path,
        target: &Path,
        max_width: Option<u32>,
        quality: u8,
    ) -> Result<ConvertedImage, NormalizeError> {
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&parent).await?;

        let input = source.to_path_buf();
        let prepared = tokio::task::spawn_blocking(move || prepare(&input, max_width)).await??;

        let original = prepared.original;
        let resized = prepared.resized;
        let output = (prepared.image.width(), prepared.image.height());

        if resized {
            info!(
                "Resizing {} from {}x{} to {}x{}",
                source.display(),
                original.0,
                original.1,
                output.0,
                output.1
            );
        }

        match &self.encoder {
            WebpEncoder::Cwebp(tool) => {
                encode_with_cwebp(tool, source, prepared, &parent, target, quality).await?;
            }
            WebpEncoder::Builtin => {
                let target = target.to_path_buf();
                tokio::task::spawn_blocking(move || encode_builtin(prepared.image, quality, &parent, &target))
                    .await??;
            }
        }

        Ok(ConvertedImage {
            source: source.to_path_buf(),
            converted: target.to_path_buf(),
            original,
            output,
            resized,
            source_size: FileManager::file_size(source).await,
            converted_size: FileManager::file_size(target).await,
        })
    }
}

/// Decode `source` and downscale it if needed
fn prepare(source: &Path, max_width: Option<u32>) -> Result<PreparedImage, NormalizeError> {
    let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let original = (image.width(), image.height());
    let (width, height) = ImageProcessor::target_dimensions(original.0, original.1, max_width);

    if (width, height) == original {
        return Ok(PreparedImage {
            image,
            original,
            resized: false,
        });
    }

    Ok(PreparedImage {
        image: image.resize_exact(width, height, FilterType::Lanczos3),
        original,
        resized: true,
    })
}

/// Staging file next to `target`, renamed into place once complete
fn staging_file(parent: &Path) -> Result<NamedTempFile, NormalizeError> {
    Ok(tempfile::Builder::new()
        .prefix(".normalize-")
        .suffix(".part")
        .tempfile_in(parent)?)
}

fn publish(staged: TempPath, target: &Path) -> Result<(), NormalizeError> {
    staged.persist(target).map_err(|e| NormalizeError::Io(e.error))
}

fn encode_builtin(image: DynamicImage, quality: u8, parent: &Path, target: &Path) -> Result<(), NormalizeError> {
    // libwebp accepts 8-bit RGB/RGBA only
    let image = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };

    let encoded = webp::Encoder::from_image(&image)
        .map_err(|e| NormalizeError::Encoder(format!("libwebp rejected image: {}", e)))?
        .encode(quality as f32);

    let mut staged = staging_file(parent)?;
    staged.as_file_mut().write_all(&encoded)?;
    staged.as_file_mut().flush()?;

    publish(staged.into_temp_path(), target)
}

async fn encode_with_cwebp(
    tool: &Path,
    source: &Path,
    prepared: PreparedImage,
    parent: &Path,
    target: &Path,
    quality: u8,
) -> Result<(), NormalizeError> {
    // Resized pixels only exist in memory, hand them to cwebp as a temporary PNG
    let resized_input = if prepared.resized {
        let image = prepared.image;
        let temp = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, NormalizeError> {
            let mut temp = tempfile::Builder::new()
                .prefix("normalize-")
                .suffix(".png")
                .tempfile()?;
            {
                let mut writer = BufWriter::new(temp.as_file_mut());
                image.write_to(&mut writer, ImageFormat::Png)?;
                writer.flush()?;
            }
            Ok(temp)
        })
        .await??;
        Some(temp)
    } else {
        None
    };

    let input = resized_input.as_ref().map(|t| t.path()).unwrap_or(source);
    let staged = staging_file(parent)?.into_temp_path();

    debug!(
        "Running {} -quiet -q {} {} -o {}",
        tool.display(),
        quality,
        input.display(),
        staged.display()
    );

    let output = Command::new(tool)
        .arg("-quiet")
        .arg("-q")
        .arg(quality.to_string())
        .arg(input)
        .arg("-o")
        .arg(&*staged)
        .output()
        .await?;

    if !output.status.success() {
        return Err(NormalizeError::Encoder(format!(
            "cwebp failed ({}) for {}: {}",
            output.status,
            source.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    publish(staged, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 80, 40])).save(path).unwrap();
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([10, 120, 220, 180])).save(path).unwrap();
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(ImageProcessor::target_dimensions(1200, 1800, Some(800)), (800, 1200));
        assert_eq!(ImageProcessor::target_dimensions(600, 900, Some(800)), (600, 900));
        assert_eq!(ImageProcessor::target_dimensions(800, 600, Some(800)), (800, 600));
        assert_eq!(ImageProcessor::target_dimensions(1000, 333, Some(300)), (300, 100));
        assert_eq!(ImageProcessor::target_dimensions(3000, 1, Some(300)), (300, 1));
        assert_eq!(ImageProcessor::target_dimensions(5000, 4000, None), (5000, 4000));
    }

    #[test]
    fn test_builtin_choice_never_needs_cwebp() {
        let empty = TempDir::new().unwrap();
        let resolver = ToolPathResolver::with_paths(None, Some(empty.path().as_os_str().to_owned()));

        let processor = ImageProcessor::with_resolver(EncoderChoice::Builtin, &resolver).unwrap();
        assert_eq!(processor.encoder(), &WebpEncoder::Builtin);

        let auto = ImageProcessor::with_resolver(EncoderChoice::Auto, &resolver).unwrap();
        assert_eq!(auto.encoder(), &WebpEncoder::Builtin);
    }

    #[test]
    fn test_required_cwebp_missing() {
        let empty = TempDir::new().unwrap();
        let resolver = ToolPathResolver::with_paths(None, Some(empty.path().as_os_str().to_owned()));

        let err = ImageProcessor::with_resolver(EncoderChoice::Cwebp, &resolver).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingTool(_)));
    }

    #[tokio::test]
    async fn test_convert_downscales_wide_jpeg() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("poster1.jpg");
        let target = dir.path().join("poster1.webp");
        write_jpeg(&source, 1200, 1800);

        let converted = ImageProcessor::builtin()
            .convert(&source, &target, Some(800), 85)
            .await
            .unwrap();

        assert!(converted.resized);
        assert_eq!(converted.original, (1200, 1800));
        assert_eq!(converted.output, (800, 1200));
        assert_eq!(image::image_dimensions(&target).unwrap(), (800, 1200));
        assert!(converted.converted_size > 0);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_convert_keeps_small_png() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("poster2.png");
        let target = dir.path().join("poster2.webp");
        write_png(&source, 600, 900);

        let converted = ImageProcessor::builtin()
            .convert(&source, &target, Some(800), 85)
            .await
            .unwrap();

        assert!(!converted.resized);
        assert_eq!(image::image_dimensions(&target).unwrap(), (600, 900));
    }

    #[tokio::test]
    async fn test_convert_twice_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        let target = dir.path().join("a.webp");
        write_png(&source, 40, 20);

        let processor = ImageProcessor::builtin();
        processor.convert(&source, &target, None, 80).await.unwrap();
        processor.convert(&source, &target, Some(20), 80).await.unwrap();

        assert_eq!(image::image_dimensions(&target).unwrap(), (20, 10));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_convert_into_missing_output_dir() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("out/nested/a.webp");
        write_jpeg(&source, 10, 10);

        ImageProcessor::builtin().convert(&source, &target, None, 80).await.unwrap();
        assert!(target.is_file());
    }

    #[tokio::test]
    async fn test_corrupt_image_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        let target = dir.path().join("broken.webp");
        std::fs::write(&source, b"this is not a jpeg").unwrap();

        let err = ImageProcessor::builtin()
            .convert(&source, &target, None, 80)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::FailureKind::Decode);
        assert!(!target.exists());
        assert!(source.exists());
    }

    fn write_noise(path: &Path, width: u32, height: u32) {
        let mut state: u32 = 0x2545_f491;
        let image = RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });
        image.save(path).unwrap();
    }

    fn part_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(".part"))
            .collect()
    }

    #[tokio::test]
    async fn test_builtin_quality_controls_size() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("noise.png");
        write_noise(&source, 128, 128);

        let processor = ImageProcessor::builtin();
        let high = processor
            .convert(&source, &dir.path().join("high.webp"), None, 95)
            .await
            .unwrap();
        let low = processor
            .convert(&source, &dir.path().join("low.webp"), None, 10)
            .await
            .unwrap();

        assert!(low.converted_size < high.converted_size);
        assert_eq!(image::image_dimensions(dir.path().join("low.webp")).unwrap(), (128, 128));
    }

    #[cfg(unix)]
    fn fake_cwebp(tools: &Path, body: &str) -> ImageProcessor {
        use std::os::unix::fs::PermissionsExt;

        let script = tools.join("cwebp");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = ToolPathResolver::with_paths(Some(tools.to_path_buf()), None);
        let processor = ImageProcessor::with_resolver(EncoderChoice::Cwebp, &resolver).unwrap();
        assert_eq!(processor.encoder(), &WebpEncoder::Cwebp(script));
        processor
    }

    /// Script that logs its arguments, keeps a copy of its input and copies it to `-o`
    #[cfg(unix)]
    fn recording_cwebp(tools: &Path) -> ImageProcessor {
        let body = format!(
            r#"printf '%s\n' "$@" > "{log}"
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -q) shift 2 ;;
    -*) shift ;;
    *) input="$1"; shift ;;
  esac
done
cp "$input" "{seen}"
cp "$input" "$out""#,
            log = tools.join("args.log").display(),
            seen = tools.join("seen_input").display(),
        );
        fake_cwebp(tools, &body)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cwebp_receives_quality_and_resized_png() {
        let tools = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("poster1.jpg");
        let target = dir.path().join("poster1.webp");
        write_jpeg(&source, 1200, 1800);

        let converted = recording_cwebp(tools.path())
            .convert(&source, &target, Some(800), 85)
            .await
            .unwrap();

        let args: Vec<String> = std::fs::read_to_string(tools.path().join("args.log"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let q = args.iter().position(|a| a == "-q").unwrap();
        assert_eq!(args[q + 1], "85");
        assert!(args.contains(&"-quiet".to_string()));

        let seen = ImageReader::open(tools.path().join("seen_input"))
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(seen.format(), Some(ImageFormat::Png));
        assert_eq!(seen.into_dimensions().unwrap(), (800, 1200));

        assert!(converted.resized);
        assert!(target.is_file());
        assert!(part_files(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cwebp_reads_unresized_source_directly() {
        let tools = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("poster2.png");
        write_png(&source, 60, 90);

        recording_cwebp(tools.path())
            .convert(&source, &dir.path().join("poster2.webp"), Some(800), 70)
            .await
            .unwrap();

        let args = std::fs::read_to_string(tools.path().join("args.log")).unwrap();
        assert!(args.lines().any(|a| a == source.to_string_lossy()));
        assert!(args.lines().any(|a| a == "70"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cwebp_failure_is_encode_error() {
        let tools = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.jpg");
        let target = dir.path().join("a.webp");
        write_jpeg(&source, 20, 20);

        let err = fake_cwebp(tools.path(), "echo 'cannot encode' >&2\nexit 1")
            .convert(&source, &target, None, 85)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::FailureKind::Encode);
        assert!(err.to_string().contains("cannot encode"));
        assert!(!target.exists());
        assert!(source.exists());
        assert!(part_files(dir.path()).is_empty());
    }
}
