use crate::{PredictError, input::ResolvedInput};
use image::{GrayImage, RgbImage, imageops};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// SeetaFace cannot look for faces smaller than its detection window
const MIN_DETECTABLE_FACE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Finds faces and makes them unrecognizable in place
pub trait FaceAnonymizer: Send + Sync {
    /// Returns the number of faces that were blurred
    fn anonymize(&self, image: &mut RgbImage) -> usize;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSettings {
    /// SeetaFace frontal model (`seeta_fd_frontal_v1.0.bin`)
    pub model_path: Option<PathBuf>,
    pub min_face_size: u32,
    pub blur_sigma: f32,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            min_face_size: 20,
            blur_sigma: 12.0,
        }
    }
}

/// [`FaceAnonymizer`] backed by the `rustface` SeetaFace engine
pub struct RustfaceAnonymizer {
    model: rustface::Model,
    min_face_size: u32,
    blur_sigma: f32,
}

impl RustfaceAnonymizer {
    pub fn from_file(path: &Path, settings: &FaceSettings) -> Result<Self, PredictError> {
        let data = std::fs::read(path)?;
        let model = rustface::read_model(Cursor::new(data)).map_err(|e| {
            PredictError::Anonymizer(format!("invalid face model {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), "Face detection model loaded");
        Ok(Self {
            model,
            min_face_size: settings.min_face_size.max(MIN_DETECTABLE_FACE),
            blur_sigma: settings.blur_sigma.max(0.1),
        })
    }

    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = gray.dimensions();
        if width < MIN_DETECTABLE_FACE || height < MIN_DETECTABLE_FACE {
            return Vec::new();
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        detector
            .detect(&rustface::ImageData::new(gray.as_raw(), width, height))
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                clip(bbox.x(), bbox.y(), bbox.width(), bbox.height(), width, height)
            })
            .collect()
    }
}

/// Intersect a detector box with the image bounds
fn clip(x: i32, y: i32, w: u32, h: u32, width: u32, height: u32) -> Option<FaceRegion> {
    let x0 = (x.max(0) as u32).min(width);
    let y0 = (y.max(0) as u32).min(height);
    let x1 = ((x + w as i32).max(0) as u32).min(width);
    let y1 = ((y + h as i32).max(0) as u32).min(height);

    (x1 > x0 && y1 > y0).then_some(FaceRegion {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Blur `region` of `image` in place
pub fn blur_region(image: &mut RgbImage, region: FaceRegion, sigma: f32) {
    let patch = imageops::crop_imm(&*image, region.x, region.y, region.width, region.height).to_image();
    let blurred = gaussian_blur_f32(&patch, sigma);
    imageops::replace(image, &blurred, region.x as i64, region.y as i64);
}

impl FaceAnonymizer for RustfaceAnonymizer {
    fn anonymize(&self, image: &mut RgbImage) -> usize {
        let gray = imageops::grayscale(&*image);
        let faces = self.detect(&gray);
        for face in &faces {
            blur_region(image, *face, self.blur_sigma);
        }
        faces.len()
    }
}

/// Rewrite every image of `input` with faces blurred.
///
/// Names are kept; each path is replaced by a PNG copy in a new scratch
/// directory owned by `input`.
pub fn anonymize_images(
    anonymizer: &dyn FaceAnonymizer,
    mut input: ResolvedInput,
) -> Result<ResolvedInput, PredictError> {
    let scratch = tempfile::Builder::new().prefix("litter-anon-").tempdir()?;
    let mut paths = Vec::with_capacity(input.len());

    for (index, (name, path)) in input.iter().enumerate() {
        let mut image = crate::predict::load_image(name, path)?;
        let faces = anonymizer.anonymize(&mut image);
        if faces > 0 {
            tracing::info!(image = name, faces, "Faces blurred");
        }

        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image_{index}"));
        let target = scratch.path().join(format!("{index:04}_{stem}.png"));
        image.save(&target).map_err(|source| PredictError::Decode {
            name: name.to_string(),
            source,
        })?;
        paths.push(target);
    }

    input.replace_paths(paths, scratch);
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Blurs the top-left quarter of every image
    struct BrightSquares;

    impl FaceAnonymizer for BrightSquares {
        fn anonymize(&self, image: &mut RgbImage) -> usize {
            let region = FaceRegion {
                x: 0,
                y: 0,
                width: image.width() / 2,
                height: image.height() / 2,
            };
            blur_region(image, region, 4.0);
            1
        }
    }

    #[test]
    fn test_blur_only_touches_region() {
        let mut image = RgbImage::from_fn(40, 40, |x, _| {
            if x % 2 == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let before = image.clone();

        blur_region(
            &mut image,
            FaceRegion { x: 0, y: 0, width: 20, height: 20 },
            3.0,
        );

        assert_ne!(image.get_pixel(4, 4), before.get_pixel(4, 4));
        assert_eq!(image.get_pixel(30, 30), before.get_pixel(30, 30));
    }

    #[test]
    fn test_every_path_replaced_and_count_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut input_paths = Vec::new();
        for name in ["a.png", "b.png", "c.png"] {
            let path = dir.path().join(name);
            RgbImage::from_pixel(32, 32, Rgb([200, 200, 200])).save(&path).unwrap();
            input_paths.push(path);
        }
        let input = ResolvedInput::new(
            vec!["a.png".into(), "b.png".into(), "c.png".into()],
            input_paths.clone(),
        );

        let anonymized = anonymize_images(&BrightSquares, input).unwrap();

        assert_eq!(anonymized.len(), 3);
        assert_eq!(anonymized.names(), ["a.png", "b.png", "c.png"]);
        for (before, after) in input_paths.iter().zip(anonymized.paths()) {
            assert_ne!(before, after);
            assert!(after.exists());
        }
    }

    #[test]
    fn test_clip_to_image_bounds() {
        assert_eq!(
            clip(-5, 10, 30, 30, 20, 100),
            Some(FaceRegion { x: 0, y: 10, width: 20, height: 30 })
        );
        assert_eq!(clip(50, 50, 10, 10, 20, 20), None);
    }

    #[test]
    fn test_missing_model_file() {
        let result = RustfaceAnonymizer::from_file(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            &FaceSettings::default(),
        );
        assert!(matches!(result, Err(PredictError::Io(_))));
    }
}
