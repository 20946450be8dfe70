//! Face localization and annotation.
//!
//! Decodes an uploaded image, runs the detector over its intensity channel,
//! keeps the largest face and outlines it on a JPEG re-encode.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};
use thiserror::Error;

use crate::detector::FaceDetector;
use crate::types::FaceRegion;

const OUTLINE_GREEN: [u8; 3] = [0, 255, 0];
const OUTLINE_STROKE: u32 = 3;
const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum LocalizeError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),
}

/// How the selected face is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationStyle {
    pub color: [u8; 3],
    /// Outline thickness in pixels, drawn inward from the region edge.
    pub stroke: u32,
    pub jpeg_quality: u8,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: OUTLINE_GREEN,
            stroke: OUTLINE_STROKE,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

/// Output of [`FaceLocalizer::localize`].
#[derive(Debug, Clone)]
pub struct Localization {
    /// Annotated JPEG when `region` is set; otherwise the input bytes untouched.
    pub image: Vec<u8>,
    pub region: Option<FaceRegion>,
}

/// Finds the largest face in an image and marks it.
#[derive(Clone)]
pub struct FaceLocalizer {
    detector: Arc<dyn FaceDetector>,
    style: AnnotationStyle,
}

impl FaceLocalizer {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            detector,
            style: AnnotationStyle::default(),
        }
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Localize the largest face in `bytes`.
    ///
    /// An image with no face is not an error: the original bytes come back
    /// with `region: None`. Undecodable input is.
    pub fn localize(&self, bytes: &[u8]) -> Result<Localization, LocalizeError> {
        let decoded = image::load_from_memory(bytes).map_err(LocalizeError::Decode)?;
        let (width, height) = (decoded.width(), decoded.height());

        let gray = decoded.to_luma8();
        let candidates = self.detector.detect(gray.as_raw(), width, height);

        // Clip before ranking so an overhanging box is judged by what is visible.
        let regions: Vec<FaceRegion> = candidates
            .iter()
            .filter_map(|c| {
                FaceRegion::within(
                    c.x as i64,
                    c.y as i64,
                    c.width as u64,
                    c.height as u64,
                    width,
                    height,
                )
            })
            .collect();

        tracing::debug!(
            width,
            height,
            candidates = candidates.len(),
            in_bounds = regions.len(),
            "face scan complete"
        );

        let Some(region) = largest(&regions) else {
            tracing::info!(width, height, "no face detected");
            return Ok(Localization {
                image: bytes.to_vec(),
                region: None,
            });
        };

        let mut rgb = decoded.to_rgb8();
        draw_outline(&mut rgb, region, &self.style);
        let image = encode_jpeg(&rgb, self.style.jpeg_quality)?;

        tracing::info!(
            x = region.x,
            y = region.y,
            w = region.width,
            h = region.height,
            bytes = image.len(),
            "face localized"
        );

        Ok(Localization {
            image,
            region: Some(region),
        })
    }
}

/// The region with the largest area. Ties keep the first one encountered,
/// so the result follows the detector's enumeration order.
pub fn largest(regions: &[FaceRegion]) -> Option<FaceRegion> {
    let mut best: Option<FaceRegion> = None;
    for region in regions {
        match best {
            Some(b) if region.area() <= b.area() => {}
            _ => best = Some(*region),
        }
    }
    best
}

/// Draw a hollow rectangle on `image` along the inside of `region`.
///
/// Pixels outside the image are skipped, so a region that does not fit
/// cannot panic.
pub fn draw_outline(image: &mut RgbImage, region: FaceRegion, style: &AnnotationStyle) {
    let (img_w, img_h) = image.dimensions();
    let right = region.right().min(img_w);
    let bottom = region.bottom().min(img_h);
    let stroke = style.stroke.max(1);
    let color = image::Rgb(style.color);

    for y in region.y..bottom {
        let near_y = y - region.y < stroke || region.bottom() - 1 - y < stroke;
        for x in region.x..right {
            let near_x = x - region.x < stroke || region.right() - 1 - x < stroke;
            if near_x || near_y {
                image.put_pixel(x, y, color);
            }
        }
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, LocalizeError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(LocalizeError::Encode)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Candidate;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    struct Fixed(Vec<Candidate>);

    impl FaceDetector for Fixed {
        fn detect(&self, _gray: &[u8], _width: u32, _height: u32) -> Vec<Candidate> {
            self.0.clone()
        }
    }

    fn cand(x: i32, y: i32, w: u32, h: u32) -> Candidate {
        Candidate { x, y, width: w, height: h, score: 5.0 }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 40, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn localizer(candidates: Vec<Candidate>) -> FaceLocalizer {
        FaceLocalizer::new(Arc::new(Fixed(candidates)))
    }

    #[test]
    fn test_no_face_returns_input_unchanged() {
        let input = png(64, 48);
        let out = localizer(vec![]).localize(&input).unwrap();
        assert!(out.region.is_none());
        assert_eq!(out.image, input);
    }

    #[test]
    fn test_candidates_fully_outside_count_as_no_face() {
        let input = png(64, 48);
        let out = localizer(vec![cand(100, 100, 20, 20), cand(-40, 0, 30, 30)])
            .localize(&input)
            .unwrap();
        assert!(out.region.is_none());
        assert_eq!(out.image, input);
    }

    #[test]
    fn test_largest_face_is_selected_and_annotated() {
        let input = png(120, 100);
        let out = localizer(vec![cand(5, 5, 20, 20), cand(40, 30, 50, 40), cand(10, 60, 30, 30)])
            .localize(&input)
            .unwrap();

        let region = out.region.unwrap();
        assert_eq!(region, FaceRegion { x: 40, y: 30, width: 50, height: 40 });
        assert_ne!(out.image, input);
        assert_eq!(&out.image[..2], &[0xFF, 0xD8], "annotated output is JPEG");

        let decoded = image::load_from_memory(&out.image).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (120, 100));
        // Outline pixel is green-dominant after JPEG round trip; the interior is not.
        let edge = decoded.get_pixel(41, 50);
        assert!(edge[1] > 180 && edge[0] < 90, "edge pixel {edge:?}");
        let inside = decoded.get_pixel(65, 50);
        assert!(inside[2] > 150 && inside[1] < 100, "inside pixel {inside:?}");
    }

    #[test]
    fn test_overhanging_candidate_is_clipped() {
        let input = png(60, 60);
        let out = localizer(vec![cand(40, -10, 50, 40)]).localize(&input).unwrap();
        assert_eq!(out.region, Some(FaceRegion { x: 40, y: 0, width: 20, height: 30 }));
    }

    #[test]
    fn test_equal_area_tie_keeps_first() {
        let input = png(100, 100);
        let out = localizer(vec![cand(0, 0, 20, 30), cand(50, 50, 30, 20)])
            .localize(&input)
            .unwrap();
        assert_eq!(out.region, Some(FaceRegion { x: 0, y: 0, width: 20, height: 30 }));
    }

    #[test]
    fn test_custom_style_changes_outline() {
        let style = AnnotationStyle {
            color: [255, 0, 0],
            stroke: 8,
            jpeg_quality: 90,
        };
        let loc = localizer(vec![cand(20, 20, 40, 40)]).with_style(style.clone());
        assert_eq!(loc.style(), &style);

        let out = loc.localize(&png(100, 100)).unwrap();
        let decoded = image::load_from_memory(&out.image).unwrap().to_rgb8();
        // Two pixels in is still the wide red band, past the default stroke.
        let edge = decoded.get_pixel(22, 40);
        assert!(edge[0] > 150 && edge[1] < 100, "edge pixel {edge:?}");
        let inner = decoded.get_pixel(40, 40);
        assert!(inner[2] > 150 && inner[0] < 100, "inner pixel {inner:?}");
    }

    #[test]
    fn test_undecodable_input_is_an_error() {
        let err = localizer(vec![cand(0, 0, 10, 10)])
            .localize(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, LocalizeError::Decode(_)));
    }

    #[test]
    fn test_largest_picks_max_area_first_on_tie() {
        let r = |x, y, w, h| FaceRegion::within(x, y, w, h, 200, 200).unwrap();
        assert_eq!(largest(&[]), None);
        assert_eq!(largest(&[r(0, 0, 10, 10), r(5, 5, 30, 20), r(50, 50, 20, 20)]), Some(r(5, 5, 30, 20)));
        assert_eq!(largest(&[r(0, 0, 10, 40), r(5, 5, 20, 20), r(9, 9, 40, 10)]), Some(r(0, 0, 10, 40)));
    }

    #[test]
    fn test_draw_outline_marks_only_the_border() {
        let mut img = RgbImage::new(20, 20);
        let region = FaceRegion::within(2, 2, 10, 10, 20, 20).unwrap();
        let style = AnnotationStyle::default();
        draw_outline(&mut img, region, &style);

        let green = Rgb([0, 255, 0]);
        let black = Rgb([0, 0, 0]);
        // Three-pixel band along each edge.
        assert_eq!(*img.get_pixel(2, 2), green);
        assert_eq!(*img.get_pixel(4, 7), green);
        assert_eq!(*img.get_pixel(11, 11), green);
        assert_eq!(*img.get_pixel(9, 6), green);
        // Interior and exterior untouched.
        assert_eq!(*img.get_pixel(5, 5), black);
        assert_eq!(*img.get_pixel(8, 8), black);
        assert_eq!(*img.get_pixel(1, 1), black);
        assert_eq!(*img.get_pixel(12, 12), black);
    }

    #[test]
    fn test_draw_outline_small_region_is_filled() {
        let mut img = RgbImage::new(10, 10);
        let region = FaceRegion::within(0, 0, 4, 4, 10, 10).unwrap();
        draw_outline(&mut img, region, &AnnotationStyle::default());
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(*img.get_pixel(x, y), Rgb([0, 255, 0]));
            }
        }
        assert_eq!(*img.get_pixel(4, 4), Rgb([0, 0, 0]));
    }
}
