//! Face-mesh landmark topology.
//!
//! Indices refer to the 468-point face mesh topology. They are a contract
//! with the external face-mesh model and must be revalidated if that model's
//! topology changes.

use serde::{Deserialize, Serialize};

use crate::geometry::{video_to_canvas, DrawDimensions, Point};
use crate::services::Landmark;

/// Left eye contour, closed polygon.
pub const LEFT_EYE: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];

/// Right eye contour, closed polygon.
pub const RIGHT_EYE: [usize; 16] = [
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];

/// Outer lip contour, closed polygon.
pub const MOUTH: [usize; 20] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];

/// Nose tip.
pub const NOSE_TIP: usize = 1;

/// Left face edge (cheek at the tragus line).
pub const FACE_EDGE_LEFT: usize = 234;

/// Right face edge (cheek at the tragus line).
pub const FACE_EDGE_RIGHT: usize = 454;

/// Regions kept sharp when face smoothing is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceRegion {
    /// Left eye.
    LeftEye,
    /// Right eye.
    RightEye,
    /// Mouth.
    Mouth,
}

impl FaceRegion {
    /// Every sharpened region.
    pub const ALL: [FaceRegion; 3] = [FaceRegion::LeftEye, FaceRegion::RightEye, FaceRegion::Mouth];

    /// Landmark indices outlining the region.
    #[must_use]
    pub fn indices(self) -> &'static [usize] {
        match self {
            FaceRegion::LeftEye => &LEFT_EYE,
            FaceRegion::RightEye => &RIGHT_EYE,
            FaceRegion::Mouth => &MOUTH,
        }
    }
}

/// Landmarks for a single face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    points: Vec<Landmark>,
}

impl FaceLandmarks {
    /// Wrap a landmark list.
    #[must_use]
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Landmark mapped to canvas pixels.
    #[must_use]
    pub fn to_canvas(
        &self,
        index: usize,
        video_width: f64,
        video_height: f64,
        dims: &DrawDimensions,
    ) -> Option<Point> {
        let lm = self.points.get(index)?;
        Some(video_to_canvas(
            Point::new(lm.x * video_width, lm.y * video_height),
            video_width,
            video_height,
            dims,
        ))
    }

    /// Closed polygon for a region in canvas pixels.
    ///
    /// Returns `None` if any index is missing (truncated mesh).
    #[must_use]
    pub fn region_polygon(
        &self,
        region: FaceRegion,
        video_width: f64,
        video_height: f64,
        dims: &DrawDimensions,
    ) -> Option<Vec<Point>> {
        region
            .indices()
            .iter()
            .map(|i| self.to_canvas(*i, video_width, video_height, dims))
            .collect()
    }

    /// Nose tip in canvas pixels.
    #[must_use]
    pub fn nose_tip(&self, video_width: f64, video_height: f64, dims: &DrawDimensions) -> Option<Point> {
        self.to_canvas(NOSE_TIP, video_width, video_height, dims)
    }

    /// Horizontal distance between the face edges in canvas pixels.
    #[must_use]
    pub fn face_width(&self, video_width: f64, video_height: f64, dims: &DrawDimensions) -> Option<f64> {
        let left = self.to_canvas(FACE_EDGE_LEFT, video_width, video_height, dims)?;
        let right = self.to_canvas(FACE_EDGE_RIGHT, video_width, video_height, dims)?;
        Some((right.x - left.x).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> FaceLandmarks {
        #[allow(clippy::cast_precision_loss)]
        let points = (0..468)
            .map(|i| Landmark {
                x: (i as f64) / 468.0,
                y: 0.5,
                z: 0.0,
            })
            .collect();
        FaceLandmarks::new(points)
    }

    fn full_canvas() -> DrawDimensions {
        DrawDimensions {
            draw_width: 640.0,
            draw_height: 480.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    #[test]
    fn test_region_polygon_has_every_point() {
        let m = mesh();
        let poly = m
            .region_polygon(FaceRegion::Mouth, 640.0, 480.0, &full_canvas())
            .expect("complete mesh");
        assert_eq!(poly.len(), MOUTH.len());
        assert!(poly.iter().all(|p| (p.y - 240.0).abs() < 1e-9));
    }

    #[test]
    fn test_truncated_mesh_yields_none() {
        let m = FaceLandmarks::new(vec![Landmark::default(); 10]);
        assert!(m
            .region_polygon(FaceRegion::LeftEye, 640.0, 480.0, &full_canvas())
            .is_none());
        assert!(m.face_width(640.0, 480.0, &full_canvas()).is_none());
    }

    #[test]
    fn test_face_width_and_nose() {
        let m = mesh();
        let dims = full_canvas();
        let width = m.face_width(640.0, 480.0, &dims).expect("width");
        let expected = (454.0 - 234.0) / 468.0 * 640.0;
        assert!((width - expected).abs() < 1e-9);

        let nose = m.nose_tip(640.0, 480.0, &dims).expect("nose");
        assert!((nose.x - 640.0 / 468.0).abs() < 1e-9);
    }

    #[test]
    fn test_landmarks_respect_letterbox_offset() {
        let m = mesh();
        let dims = DrawDimensions {
            draw_width: 320.0,
            draw_height: 240.0,
            offset_x: 100.0,
            offset_y: 20.0,
        };
        let nose = m.nose_tip(640.0, 480.0, &dims).expect("nose");
        assert!((nose.y - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_indices_within_mesh() {
        for region in FaceRegion::ALL {
            assert!(region.indices().iter().all(|i| *i < 468));
        }
    }
}
