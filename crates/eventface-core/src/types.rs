use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of a detected face, in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Area of the box. Boxes with a negative or zero side have area 0.
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Face descriptor vector (128-d for dlib-style models, 512-d for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when no value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Euclidean distance between two descriptors.
    ///
    /// Callers are expected to have checked that both have the same length;
    /// extra trailing values on either side are ignored.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// A face produced by the detector. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    pub descriptor: Descriptor,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    /// Passed through untouched by the pipeline.
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// A known person with the one descriptor used for a matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredIdentity {
    pub identity_id: String,
    pub descriptor: Descriptor,
}

impl RegisteredIdentity {
    pub fn new(identity_id: impl Into<String>, descriptor: impl Into<Descriptor>) -> Self {
        Self {
            identity_id: identity_id.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Outcome of matching one de-duplicated face of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Position in the de-duplicated face list of the image (0-based).
    pub face_index: usize,
    /// `None` when no identity met the threshold or the best identity was
    /// already claimed by an earlier face of the same image.
    pub identity_id: Option<String>,
    /// Distance to the closest identity, rounded to 3 decimals.
    /// `None` only when the registry was empty.
    pub distance: Option<f32>,
    pub image_url: String,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.identity_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Descriptor::new(vec![0.1, 0.2, 0.3]);
        assert!(a.euclidean_distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_known() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_area_degenerate_boxes() {
        assert_eq!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).area(), 0.0);
        assert_eq!(BoundingBox::new(0.0, 0.0, -5.0, 10.0).area(), 0.0);
        assert_eq!(BoundingBox::new(0.0, 0.0, 4.0, 5.0).area(), 20.0);
    }

    #[test]
    fn test_match_result_serializes_camel_case() {
        let m = MatchResult {
            face_index: 1,
            identity_id: Some("alice".into()),
            distance: Some(0.412),
            image_url: "http://img/1.jpg".into(),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["faceIndex"], 1);
        assert_eq!(json["identityId"], "alice");
        assert_eq!(json["imageUrl"], "http://img/1.jpg");
    }
}
