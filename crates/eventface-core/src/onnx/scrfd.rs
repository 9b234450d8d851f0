//! SCRFD face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three strides, followed by a loose NMS pass to
//! collapse the per-anchor candidates. The pipeline runs its own, stricter
//! duplicate suppression afterwards.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::detector::DetectionError;
use crate::suppressor::non_max_suppression;
use crate::types::BoundingBox;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// A raw SCRFD detection in source image coordinates.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub landmarks: [(f32, f32); 5],
}

/// Mapping from letterboxed model space back to the source image.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_source(self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score, bbox, kps).
type StrideOutputs = (usize, usize, usize);

pub struct ScrfdDetector {
    session: Session,
    stride_outputs: [StrideOutputs; 3],
    min_confidence: f32,
}

impl ScrfdDetector {
    pub fn load(model_path: &Path, min_confidence: f32) -> Result<Self, DetectionError> {
        if !model_path.exists() {
            return Err(DetectionError::ModelNotFound(model_path.display().to_string()));
        }

        let session = open_session(model_path).map_err(inference_err)?;
        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 9 {
            return Err(DetectionError::InferenceFailed(format!(
                "SCRFD model needs 9 outputs (3 strides x score/bbox/kps), got {}",
                names.len()
            )));
        }

        let stride_outputs = output_indices(&names);
        tracing::info!(path = %model_path.display(), outputs = ?names, ?stride_outputs, "loaded SCRFD model");

        Ok(Self {
            session,
            stride_outputs,
            min_confidence,
        })
    }

    /// Detect faces, most confident first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Candidate>, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectionError::Decode("image has no pixels".into()));
        }

        let (input, letterbox) = preprocess(image);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view()).map_err(inference_err)?])
            .map_err(inference_err)?;

        let mut candidates = Vec::new();
        for (pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_outputs[pos];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data.to_vec())
                    .map_err(|e| DetectionError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let scores = extract(score_idx, "scores")?;
            let bboxes = extract(bbox_idx, "bboxes")?;
            let kps = extract(kps_idx, "kps")?;

            candidates.extend(decode_stride(
                &scores,
                &bboxes,
                &kps,
                stride,
                letterbox,
                self.min_confidence,
            ));
        }

        Ok(non_max_suppression(candidates, SCRFD_NMS_THRESHOLD, |c| (&c.bbox, c.confidence)))
    }
}

pub(crate) fn open_session(model_path: &Path) -> ort::Result<Session> {
    Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
}

pub(crate) fn inference_err(e: ort::Error) -> DetectionError {
    DetectionError::InferenceFailed(e.to_string())
}

/// Letterbox the image into the square model input and normalise it to NCHW.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let size = SCRFD_INPUT_SIZE as f32;
    let scale = (size / image.width() as f32).min(size / image.height() as f32);
    let new_w = ((image.width() as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
    let new_h = ((image.height() as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE);
    let pad_x = (SCRFD_INPUT_SIZE - new_w) / 2;
    let pad_y = (SCRFD_INPUT_SIZE - new_h) / 2;

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let n = SCRFD_INPUT_SIZE as usize;
    // Padding stays at 0.0, which is SCRFD_MEAN after normalisation.
    let mut tensor = Array4::<f32>::zeros((1, 3, n, n));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, letterbox)
}

/// Map output tensors to strides by name ("score_8", "bbox_16", ...), falling
/// back to the standard positional layout [scores x3, bboxes x3, kps x3].
fn output_indices(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let mut named = [(0, 0, 0); 3];
    for (i, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride), find("kps", stride)) {
            (Some(s), Some(b), Some(k)) => named[i] = (s, b, k),
            _ => return [(0, 3, 6), (1, 4, 7), (2, 5, 8)],
        }
    }
    named
}

/// Decode the candidates of one stride level above `threshold`.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: Letterbox,
    threshold: f32,
) -> Vec<Candidate> {
    let grid = SCRFD_INPUT_SIZE as usize / stride;
    let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let s = stride as f32;

    let mut out = Vec::new();
    for idx in 0..anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score < threshold {
            continue;
        }
        let (Some(off), Some(pts)) = (bboxes.get(idx * 4..idx * 4 + 4), kps.get(idx * 10..idx * 10 + 10))
        else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let ax = (cell % grid) as f32 * s;
        let ay = (cell / grid) as f32 * s;

        let (x1, y1) = letterbox.to_source(ax - off[0] * s, ay - off[1] * s);
        let (x2, y2) = letterbox.to_source(ax + off[2] * s, ay + off[3] * s);

        let mut landmarks = [(0.0f32, 0.0f32); 5];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = letterbox.to_source(ax + pts[i * 2] * s, ay + pts[i * 2 + 1] * s);
        }

        out.push(Candidate {
            bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
            confidence: score,
            landmarks,
        });
    }
    out
}
