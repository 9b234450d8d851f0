//! Face alignment to the canonical ArcFace crop.
//!
//! Fits a 4-DOF similarity transform (scale, rotation, translation) from the
//! five detected landmarks to the InsightFace reference positions, then warps
//! the face with bilinear sampling.

use image::{Rgb, RgbImage};

pub const ALIGNED_SIZE: u32 = 112;

/// ArcFace reference landmarks for a 112×112 crop.
const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// `dst ≈ [a -b; b a] * src + t`, stored as `[a, -b, tx, b, a, ty]`.
type Similarity = [f32; 6];

fn centroid(points: &[(f32, f32); 5]) -> (f32, f32) {
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / 5.0, sy / 5.0)
}

/// Closed-form least-squares similarity from `src` to `dst`.
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    let (scx, scy) = centroid(src);
    let (dcx, dcy) = centroid(dst);

    let mut dot = 0.0f32;
    let mut cross = 0.0f32;
    let mut spread = 0.0f32;
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - scx, sy - scy);
        let (dx, dy) = (dx - dcx, dy - dcy);
        dot += sx * dx + sy * dy;
        cross += sx * dy - sy * dx;
        spread += sx * sx + sy * sy;
    }

    if spread < 1e-9 {
        // All landmarks coincide: translate only.
        return [1.0, 0.0, dcx - scx, 0.0, 1.0, dcy - scy];
    }

    let a = dot / spread;
    let b = cross / spread;
    let tx = dcx - (a * scx - b * scy);
    let ty = dcy - (b * scx + a * scy);
    [a, -b, tx, b, a, ty]
}

fn sample(image: &RgbImage, x: i64, y: i64, c: usize) -> f32 {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return 0.0;
    }
    image.get_pixel(x as u32, y as u32)[c] as f32
}

/// Warp `image` through the inverse of `m` into a `size`×`size` crop.
/// Pixels that map outside the source are black.
fn warp(image: &RgbImage, m: &Similarity, size: u32) -> RgbImage {
    let (a, b, tx, ty) = (m[0], m[3], m[2], m[5]);
    let det = a * a + b * b;
    if det < 1e-12 {
        return RgbImage::new(size, size);
    }

    RgbImage::from_fn(size, size, |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = (a * dx + b * dy) / det;
        let sy = (-b * dx + a * dy) / det;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            let v = sample(image, x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                + sample(image, x0 + 1, y0, c) * fx * (1.0 - fy)
                + sample(image, x0, y0 + 1, c) * (1.0 - fx) * fy
                + sample(image, x0 + 1, y0 + 1, c) * fx * fy;
            *out = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    })
}

/// Align a face to the 112×112 ArcFace input using its five landmarks.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let m = estimate_similarity(landmarks, &REFERENCE_LANDMARKS);
    warp(image, &m, ALIGNED_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = estimate_similarity(&REFERENCE_LANDMARKS, &REFERENCE_LANDMARKS);
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4);
        assert!(m[2].abs() < 1e-3);
        assert!(m[3].abs() < 1e-4);
        assert!(m[5].abs() < 1e-3);
    }

    #[test]
    fn test_scaled_transform() {
        let src = REFERENCE_LANDMARKS.map(|(x, y)| (x * 2.0, y * 2.0));
        let m = estimate_similarity(&src, &REFERENCE_LANDMARKS);
        assert!((m[0] - 0.5).abs() < 1e-3, "a = {}", m[0]);
        assert!(m[3].abs() < 1e-3);
    }

    #[test]
    fn test_rotated_transform() {
        // Source rotated by +90°: (x, y) -> (-y, x). Undoing it needs b = -1.
        let src = REFERENCE_LANDMARKS.map(|(x, y)| (-y, x));
        let m = estimate_similarity(&src, &REFERENCE_LANDMARKS);
        assert!(m[0].abs() < 1e-3, "a = {}", m[0]);
        assert!((m[3] + 1.0).abs() < 1e-3, "b = {}", m[3]);
    }

    #[test]
    fn test_degenerate_landmarks_translate_only() {
        let src = [(10.0, 10.0); 5];
        let m = estimate_similarity(&src, &REFERENCE_LANDMARKS);
        assert_eq!(m[0], 1.0);
        assert_eq!(m[3], 0.0);
    }

    #[test]
    fn test_align_output_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        assert_eq!(aligned.get_pixel(56, 56)[0], 90);
    }

    #[test]
    fn test_landmark_lands_on_reference() {
        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        let mut image = RgbImage::new(200, 200);
        let (lx, ly) = (src[0].0 as u32, src[0].1 as u32);
        for y in ly - 2..=ly + 2 {
            for x in lx - 2..=lx + 2 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&image, &src);
        let (rx, ry) = (
            REFERENCE_LANDMARKS[0].0.round() as u32,
            REFERENCE_LANDMARKS[0].1.round() as u32,
        );
        let brightest = (ry - 1..=ry + 1)
            .flat_map(|y| (rx - 1..=rx + 1).map(move |x| (x, y)))
            .map(|(x, y)| aligned.get_pixel(x, y)[0])
            .max()
            .unwrap();
        assert!(brightest > 100, "left eye not found near ({rx}, {ry}): {brightest}");
    }
}
