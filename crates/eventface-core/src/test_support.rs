//! Scripted fetcher/detector doubles shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::detector::{DetectionError, FaceDetector};
use crate::fetcher::{DownloadError, ImageFetcher};
use crate::types::{BoundingBox, Descriptor, DetectedFace};

pub fn face(x: f32, confidence: f32, descriptor: Vec<f32>) -> DetectedFace {
    DetectedFace {
        bounding_box: BoundingBox::new(x, 10.0, 50.0, 50.0),
        confidence,
        descriptor: Descriptor::new(descriptor),
        landmarks: None,
    }
}

pub fn download_error(url: &str) -> DownloadError {
    DownloadError {
        url: url.to_string(),
        attempts: 3,
        message: "unexpected HTTP status 404".into(),
    }
}

/// Serves each URL's bytes as the URL itself, unless told to fail it.
#[derive(Default)]
pub struct ScriptedFetcher {
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn delayed(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ImageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|u| u == url) {
            return Err(download_error(url));
        }
        Ok(url.as_bytes().to_vec())
    }
}

/// Looks up detections by the image bytes (which `ScriptedFetcher` sets to the URL).
#[derive(Default)]
pub struct ScriptedDetector {
    results: HashMap<Vec<u8>, Result<Vec<DetectedFace>, DetectionError>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, url: &str, faces: Vec<DetectedFace>) -> Self {
        self.results.insert(url.as_bytes().to_vec(), Ok(faces));
        self
    }

    pub fn with_error(mut self, url: &str, err: DetectionError) -> Self {
        self.results.insert(url.as_bytes().to_vec(), Err(err));
        self
    }
}

impl FaceDetector for ScriptedDetector {
    async fn detect(&self, image: Vec<u8>) -> Result<Vec<DetectedFace>, DetectionError> {
        self.results.get(&image).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}
