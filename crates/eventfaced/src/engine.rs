use std::path::Path;

use eventface_core::onnx::OnnxFaceDetector;
use eventface_core::{DetectedFace, DetectionError, FaceDetector};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load models: {0}")]
    Load(#[from] DetectionError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from request handlers to the engine thread.
struct EngineRequest {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<DetectedFace>, DetectionError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl FaceDetector for EngineHandle {
    async fn detect(&self, image: Vec<u8>) -> Result<Vec<DetectedFace>, DetectionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DetectionError::Unavailable)?;
        reply_rx.await.map_err(|_| DetectionError::Unavailable)?
    }

    fn is_ready(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Load both ONNX models and spawn the engine on a dedicated OS thread.
///
/// Fails fast at startup if either model is missing or unloadable.
pub fn spawn_engine(model_dir: &Path, min_confidence: f32) -> Result<EngineHandle, EngineError> {
    let mut detector = OnnxFaceDetector::load(model_dir, min_confidence)?;
    tracing::info!(model_dir = %model_dir.display(), min_confidence, "face models loaded");
    spawn_worker(move |image| detector.detect_bytes(image))
}

/// Run `detect` on its own thread, serving requests one at a time.
fn spawn_worker<B>(mut detect: B) -> Result<EngineHandle, EngineError>
where
    B: FnMut(&[u8]) -> Result<Vec<DetectedFace>, DetectionError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("eventface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(EngineRequest { image, reply }) = rx.blocking_recv() {
                let result = detect(&image);
                if let Err(e) = &result {
                    tracing::debug!(error = %e, bytes = image.len(), "detection failed");
                }
                let _ = reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventface_core::{BoundingBox, Descriptor};

    fn one_face(image: &[u8]) -> Result<Vec<DetectedFace>, DetectionError> {
        if image.is_empty() {
            return Err(DetectionError::Decode("empty image".into()));
        }
        Ok(vec![DetectedFace {
            bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
            descriptor: Descriptor::new(vec![image.len() as f32]),
            landmarks: None,
        }])
    }

    #[tokio::test]
    async fn test_worker_serves_requests() {
        let handle = spawn_worker(one_face).unwrap();
        assert!(handle.is_ready());

        let faces = handle.detect(vec![1, 2, 3]).await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].descriptor.values, vec![3.0]);

        let err = handle.detect(vec![]).await.unwrap_err();
        assert_eq!(err, DetectionError::Decode("empty image".into()));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_worker() {
        let handle = spawn_worker(one_face).unwrap();
        let a = handle.clone();
        let b = handle.clone();
        let (ra, rb) = tokio::join!(a.detect(vec![0; 4]), b.detect(vec![0; 7]));
        assert_eq!(ra.unwrap()[0].descriptor.values, vec![4.0]);
        assert_eq!(rb.unwrap()[0].descriptor.values, vec![7.0]);
    }

    #[tokio::test]
    async fn test_closed_engine_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = EngineHandle { tx };
        assert!(!handle.is_ready());
        assert_eq!(handle.detect(vec![1]).await.unwrap_err(), DetectionError::Unavailable);
    }

    #[test]
    fn test_spawn_engine_without_models_fails() {
        let dir = std::env::temp_dir().join("eventfaced-missing-models");
        let err = spawn_engine(&dir, 0.6).err().unwrap();
        assert!(matches!(err, EngineError::Load(DetectionError::ModelNotFound(_))));
    }
}
