//! Identity matching with a one-claim-per-identity rule.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{DetectedFace, MatchResult, RegisteredIdentity};

/// Default acceptance threshold on Euclidean descriptor distance.
pub const DEFAULT_MAX_DISTANCE: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchingError {
    #[error("face {face_index} has an empty descriptor")]
    EmptyDescriptor { face_index: usize },
    #[error("face {face_index} has a non-finite descriptor value")]
    NonFiniteFace { face_index: usize },
    #[error("identity {identity_id} has a non-finite descriptor value")]
    NonFiniteIdentity { identity_id: String },
    #[error(
        "descriptor length mismatch: face {face_index} has {face_len} values, \
         identity {identity_id} has {identity_len}"
    )]
    DimensionMismatch {
        face_index: usize,
        face_len: usize,
        identity_id: String,
        identity_len: usize,
    },
}

/// Closest identity for one face.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BestMatch {
    identity_idx: usize,
    distance: f32,
}

/// Assigns faces to the closest registered identity under a distance threshold.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMatcher {
    pub max_distance: f32,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl IdentityMatcher {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }

    /// Match de-duplicated faces of one image against the registry.
    ///
    /// Faces are visited in input order and claim identities first come,
    /// first served. A face whose closest identity is already claimed is
    /// reported unmatched; it does not fall back to the next-closest identity.
    /// The distance to the closest identity is reported either way.
    pub fn match_faces(
        &self,
        faces: &[DetectedFace],
        identities: &[RegisteredIdentity],
        image_url: &str,
    ) -> Result<Vec<MatchResult>, MatchingError> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut results = Vec::with_capacity(faces.len());

        for (face_index, face) in faces.iter().enumerate() {
            let best = best_match(face_index, face, identities)?;

            let identity_id = match best {
                Some(b) if b.distance <= self.max_distance => {
                    let id = identities[b.identity_idx].identity_id.as_str();
                    if claimed.insert(id) {
                        Some(id.to_string())
                    } else {
                        tracing::debug!(
                            face_index,
                            identity = id,
                            distance = b.distance,
                            "identity already claimed in this image"
                        );
                        None
                    }
                }
                _ => None,
            };

            results.push(MatchResult {
                face_index,
                identity_id,
                distance: best.map(|b| round3(b.distance)),
                image_url: image_url.to_string(),
            });
        }

        Ok(results)
    }
}

/// Scan every identity and return the closest one, or `None` for an empty registry.
fn best_match(
    face_index: usize,
    face: &DetectedFace,
    identities: &[RegisteredIdentity],
) -> Result<Option<BestMatch>, MatchingError> {
    if face.descriptor.is_empty() {
        return Err(MatchingError::EmptyDescriptor { face_index });
    }
    if !face.descriptor.is_finite() {
        return Err(MatchingError::NonFiniteFace { face_index });
    }

    let mut best: Option<BestMatch> = None;
    for (i, identity) in identities.iter().enumerate() {
        if identity.descriptor.len() != face.descriptor.len() {
            return Err(MatchingError::DimensionMismatch {
                face_index,
                face_len: face.descriptor.len(),
                identity_id: identity.identity_id.clone(),
                identity_len: identity.descriptor.len(),
            });
        }
        // NaN never compares less, so it would pin the scan to this identity.
        if !identity.descriptor.is_finite() {
            return Err(MatchingError::NonFiniteIdentity {
                identity_id: identity.identity_id.clone(),
            });
        }

        let distance = face.descriptor.euclidean_distance(&identity.descriptor);
        // Strict comparison: the earlier identity wins a tie.
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(BestMatch {
                identity_idx: i,
                distance,
            });
        }
    }
    Ok(best)
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}
