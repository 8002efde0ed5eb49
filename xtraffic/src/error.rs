//! Error types of the pipeline.

use thiserror::Error;

use crate::track::TrackKey;

/// Errors raised while recomputing or maintaining a track.
///
/// None of these leave the registry: an error from a recompute marks the
/// track invalid and the next maintenance sweep removes it.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The track was invalidated earlier and awaits removal.
    #[error("track {0} is invalid")]
    Invalid(TrackKey),

    /// The position buffer violates its time ordering.
    #[error("track {key}: position buffer not sorted at ts {ts:.1}")]
    Unsorted { key: TrackKey, ts: f64 },

    /// No sensible continuation exists after a rejected position while an
    /// instance is already rendering the track.
    #[error("track {key}: no valid continuation after ts {ts:.1}")]
    NoContinuation { key: TrackKey, ts: f64 },

    /// The instance factory refused to create an instance.
    #[error("track {key}: instance creation failed: {source}")]
    Instance {
        key: TrackKey,
        #[source]
        source: AirframeError,
    },
}

/// Errors returned by an [`AirframeFactory`](crate::collaborators::AirframeFactory).
#[derive(Debug, Error)]
pub enum AirframeError {
    /// The seed positions do not allow an instance.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// The renderer rejected the request.
    #[error("renderer error: {0}")]
    Renderer(String),
}
