//! Touch input: normalization and palm rejection.
//!
//! Platform batches are turned into uniform [`RawEvent`]s by the [`Normalizer`],
//! then the [`ContactClassifier`] decides per contact whether it is a pen tip
//! (forwarded to the stroke builder) or a resting hand (discarded).

pub mod classifier;
pub mod events;
pub mod normalize;

pub use classifier::{ContactClassifier, ContactState, Thresholds};
pub use events::{
    ContactId, HistoricalSample, NormalizedBatch, PlatformAction, PlatformBatch, PlatformEvent,
    RawEvent, ToolHint, TouchPhase,
};
pub use normalize::Normalizer;

use thiserror::Error;

/// Malformed or out-of-sequence input. The offending event is dropped and
/// processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("contact {0} is not active")]
    UnknownContact(ContactId),

    #[error("contact {0} is already down")]
    DuplicateDown(ContactId),

    #[error("contact {contact}: event at {timestamp_ms}ms precedes the last one at {last_ms}ms")]
    OutOfOrder {
        contact: ContactId,
        timestamp_ms: u64,
        last_ms: u64,
    },

    #[error("contact {0} reported a non-finite position")]
    MalformedPosition(ContactId),
}
