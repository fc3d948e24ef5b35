/// Errors surfaced by the text-processing pipeline.
///
/// Every operation is all-or-nothing: on error no partial payload is
/// returned. Retry policy for collaborator failures is left to the caller.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed request input, reported synchronously and never retried.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A token id fell outside the loaded vocabulary range.
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// The rank table could not be loaded or is unusable. Fatal at process
    /// start rather than per-call.
    #[error("encoder unavailable: {reason}")]
    Encode { reason: String },

    /// A failure propagated from an external collaborator (document
    /// extractor, completion provider, embedding provider).
    #[error("collaborator failed: {reason}")]
    Collaborator { reason: String },
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn collaborator(reason: impl Into<String>) -> Self {
        Self::Collaborator {
            reason: reason.into(),
        }
    }
}
