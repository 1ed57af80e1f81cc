use thiserror::Error;

///
/// The ways a stream coordination primitive can fail
///
/// Errors local to a single consumer resolve only that consumer's result; errors
/// in the shared coordination state (a channel or hub closed with an error) are
/// reported to every attached and future consumer.
///
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamError {
    /// A bounded buffer received a data signal while already at capacity
    #[error("buffer overflow")]
    BufferOverflow,

    /// A consumer failed to become ready within its time budget
    #[error("iteratee is taking too long")]
    ReadinessTimeout,

    /// The feeding side shut the stream down with an error, or a consumer reported one
    #[error("{0}")]
    Aborted(String),
}
