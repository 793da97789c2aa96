/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed (by the peer, or because its writer task
    /// is gone).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A connection's write queue is full; the frame was not queued.
    #[error("write queue full: {0}")]
    QueueFull(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A continuation read of a large frame came back short while more
    /// reads were still expected. The stream can no longer be framed.
    #[error("short continuation read: {received} of {expected} bytes")]
    ShortContinuation { expected: usize, received: usize },

    /// A frame declared a length above the configured maximum.
    #[error("frame of {declared} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { declared: usize, max: usize },
}
