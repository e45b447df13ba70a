/// One chunk-boundary update from a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes persisted to the destination so far, including any resumed prefix.
    pub received: u64,

    /// Total size declared by the server, if any.
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn new(received: u64, total: Option<u64>) -> Self { Self { received, total } }
}

/// Verdict returned by a progress observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop the transfer now; the transport reports [`crate::FetchError::Aborted`].
    Abort,
}

impl Flow {
    pub fn is_abort(self) -> bool { self == Flow::Abort }
}

/// Progress observer handed to a transport for the duration of one call.
pub type ProgressFn<'a> = &'a (dyn Fn(TransferProgress) -> Flow + Send + Sync);
