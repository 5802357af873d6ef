use thiserror::Error;

/// Errors that can escape the crate's setup path.
///
/// Per the dispatch design, nothing past setup is allowed to propagate an
/// error: a bad rule line, a failed `mknod`, or a missing firmware file is
/// logged and skipped. This type exists only for the handful of calls that
/// happen before the event loop starts (or outside of it, like a CLI-driven
/// rule reload).
#[derive(Debug, Error)]
pub enum DeviceManagerError {
    #[error("failed to open uevent socket: {0}")]
    SocketSetup(#[source] nix::Error),

    #[error("failed to register uevent socket with the poller: {0}")]
    PollSetup(#[source] std::io::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
