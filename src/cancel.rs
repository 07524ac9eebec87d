//! Cooperative cancellation for a running conversion.
//!
//! The pipeline checks the token between records and between decompression
//! buffers. On cancellation the open chunk is flushed and closed before the
//! run returns, so no file is left half-written.
//!
//! [`CancellationToken`] is `tokio_util`'s token. Checking it with
//! [`is_cancelled`](CancellationToken::is_cancelled) needs no runtime, so
//! the synchronous pipeline polls it directly while async callers can await
//! [`cancelled`](CancellationToken::cancelled).
//!
//! # Example
//!
//! ```rust
//! use logpack::cancel::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let for_worker = token.clone();
//!
//! token.cancel();
//! assert!(for_worker.is_cancelled());
//! ```

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "cli")]
pub use self::signal::cancel_on_shutdown;

#[cfg(feature = "cli")]
mod signal {
    use std::io;

    use tokio::task::JoinHandle;
    use tracing::info;

    use super::CancellationToken;

    /// Cancels `token` on the first SIGINT, SIGTERM or SIGQUIT.
    ///
    /// Handlers are installed before this returns, so a signal sent right
    /// after the call is not missed. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn cancel_on_shutdown(token: CancellationToken) -> io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigquit = signal(SignalKind::quit())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {
                    info!(message = "Signal received.", signal = "SIGINT");
                }
                _ = sigterm.recv() => {
                    info!(message = "Signal received.", signal = "SIGTERM");
                }
                _ = sigquit.recv() => {
                    info!(message = "Signal received.", signal = "SIGQUIT");
                }
                () = token.cancelled() => return,
            }
            token.cancel();
        }))
    }

    /// Cancels `token` on the first Ctrl-C.
    #[cfg(not(unix))]
    pub fn cancel_on_shutdown(token: CancellationToken) -> io::Result<JoinHandle<()>> {
        Ok(tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!(message = "Signal received.", signal = "CTRL_C");
                        token.cancel();
                    }
                }
                () = token.cancelled() => {}
            }
        }))
    }
}
