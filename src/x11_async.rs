//! X11 Readiness Stream
//!
//! Wakes the async main loop when the X connection has data, using mio in a
//! background thread to poll the connection's file descriptor.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{oneshot, Notify};
use x11rb::rust_connection::RustConnection;

/// Notifies the main loop when the X socket becomes readable.  Dropping the
/// stream stops the polling thread.
pub struct X11EventStream {
    notify: Arc<Notify>,
    _task_guard: oneshot::Receiver<()>,
}

impl X11EventStream {
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        let (guard, task_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);
        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register X11 FD with mio")?;

        let timeout = Duration::from_millis(100);
        tokio::task::spawn_blocking(move || {
            // Keeps the connection, and so the fd, alive while polling.
            let _conn = conn;
            loop {
                if guard.is_closed() {
                    tracing::debug!("X11 socket polling thread shutting down");
                    return;
                }
                if let Err(err) = poll.poll(&mut events, Some(timeout)) {
                    tracing::warn!("X11 socket poll failed: {:?}", err);
                    continue;
                }
                if events.iter().any(|event| event.token() == mio::Token(0)) {
                    task_notify.notify_one();
                }
            }
        });

        Ok(Self { notify, _task_guard: task_guard })
    }

    /// Resolves once the socket has been readable since the last call.
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }
}
