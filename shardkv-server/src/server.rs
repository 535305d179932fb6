//! TCP server: accept loop, bounded concurrency, per-connection framing.

use crate::semaphore::ConnectionSemaphore;
use crate::{handler, ServerError};
use shardkv_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Releases one semaphore slot when the connection task ends, however it ends.
struct SemaphoreGuard(Arc<ConnectionSemaphore>);

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Runs the accept loop until `shutdown` fires. Does not wait for in-flight
/// connections to finish; each closes itself on idle timeout or client
/// hangup.
pub async fn run(
    listener: TcpListener,
    storage: Arc<Storage>,
    semaphore: Arc<ConnectionSemaphore>,
    max_message_size: usize,
    idle_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let span = tracing::info_span!("accept_loop", addr = %listener.local_addr()?);
    let _enter = span.enter();
    tracing::info!("listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let sem = semaphore.clone();
                        tokio::task::spawn_blocking(move || sem.acquire())
                            .await
                            .expect("semaphore acquire task panicked");

                        let storage = storage.clone();
                        let guard_sem = semaphore.clone();
                        let handle = tokio::spawn(async move {
                            let _guard = SemaphoreGuard(guard_sem);
                            let span = tracing::info_span!("connection", %addr);
                            let _enter = span.enter();
                            if let Err(err) =
                                handle_connection(stream, storage, max_message_size, idle_timeout).await
                            {
                                tracing::debug!(error = %err, "connection ended with error");
                            }
                        });
                        // Awaited in its own task so the accept loop never
                        // blocks on a connection; this is only here to
                        // observe and log a panic, which the semaphore
                        // guard's Drop already releases regardless.
                        tokio::spawn(async move {
                            if let Err(err) = handle.await {
                                if err.is_panic() {
                                    tracing::error!(%addr, error = %err, "connection handler panicked");
                                }
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("shutting down accept loop");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    storage: Arc<Storage>,
    max_message_size: usize,
    idle_timeout: Duration,
) -> Result<(), ServerError> {
    let mut buf = vec![0u8; max_message_size];

    loop {
        let read = if idle_timeout.is_zero() {
            stream.read(&mut buf).await
        } else {
            match tokio::time::timeout(idle_timeout, stream.read(&mut buf)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!("idle timeout");
                    return Ok(());
                }
            }
        };

        let cnt = match read {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) => return Err(ServerError::Io(err)),
        };

        // Reproduced as specified (§4.J / §9 point 4): a request that
        // exactly fills the buffer is treated the same as overflow and the
        // connection is dropped, even though the bytes read may have been
        // a complete, valid request.
        if cnt >= max_message_size {
            tracing::warn!("too small buffer size");
            return Ok(());
        }

        let request_text = String::from_utf8_lossy(&buf[..cnt]);
        let reply = handler::handle(&storage, request_text.trim_end_matches(['\n', '\r'])).await;
        stream.write_all(reply.as_bytes()).await?;
    }
}
