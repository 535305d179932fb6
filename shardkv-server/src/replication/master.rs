//! Replication master: an embedded TCP server answering "what segment comes
//! after the one you've got" queries from slaves.

use crate::framing::read_message;
use crate::ServerError;
use bytes::BytesMut;
use shardkv_protocol::{MasterResponse, SlaveRequest};
use shardkv_wal::{read_segment, segment_next};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Runs the master's accept loop until `shutdown` fires.
pub async fn run(
    listener: TcpListener,
    data_directory: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let span = tracing::info_span!("replication_master", addr = %listener.local_addr()?);
    let _enter = span.enter();
    tracing::info!("serving replicas");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let dir = data_directory.clone();
                        tokio::spawn(async move {
                            let span = tracing::info_span!("replication_master_handler", %addr);
                            let _enter = span.enter();
                            if let Err(err) = handle_slave(stream, &dir).await {
                                tracing::debug!(error = %err, "replica connection ended");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "master accept error"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("shutting down replication master");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_slave(mut stream: tokio::net::TcpStream, dir: &Path) -> Result<(), ServerError> {
    let mut acc = BytesMut::new();
    loop {
        let request = match read_message(&mut stream, &mut acc, SlaveRequest::decode).await? {
            Some(request) => request,
            None => return Ok(()),
        };

        let response = build_response(dir, &request.last_segment_name);
        stream.write_all(&response.encode()).await?;
    }
}

fn build_response(dir: &Path, last_segment_name: &str) -> MasterResponse {
    match segment_next(dir, last_segment_name) {
        Ok(Some(next)) => match read_segment(dir, &next) {
            Ok(data) => MasterResponse::next_segment(next, data),
            Err(err) => {
                tracing::warn!(segment = %next, error = %err, "failed to read segment");
                MasterResponse::failed()
            }
        },
        Ok(None) => MasterResponse::caught_up(),
        Err(err) => {
            tracing::warn!(error = %err, "segmentNext failed");
            MasterResponse::failed()
        }
    }
}
