//! Replication slave: a persistent connection to the master, pulling one
//! segment per tick and pushing its decoded records onto the storage
//! façade's replication stream.

use crate::framing::read_message;
use crate::ServerError;
use bytes::BytesMut;
use shardkv_protocol::{MasterResponse, SlaveRequest};
use shardkv_wal::{decode_all, segment_last, write_segment, Request};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

/// Runs the sync loop until `shutdown` fires. `stream_out` is never closed
/// by this loop (see design notes): the storage façade's consumer must
/// exit via the same `shutdown` signal, not by observing channel closure.
pub async fn run(
    master_address: String,
    local_dir: PathBuf,
    sync_interval: Duration,
    stream_out: mpsc::UnboundedSender<Vec<Request>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let span = tracing::info_span!("replication_slave", master = %master_address);
    let _enter = span.enter();

    let mut connection = None;
    let mut ticker = tokio::time::interval(sync_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.is_none() {
                    match TcpStream::connect(&master_address).await {
                        Ok(stream) => connection = Some(stream),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to connect to master");
                            continue;
                        }
                    }
                }
                let Some(stream) = connection.as_mut() else { continue };
                if let Err(err) = sync_once(stream, &local_dir, &stream_out).await {
                    tracing::warn!(error = %err, "sync tick failed");
                    connection = None;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("shutting down replication slave");
                    return;
                }
            }
        }
    }
}

async fn sync_once(
    stream: &mut TcpStream,
    local_dir: &std::path::Path,
    stream_out: &mpsc::UnboundedSender<Vec<Request>>,
) -> Result<(), ServerError> {
    let last_name = match segment_last(local_dir) {
        Ok(name) => name,
        Err(_) => String::new(),
    };

    stream
        .write_all(&SlaveRequest::new(last_name).encode())
        .await?;

    let mut acc = BytesMut::new();
    let response = read_message(stream, &mut acc, MasterResponse::decode).await?;
    let Some(response) = response else {
        return Err(ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "master closed connection",
        )));
    };

    if !response.succeed {
        return Ok(());
    }
    if response.segment_name.is_empty() {
        return Ok(());
    }

    write_segment(local_dir, &response.segment_name, &response.segment_data)?;

    if !response.segment_data.is_empty() {
        let records = decode_all(&response.segment_data)?;
        if !records.is_empty() {
            let _ = stream_out.send(records);
        }
    }

    Ok(())
}
