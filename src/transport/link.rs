//! Link event loop.
//!
//! One task per link owns the decoded inbound stream, the encoded
//! outbound sink and the receiving end of the [`Connection`] command
//! channel. It multiplexes three sources:
//!
//! - Commands queued through the [`Connection`] handle (writes, close)
//! - Decoded inbound units from the peer
//! - Idle deadlines
//!
//! and reports each event to the [`LifecycleController`]. When the loop
//! ends for any reason the sink is closed and teardown runs exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Result;
use crate::lifecycle::{Cause, LifecycleController};
use crate::protocol::{Inbound, Outbound};

use super::idle::{IdleTimeouts, IdleTracker};
use super::{Connection, LinkCommand};

// ============================================================================
// Event Loop
// ============================================================================

/// Registers one link and returns the loop that drives it until it closes.
///
/// Activation happens before this returns, so the link is visible in the
/// registry as soon as it is accepted. The returned future resolves to
/// the teardown result from [`LifecycleController::on_deactivate`].
pub(crate) fn run_link<R, W>(
    connection: Connection,
    mut reader: R,
    mut writer: W,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    controller: Arc<LifecycleController>,
    idle: IdleTimeouts,
) -> impl Future<Output = Result<()>>
where
    R: Stream<Item = Inbound> + Unpin,
    W: Sink<Outbound> + Unpin,
    W::Error: Into<Cause>,
{
    controller.on_activate(&connection);

    async move {
        let mut tracker = IdleTracker::new(idle, Instant::now());

        loop {
            let deadline = tracker.next_deadline();

            tokio::select! {
                biased;

                // Writes and close requests from the handle
                command = commands.recv() => {
                    match command {
                        Some(LinkCommand::Send(packet)) => {
                            if let Err(cause) = write(&mut writer, packet).await {
                                controller.on_failure(&connection, cause);
                            } else {
                                tracker.on_write(Instant::now());
                            }
                        }

                        Some(LinkCommand::SendAndClose(packet)) => {
                            if let Err(cause) = write(&mut writer, packet).await {
                                debug!(
                                    connection_id = %connection.id(),
                                    error = %cause,
                                    "Final write failed"
                                );
                            }
                            break;
                        }

                        Some(LinkCommand::Close) => {
                            trace!(connection_id = %connection.id(), "Close command received");
                            break;
                        }

                        None => {
                            debug!(connection_id = %connection.id(), "Command channel closed");
                            break;
                        }
                    }
                }

                // Decoded traffic from the peer
                inbound = reader.next() => {
                    match inbound {
                        Some(inbound) => {
                            tracker.on_read(Instant::now());
                            controller.on_message(&connection, inbound).await;
                        }

                        None => {
                            debug!(connection_id = %connection.id(), "Peer closed the stream");
                            break;
                        }
                    }
                }

                // Idle thresholds
                () = sleep_until(deadline) => {
                    for kind in tracker.poll_expired(Instant::now()) {
                        controller.on_idle(&connection, kind).await;
                    }
                }
            }
        }

        if let Err(e) = writer.close().await {
            let cause: Cause = e.into();
            trace!(connection_id = %connection.id(), error = %cause, "Sink close failed");
        }

        debug!(connection_id = %connection.id(), "Link loop terminated");
        controller.on_deactivate(&connection)
    }
}

/// Writes and flushes one packet.
async fn write<W>(writer: &mut W, packet: Outbound) -> std::result::Result<(), Cause>
where
    W: Sink<Outbound> + Unpin,
    W::Error: Into<Cause>,
{
    writer.send(packet).await.map_err(Into::into)
}

/// Sleeps until `deadline`, or forever if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
