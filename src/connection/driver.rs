//! Driver task: owns the transport session and runs the reconnect policy

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Shared;
use crate::transport::{Transport, TransportSession};
use crate::types::ConnectionState;

/// Why a session pump returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The peer closed the session (or it failed); reconnect.
    Closed,
    /// `close()` or a newer `connect()` cancelled this driver.
    Cancelled,
}

/// Run one connection until cancelled.
///
/// The caller has already moved the state to `Connecting`. Every close that the
/// driver did not cause leads to exactly one retry after the fixed delay. Retries
/// never stop on their own; only cancellation ends the loop.
pub(crate) async fn run<T: Transport>(shared: Arc<Shared<T>>, cancel: CancellationToken) {
    let endpoint = shared.transport().endpoint().to_owned();
    let delay = shared.reconnect_delay();
    info!(%endpoint, "Connection driver started");

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = shared.transport().open() => opened,
        };

        match opened {
            Ok(session) => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if !shared.mark_open(&cancel, outbound_tx) {
                    close_session(session).await;
                    break;
                }
                info!(%endpoint, "Connection open");

                if pump(&shared, &cancel, session, outbound_rx).await == SessionEnd::Cancelled {
                    break;
                }
                info!(%endpoint, "Connection closed by peer");
            }
            Err(e) => {
                // A failed open is an error followed by a close.
                error!(%endpoint, error = %e, "Failed to open connection");
            }
        }

        if !shared.transition(&cancel, ConnectionState::Reconnecting) {
            break;
        }
        info!(%endpoint, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let attempt = shared.record_reconnect_attempt();
        if !shared.transition(&cancel, ConnectionState::Connecting) {
            break;
        }
        info!(%endpoint, attempt, "Reconnecting");
    }

    info!(%endpoint, "Connection driver stopped");
}

/// Read inbound messages and write queued outbound ones until the session ends.
///
/// Each envelope is fully delivered to every listener before the next read.
async fn pump<T: Transport>(
    shared: &Shared<T>,
    cancel: &CancellationToken,
    mut session: T::Session,
    mut outbound: mpsc::UnboundedReceiver<String>,
) -> SessionEnd {
    let mut received = 0u64;

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            Some(text) = outbound.recv() => {
                match session.send_text(text).await {
                    Ok(()) => shared.record_sent(),
                    Err(e) => {
                        shared.record_dropped();
                        error!(error = %e, "Failed to send outbound message");
                    }
                }
            }
            message = session.next_message() => match message {
                Ok(Some(message)) => {
                    received += 1;
                    shared.dispatch(&message);
                }
                Ok(None) => break SessionEnd::Closed,
                Err(e) => {
                    // Errors alone never reconnect; the following close does.
                    error!(error = %e, "Transport error");
                }
            },
        }
    };

    debug!(received, ?end, "Session ended");

    // Whatever is still queued was accepted by send_message but never written.
    outbound.close();
    while outbound.try_recv().is_ok() {
        shared.record_dropped();
        warn!("Dropping outbound message queued on a closed session");
    }

    close_session(session).await;
    end
}

async fn close_session<S: TransportSession>(mut session: S) {
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error while closing session");
    }
}
