//! Per-connection handler: request dispatch and event push.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler, plus a writer task draining that connection's event
//! channel. The flow is:
//!
//!   1. Register the connection and its event channel with the
//!      coordinator.
//!   2. Loop: receive a [`Request`], dispatch its [`Op`], send the
//!      correlated [`Frame::Reply`]. Declines become replies, never
//!      connection errors.
//!   3. On any exit, tell the coordinator the connection is gone — the
//!      seat survives and the reconnect grace period starts.

use std::sync::Arc;

use gambit_protocol::{Codec, Frame, Op, Reply, Request};
use gambit_session::Decline;
use gambit_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::GambitError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), GambitError>
where
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    state.coordinator.on_connected(conn_id, events_tx);

    // Writer task: pushes session events independently of the request
    // loop, so a push never waits for a request in flight. It ends when
    // the coordinator drops the channel sender on disconnect.
    let writer = tokio::spawn(push_events(
        Arc::clone(&conn),
        state.codec.clone(),
        events_rx,
    ));

    let result = serve(&conn, &state, conn_id).await;

    // The seat is kept; the sweeper takes it from here.
    state.coordinator.on_connection_lost(conn_id).await;
    writer.abort();
    result
}

/// Request loop: one reply per request, in order, on this connection.
async fn serve<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    conn_id: ConnectionId,
) -> Result<(), GambitError> {
    loop {
        let text = match conn.recv().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let request: Request = match state.codec.decode(&text) {
            Ok(request) => request,
            Err(e) => {
                // No correlation id recoverable from a frame that
                // didn't parse; id 0 marks an uncorrelated fault.
                tracing::debug!(%conn_id, error = %e, "failed to decode request");
                let frame = Frame::Reply {
                    id: 0,
                    reply: Reply::Fault {
                        message: format!("malformed request: {e}"),
                    },
                };
                send_frame(conn, &state.codec, &frame).await?;
                continue;
            }
        };

        let reply = dispatch(state, conn_id, request.op).await;
        let frame = Frame::Reply {
            id: request.id,
            reply,
        };
        send_frame(conn, &state.codec, &frame).await?;
    }
    Ok(())
}

/// Routes one operation to the coordinator and shapes the outcome into
/// a [`Reply`]. Declined operations map onto `Reply::Declined`.
async fn dispatch<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId, op: Op) -> Reply {
    let coordinator = &state.coordinator;
    let result: Result<Reply, Decline> = match op {
        Op::CreateSession {
            name,
            private,
            display_name,
            logical_id,
        } => {
            let created = coordinator
                .create_session(conn_id, name, private, display_name, logical_id)
                .await;
            Ok(Reply::SessionCreated {
                session_id: created.session_id,
                invite_code: created.invite_code,
                snapshot: created.snapshot,
            })
        }

        Op::EnsureJoined {
            session_id,
            display_name,
            logical_id,
        } => coordinator
            .ensure_joined(conn_id, session_id, display_name, logical_id)
            .await
            .map(|snapshot| Reply::Joined { snapshot }),

        Op::JoinByInviteCode {
            code,
            display_name,
            logical_id,
        } => coordinator
            .join_by_invite_code(conn_id, code, display_name, logical_id)
            .await
            .map(|snapshot| Reply::Joined { snapshot }),

        Op::SubmitMove {
            session_id,
            from,
            to,
            promotion,
            position_after,
        } => coordinator
            .submit_move(conn_id, session_id, from, to, promotion, position_after)
            .await
            .map(|outcome| Reply::MoveAccepted {
                move_number: outcome.move_number,
                next_turn: outcome.next_turn,
                position_state: outcome.position_state,
                clock: outcome.clock,
            }),

        Op::SendMessage { session_id, text } => coordinator
            .send_message(conn_id, session_id, text)
            .await
            .map(|()| Reply::MessageSent),

        Op::GetStatus { session_id } => coordinator
            .get_status(conn_id, session_id)
            .await
            .map(|snapshot| Reply::Status { snapshot }),

        Op::OfferDraw { session_id } => coordinator
            .offer_draw(conn_id, session_id)
            .await
            .map(|()| Reply::DrawOfferSent),

        Op::Resign { session_id } => coordinator
            .resign(conn_id, session_id)
            .await
            .map(|winner| Reply::Resigned { winner }),

        Op::ListSessions => Ok(Reply::SessionList {
            sessions: coordinator.list_sessions().await,
        }),
    };

    match result {
        Ok(reply) => reply,
        Err(decline) => Reply::Declined {
            reason: decline.reason(),
            message: decline.to_string(),
        },
    }
}

/// Drains the connection's event channel onto the wire.
async fn push_events<C: Codec>(
    conn: Arc<WebSocketConnection>,
    codec: C,
    mut events: mpsc::UnboundedReceiver<gambit_protocol::SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        let frame = Frame::Event { event };
        let text = match codec.encode(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                continue;
            }
        };
        if conn.send(&text).await.is_err() {
            break;
        }
    }
}

async fn send_frame<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    frame: &Frame,
) -> Result<(), GambitError> {
    let text = codec.encode(frame)?;
    conn.send(&text).await.map_err(GambitError::Transport)?;
    Ok(())
}
