use crate::domain::Element;
use crate::interface_adapters::protocol::{
    ClientMessage, ServerMessage, encode_message, history_dto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_participant_id;
use crate::use_cases::{Intent, ParticipantId, RoomBroadcast, RoomError, RoomHandle, RoomRegistry};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    #[allow(dead_code)]
    Room(RoomError),
    JoinTimeout,
    JoinRejected,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

impl From<RoomError> for NetError {
    fn from(e: RoomError) -> Self {
        NetError::Room(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_MESSAGES: u32 = 20;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_ROOM_ID_LEN: usize = 128;
const MAX_TEXT_LEN: usize = 4096;
const MAX_STROKE_POINTS: usize = 10_000;

/// Where a connection is in its lifecycle. A connection joins exactly one room.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnState {
    Disconnected,
    Joined { room_id: Arc<str> },
}

#[derive(Debug, PartialEq)]
enum Route {
    Join(String),
    Forward(Intent),
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotJoined,
    DuplicateJoin,
    WrongRoom,
    InvalidRoomId,
    InvalidInput,
}

impl Rejection {
    // Protocol misuse counts toward the invalid-message limit; stale room ids do not.
    fn counts_as_invalid(self) -> bool {
        matches!(
            self,
            Rejection::NotJoined | Rejection::InvalidRoomId | Rejection::InvalidInput
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Rejection::NotJoined => "intent before join",
            Rejection::DuplicateJoin => "duplicate join ignored",
            Rejection::WrongRoom => "intent for another room",
            Rejection::InvalidRoomId => "invalid room id",
            Rejection::InvalidInput => "invalid element input",
        }
    }
}

/// Decides what a parsed client message means for a connection in `state`.
fn route(state: &ConnState, msg: ClientMessage) -> Route {
    let Some(room) = sanitize_room_id(msg.room()).map(str::to_string) else {
        return Route::Reject(Rejection::InvalidRoomId);
    };

    match (state, msg) {
        (ConnState::Disconnected, ClientMessage::JoinRoom(_)) => Route::Join(room),
        (ConnState::Joined { .. }, ClientMessage::JoinRoom(_)) => {
            Route::Reject(Rejection::DuplicateJoin)
        }
        (ConnState::Disconnected, _) => Route::Reject(Rejection::NotJoined),
        (ConnState::Joined { room_id }, _) if room_id.as_ref() != room => {
            Route::Reject(Rejection::WrongRoom)
        }
        (ConnState::Joined { .. }, msg) => match to_intent(msg) {
            Some(intent) => Route::Forward(intent),
            None => Route::Reject(Rejection::InvalidInput),
        },
    }
}

fn sanitize_room_id(raw: &str) -> Option<&str> {
    let room = raw.trim();
    if room.is_empty() || room.chars().count() > MAX_ROOM_ID_LEN {
        return None;
    }
    Some(room)
}

fn to_intent(msg: ClientMessage) -> Option<Intent> {
    match msg {
        ClientMessage::DrawLine(payload) => {
            sanitize_element(payload.data.into()).map(Intent::DrawLive)
        }
        ClientMessage::EndStroke(payload) => {
            sanitize_element(payload.data.into()).map(Intent::Finalize)
        }
        ClientMessage::Undo(_) => Some(Intent::Undo),
        ClientMessage::Clear(_) => Some(Intent::Clear),
        ClientMessage::EditLine(payload) => {
            (payload.new_text.len() <= MAX_TEXT_LEN).then_some(Intent::EditText {
                id: payload.id,
                text: payload.new_text,
            })
        }
        ClientMessage::MoveElement(payload) => {
            let finite = payload.x.is_finite() && payload.y.is_finite();
            finite.then_some(Intent::Move {
                id: payload.id,
                x: payload.x,
                y: payload.y,
            })
        }
        // Joins are routed before intents are built.
        ClientMessage::JoinRoom(_) => None,
    }
}

fn sanitize_element(element: Element) -> Option<Element> {
    if !element.is_finite() {
        return None;
    }

    let within_limits = match &element {
        Element::Stroke(stroke) => stroke.points.len() <= MAX_STROKE_POINTS,
        Element::Text(label) => label.text.len() <= MAX_TEXT_LEN,
        Element::Sticky(note) => note.text.len() <= MAX_TEXT_LEN,
    };
    within_limits.then_some(element)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let room_registry = state.room_registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, room_registry))
}

async fn handle_socket(socket: WebSocket, room_registry: Arc<RoomRegistry>) {
    // Participant ids are per connection; reconnecting yields a new participant.
    let participant_id = next_participant_id();
    let span = info_span!("conn", conn_id = participant_id, room_id = tracing::field::Empty);
    serve_connection(socket, participant_id, room_registry)
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut socket: WebSocket,
    participant_id: ParticipantId,
    room_registry: Arc<RoomRegistry>,
) {
    let mut ctx = match bootstrap_connection(&mut socket, participant_id, room_registry).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join");
            return;
        }
        Err(NetError::JoinTimeout) | Err(NetError::JoinRejected) => {
            debug!("join handshake rejected");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::ERROR, "join failed").await;
            return;
        }
    };

    Span::current().record("room_id", ctx.room_id.as_ref());
    info!(participant_id, room_id = %ctx.room_id, "client joined room");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let bytes = encode_message(msg).map_err(NetError::Serialization)?;
    let len = bytes.len();
    socket.send(Message::Text(bytes)).await?;
    Ok(len)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await?;
    socket.close().await.map_err(NetError::Ws)
}

#[derive(Debug, Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid: u32,
    resyncs: u64,
}

struct ConnCtx {
    participant_id: ParticipantId,
    room_id: Arc<str>,
    state: ConnState,
    room: RoomHandle,
    room_registry: Arc<RoomRegistry>,
    updates_rx: broadcast::Receiver<RoomBroadcast>,
    stats: ConnStats,

    last_invalid_log: Instant,
    last_room_log: Instant,
    last_lag_log: Instant,

    close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    participant_id: ParticipantId,
    room_registry: Arc<RoomRegistry>,
) -> Result<ConnCtx, NetError> {
    let mut stats = ConnStats::default();
    let mut last_invalid_log = Instant::now() - LOG_THROTTLE;

    let room_id = match timeout(
        JOIN_HANDSHAKE_TIMEOUT,
        read_join_handshake(socket, participant_id, &mut stats, &mut last_invalid_log),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    let room = room_registry.join(&room_id, participant_id).await;
    // The room task subscribes us and snapshots in one step, so nothing slips between them.
    let ack = match room.join(participant_id).await {
        Ok(ack) => ack,
        Err(e) => {
            room_registry.leave(&room_id, participant_id).await;
            return Err(e.into());
        }
    };

    let history = ServerMessage::LoadHistory(history_dto(&ack.snapshot));
    match send_message(socket, &history).await {
        Ok(len) => {
            stats.msgs_out += 1;
            stats.bytes_out += len as u64;
        }
        Err(e) => {
            room_registry.leave(&room_id, participant_id).await;
            return Err(e);
        }
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        participant_id,
        room_id: room.room_id.clone(),
        state: ConnState::Joined {
            room_id: room.room_id.clone(),
        },
        room,
        room_registry,
        updates_rx: ack.updates_rx,
        stats,

        last_invalid_log,
        last_room_log: now,
        last_lag_log: now,

        close_frame: None,
    })
}

// Reads frames until a valid join arrives. Anything else is rejected and counted.
async fn read_join_handshake(
    socket: &mut WebSocket,
    participant_id: ParticipantId,
    stats: &mut ConnStats,
    last_invalid_log: &mut Instant,
) -> Result<String, NetError> {
    let state = ConnState::Disconnected;

    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        match incoming? {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                let rejection = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => match route(&state, msg) {
                        Route::Join(room_id) => return Ok(room_id),
                        Route::Reject(rejection) => rejection,
                        // Unreachable while disconnected.
                        Route::Forward(_) => Rejection::NotJoined,
                    },
                    Err(_) => Rejection::InvalidInput,
                };

                stats.invalid += 1;
                if should_log(last_invalid_log) {
                    warn!(
                        participant_id,
                        reason = rejection.as_str(),
                        "message rejected before join"
                    );
                }
                if stats.invalid > MAX_INVALID_MESSAGES {
                    let _ = send_close_with_reason(
                        socket,
                        close_code::POLICY,
                        "too many invalid messages",
                    )
                    .await;
                    return Err(NetError::JoinRejected);
                }
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRejected);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

enum Wake {
    Socket(Option<Result<Message, Error>>),
    Room(Result<RoomBroadcast, broadcast::error::RecvError>),
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let wake = tokio::select! {
            incoming = socket.recv() => Wake::Socket(incoming),
            update = ctx.updates_rx.recv() => Wake::Room(update),
        };

        let control = match wake {
            Wake::Socket(incoming) => handle_incoming_ws(incoming, ctx).await,
            Wake::Room(update) => handle_room_update(update, socket, ctx).await,
        };

        let disconnect = match control {
            Ok(LoopControl::Continue) => false,
            Ok(LoopControl::Disconnect) => true,
            Err(e) => {
                fatal = Some(e);
                true
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    disconnect_cleanup(ctx).await;

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let participant_id = ctx.participant_id;

    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.stats.msgs_in += 1;
                ctx.stats.bytes_in += text.len() as u64;

                let msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => msg,
                    Err(parse_err) => {
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(
                                participant_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }
                        return Ok(count_invalid(ctx));
                    }
                };

                match route(&ctx.state, msg) {
                    Route::Forward(intent) => {
                        ctx.room.submit(participant_id, intent).await?;
                        Ok(LoopControl::Continue)
                    }
                    Route::Reject(rejection) if rejection.counts_as_invalid() => {
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(participant_id, reason = rejection.as_str(), "message rejected");
                        }
                        Ok(count_invalid(ctx))
                    }
                    Route::Reject(rejection) => {
                        if should_log(&mut ctx.last_room_log) {
                            warn!(participant_id, reason = rejection.as_str(), "message ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    // Joined connections never route to a join.
                    Route::Join(_) => Ok(LoopControl::Continue),
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(participant_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(participant_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn count_invalid(ctx: &mut ConnCtx) -> LoopControl {
    ctx.stats.invalid += 1;
    if ctx.stats.invalid > MAX_INVALID_MESSAGES {
        ctx.close_frame = Some(CloseFrame {
            code: close_code::POLICY,
            reason: "too many invalid messages".into(),
        });
        return LoopControl::Disconnect;
    }
    LoopControl::Continue
}

async fn handle_room_update(
    update: Result<RoomBroadcast, broadcast::error::RecvError>,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match update {
        Ok(update) => {
            if !update.audience.includes(ctx.participant_id) {
                return Ok(LoopControl::Continue);
            }
            Ok(forward_room_bytes(update.bytes, socket, &mut ctx.stats).await)
        }
        Err(broadcast::error::RecvError::Lagged(missed)) => {
            if should_log(&mut ctx.last_lag_log) {
                warn!(
                    participant_id = ctx.participant_id,
                    missed,
                    "room updates lagged; sending snapshot"
                );
            }

            // The old receiver still buffers stale updates; replace it with one that
            // starts exactly at the snapshot.
            let ack = ctx.room.resync(ctx.participant_id).await?;
            ctx.updates_rx = ack.updates_rx;
            let bytes = encode_message(&ServerMessage::LoadHistory(history_dto(&ack.snapshot)))
                .map_err(NetError::Serialization)?;
            ctx.stats.resyncs += 1;
            Ok(forward_room_bytes(bytes, socket, &mut ctx.stats).await)
        }
        Err(broadcast::error::RecvError::Closed) => {
            Err(NetError::Room(RoomError::Closed(ctx.room_id.clone())))
        }
    }
}

async fn forward_room_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    stats: &mut ConnStats,
) -> LoopControl {
    let len = bytes.len();
    match socket.send(Message::Text(bytes)).await {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send room update");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &mut ConnCtx) {
    // History is kept; only membership changes.
    ctx.room_registry.leave(&ctx.room_id, ctx.participant_id).await;
    ctx.state = ConnState::Disconnected;

    let ConnStats {
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid,
        resyncs,
    } = ctx.stats;
    debug!(
        participant_id = ctx.participant_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid,
        resyncs,
        "connection stats"
    );
    info!(participant_id = ctx.participant_id, "client disconnected");
}
