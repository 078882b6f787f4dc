//! TCP acceptor and per-connection session state machine. Reworked from
//! `quic_gateway.rs`'s accept-loop-spawns-per-connection-task idiom: instead
//! of a QUIC endpoint handing off bidi streams, a `TcpListener` hands off one
//! line-oriented socket per connection, split into a reader task that drives
//! the session's state machine and a writer task drained from its outbound
//! queue, mirroring the stream/datagram task split `handle_connection` joins.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use protocol::{clean_input_line, encode_message, PlayerRoomEvent, ServerMessage, TextMessage};

use crate::dispatch;
use crate::domain::Player;
use crate::engine::Engine;
use crate::event_bus::GameEvent;
use crate::scheduler::Scheduler;

use super::registry::{SessionHandle, SessionPhase};

const MENU_TEXT: &str = "1) login\n2) register\n3) quit\nchoice:";
const MAX_CONSECUTIVE_AUTH_FAILURES: u32 = 3;

pub async fn accept_loop(engine: Arc<Engine>, scheduler: Scheduler, listener: TcpListener) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                log::warn!("TCP accept failed: {err}");
                continue;
            }
        };

        let engine = engine.clone();
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            handle_connection(engine, scheduler, stream, remote_addr).await;
        });
    }
}

async fn handle_connection(engine: Arc<Engine>, scheduler: Scheduler, stream: TcpStream, remote_addr: SocketAddr) {
    log::info!("connection accepted from {remote_addr}");
    stream.set_nodelay(true).ok();
    let (read_half, mut write_half) = stream.into_split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let session_id = Uuid::new_v4().to_string();
    let session = engine.sessions.register(session_id.clone(), remote_addr, outbound_tx);
    send_system(&session, "welcome. press enter to continue.");

    let idle_timeout = engine.config.idle_timeout();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read_result = timeout(idle_timeout, reader.read_until(b'\n', &mut buf)).await;
        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                log::debug!("read error from {remote_addr}: {err}");
                break;
            }
            Err(_) => {
                send_system(&session, "idle timeout; disconnecting.");
                break;
            }
        };
        if bytes_read == 0 {
            break; // EOF
        }

        session.state.lock().await.last_activity = std::time::Instant::now();
        let line = clean_input_line(&buf);
        if !handle_line(&engine, &scheduler, &session, &line).await {
            break;
        }
        if session.state.lock().await.flags.logging_out {
            break;
        }
    }

    detach(&engine, &session).await;
    engine.sessions.unregister(&session.session_id);
    writer_task.abort();
    log::info!("connection from {remote_addr} closed");
}

/// Advances one session's state machine by one input line. Returns `false`
/// when the connection should be closed.
async fn handle_line(engine: &Arc<Engine>, scheduler: &Scheduler, session: &SessionHandle, line: &str) -> bool {
    let phase = session.state.lock().await.phase;
    match phase {
        SessionPhase::Greeting => {
            session.state.lock().await.phase = SessionPhase::Menu;
            send_system(session, MENU_TEXT);
            true
        }
        SessionPhase::Menu => handle_menu(session, line).await,
        SessionPhase::AuthUser => handle_auth_user(session, line).await,
        SessionPhase::AuthPass => handle_auth_pass(engine, session, line).await,
        SessionPhase::RegisterUser => handle_register_user(session, line).await,
        SessionPhase::RegisterPass => handle_register_pass(engine, session, line).await,
        SessionPhase::Playing => handle_playing(engine, scheduler, session, line).await,
        SessionPhase::Quitting => false,
    }
}

async fn handle_menu(session: &SessionHandle, line: &str) -> bool {
    match line.trim() {
        "1" => {
            session.state.lock().await.phase = SessionPhase::AuthUser;
            send_system(session, "username:");
            true
        }
        "2" => {
            session.state.lock().await.phase = SessionPhase::RegisterUser;
            send_system(session, "choose a username:");
            true
        }
        "3" => false,
        _ => {
            send_system(session, "invalid choice.");
            send_system(session, MENU_TEXT);
            true
        }
    }
}

async fn handle_auth_user(session: &SessionHandle, line: &str) -> bool {
    let username = line.trim().to_string();
    if username.is_empty() {
        send_system(session, "username cannot be empty.");
        return true;
    }
    let mut state = session.state.lock().await;
    state.pending_username = Some(username);
    state.phase = SessionPhase::AuthPass;
    drop(state);
    send_system(session, "password:");
    true
}

async fn handle_auth_pass(engine: &Arc<Engine>, session: &SessionHandle, line: &str) -> bool {
    let username = session.state.lock().await.pending_username.take();
    let Some(username) = username else {
        session.state.lock().await.phase = SessionPhase::Menu;
        send_system(session, MENU_TEXT);
        return true;
    };

    match engine.auth.authenticate(&username, line).await {
        Ok(player) => {
            attach_player(engine, session, player).await;
        }
        Err(_) => {
            let mut state = session.state.lock().await;
            state.auth_failures += 1;
            let failures = state.auth_failures;
            state.phase = SessionPhase::Menu;
            drop(state);
            if failures >= MAX_CONSECUTIVE_AUTH_FAILURES {
                send_system(session, "too many failed attempts.");
                session.state.lock().await.auth_failures = 0;
            } else {
                send_system(session, "unknown username or password.");
            }
            send_system(session, MENU_TEXT);
        }
    }
    true
}

async fn handle_register_user(session: &SessionHandle, line: &str) -> bool {
    let username = line.trim().to_string();
    if crate::domain::validate_username(&username).is_err() {
        send_system(session, "username must be 3-20 characters, letters/digits/underscore only.");
        return true;
    }
    let mut state = session.state.lock().await;
    state.pending_username = Some(username);
    state.phase = SessionPhase::RegisterPass;
    drop(state);
    send_system(session, "choose a password (min 6 characters):");
    true
}

async fn handle_register_pass(engine: &Arc<Engine>, session: &SessionHandle, line: &str) -> bool {
    let username = session.state.lock().await.pending_username.take();
    let Some(username) = username else {
        session.state.lock().await.phase = SessionPhase::Menu;
        send_system(session, MENU_TEXT);
        return true;
    };

    match engine.auth.register(&username, line).await {
        Ok(player) => attach_player(engine, session, player).await,
        Err(err) => {
            send_system(session, &err.to_string());
            session.state.lock().await.phase = SessionPhase::RegisterUser;
            send_system(session, "choose a username:");
        }
    }
    true
}

/// Shared tail of successful `auth_pass`/`register_pass`: binds the player to
/// the session, joins the world, and sends a welcome plus an initial `look`.
async fn attach_player(engine: &Arc<Engine>, session: &SessionHandle, player: Player) {
    if let Some(kicked) = engine.sessions.bind_username(&player.username, &session.session_id) {
        send_system(&kicked, "you have been disconnected; logged in elsewhere.");
        engine.sessions.unregister(&kicked.session_id);
    }

    {
        let mut state = session.state.lock().await;
        state.phase = SessionPhase::Playing;
        state.player_id = Some(player.id.clone());
        state.username = Some(player.username.clone());
        state.is_admin = player.is_admin;
        state.current_room_id = Some(player.current_room_id.clone());
        state.auth_failures = 0;
    }

    engine.world.join_room(&player.id, &player.current_room_id);
    engine.event_bus.publish(GameEvent::PlayerJoined {
        room_id: player.current_room_id.clone(),
        player_id: player.id.clone(),
    });
    engine.broadcast_to_room(
        &player.current_room_id,
        &ServerMessage::PlayerJoined(PlayerRoomEvent {
            room_id: player.current_room_id.clone(),
            player_name: player.username.clone(),
        }),
        Some(&session.session_id),
    );

    send_system(session, &format!("welcome, {}.", player.username));
    let result = dispatch::dispatch(engine, session, "look").await;
    if let Ok(line) = encode_message(&ServerMessage::ActionResult(result)) {
        session.send_line(line);
    }
}

async fn handle_playing(engine: &Arc<Engine>, scheduler: &Scheduler, session: &SessionHandle, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    if session.state.lock().await.is_admin {
        let mut words = line.split_whitespace();
        if words.next().map(|w| w.eq_ignore_ascii_case("scheduler")) == Some(true) {
            let args: Vec<&str> = words.collect();
            run_admin_scheduler(scheduler, session, &args).await;
            return true;
        }
    }

    let result = dispatch::dispatch(engine, session, line).await;
    if let Ok(encoded) = encode_message(&ServerMessage::ActionResult(result)) {
        session.send_line(encoded);
    }
    true
}

/// Handles the admin `scheduler list|info|enable|disable <name>` command
/// directly, since the running `Scheduler` lives alongside `Engine` on the
/// binary's composition root rather than inside it (see `dispatch::cmd_scheduler`).
async fn run_admin_scheduler(scheduler: &Scheduler, session: &SessionHandle, args: &[&str]) {
    let message = match args {
        ["list"] => scheduler.list().join(", "),
        ["info", name] => match scheduler.info(name) {
            Some((enabled, run_count, error_count, last_run)) => {
                format!("{name}: enabled={enabled} runs={run_count} errors={error_count} last_run={last_run:?}")
            }
            None => format!("no such event: {name}"),
        },
        ["enable", name] => {
            if scheduler.set_enabled(name, true) {
                format!("{name} enabled.")
            } else {
                format!("no such event: {name}")
            }
        }
        ["disable", name] => {
            if scheduler.set_enabled(name, false) {
                format!("{name} disabled.")
            } else {
                format!("no such event: {name}")
            }
        }
        _ => "scheduler list|info|enable|disable <name>".to_string(),
    };
    send_system(session, &message);
}

/// Detaches a session from its player on disconnect/quit: leaves the room,
/// persists nothing extra (every mutation is already synchronous), and
/// announces the departure to roommates.
async fn detach(engine: &Arc<Engine>, session: &SessionHandle) {
    let (player_id, room_id, username) = {
        let state = session.state.lock().await;
        (state.player_id.clone(), state.current_room_id.clone(), state.username.clone())
    };
    let (Some(player_id), Some(room_id)) = (player_id, room_id) else {
        return;
    };

    engine.world.leave_room(&player_id, &room_id);
    engine.event_bus.publish(GameEvent::PlayerLeft {
        room_id: room_id.clone(),
        player_id: player_id.clone(),
    });
    engine.broadcast_to_room(
        &room_id,
        &ServerMessage::PlayerLeft(PlayerRoomEvent {
            room_id: room_id.clone(),
            player_name: username.unwrap_or_else(|| "someone".to_string()),
        }),
        Some(&session.session_id),
    );
}

fn send_system(session: &SessionHandle, text: &str) {
    if let Ok(line) = encode_message(&ServerMessage::SystemMessage(TextMessage::new(text))) {
        session.send_line(line);
    }
}
