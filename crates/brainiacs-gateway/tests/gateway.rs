//! Gateway sessions against an in-memory SQLite store, plus one end-to-end
//! run over a real socket.

use brainiacs_api::AppState;
use brainiacs_api::routes::messages::post_message;
use brainiacs_common::config::{LimitsConfig, StoreSettings};
use brainiacs_common::fanout::Fanout;
use brainiacs_common::gateway_event::{EventTarget, EventType, GatewayEvent};
use brainiacs_common::models::{Board, CreateMessageRequest, MemberRole, UserProfile, Visibility};
use brainiacs_db::{Database, repository::users};
use brainiacs_gateway::protocol::{ClientOp, ServerOp};
use brainiacs_gateway::session::Session;
use brainiacs_gateway::{GatewayState, build_router};
use chrono::Utc;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

async fn gateway() -> Arc<GatewayState> {
    let db = Database::connect_with("sqlite::memory:", 1, 1, StoreSettings::default())
        .await
        .expect("connect sqlite");
    db.migrate().await.expect("migrate");
    let app = AppState {
        db,
        fanout: Fanout::new(64),
        limits: LimitsConfig::default(),
    };
    Arc::new(GatewayState::new(Arc::new(app), 45_000))
}

async fn user(state: &GatewayState, name: &str) -> UserProfile {
    let profile = UserProfile {
        id: Uuid::now_v7(),
        name: name.to_string(),
        email: format!("{name}@example.com"),
        avatar: None,
    };
    users::create_user(&state.app.db.pool, &profile).await.expect("create user");
    profile
}

async fn board(state: &GatewayState, creator: &UserProfile, visibility: Visibility) -> Board {
    let board = Board::new(
        Uuid::now_v7(),
        "Sprint 1",
        None,
        Some(visibility),
        None,
        creator,
        Utc::now(),
    )
    .unwrap();
    state.app.db.insert_board(&board).await.unwrap();
    board
}

fn chat(sender: &UserProfile, text: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        sender_id: sender.id,
        sender_name: sender.name.clone(),
        role: MemberRole::Member,
        text: Some(text.to_string()),
        attachments: vec![],
    }
}

fn error_code(op: Option<ServerOp>) -> String {
    match op {
        Some(ServerOp::Error { code, .. }) => code,
        other => panic!("expected an error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_identify_subscribes_member_boards() {
    let state = gateway().await;
    let ada = user(&state, "ada").await;
    let mine = board(&state, &ada, Visibility::Private).await;

    let mut session = Session::open(state.clone()).await;
    let ready = session
        .handle(ClientOp::Identify {
            user_email: "ADA@example.com".into(),
        })
        .await;

    match ready {
        Some(ServerOp::Ready { user, boards, .. }) => {
            assert_eq!(user.id, ada.id);
            assert_eq!(boards.len(), 1);
            assert_eq!(boards[0].id, mine.id);
        }
        other => panic!("expected ready, got {other:?}"),
    }
    assert!(state.presence().is_online(ada.id).await);
    let connection = state.presence().connection(session.connection_id()).await.unwrap();
    assert!(connection.boards.contains(&mine.id));

    session.close().await;
    assert!(!state.presence().is_online(ada.id).await);
}

#[tokio::test]
async fn test_identify_unknown_email() {
    let state = gateway().await;
    let mut session = Session::open(state.clone()).await;
    let reply = session
        .handle(ClientOp::Identify {
            user_email: "nobody@example.com".into(),
        })
        .await;
    assert_eq!(error_code(reply), "NOT_FOUND");
    assert!(session.user().is_none());
}

#[tokio::test]
async fn test_send_message_runs_the_rest_path() {
    let state = gateway().await;
    let ada = user(&state, "ada").await;
    let bob = user(&state, "bob").await;
    let target = board(&state, &ada, Visibility::Public).await;

    let mut session = Session::open(state.clone()).await;
    let reply = session
        .handle(ClientOp::SendMessage {
            board_id: target.id,
            message: chat(&ada, "too early"),
        })
        .await;
    assert_eq!(error_code(reply), "FORBIDDEN");

    session
        .handle(ClientOp::Identify {
            user_email: ada.email.clone(),
        })
        .await;

    let reply = session
        .handle(ClientOp::SendMessage {
            board_id: target.id,
            message: chat(&bob, "impersonation"),
        })
        .await;
    assert_eq!(error_code(reply), "FORBIDDEN");

    let reply = session
        .handle(ClientOp::SendMessage {
            board_id: target.id,
            message: chat(&ada, "   "),
        })
        .await;
    assert_eq!(error_code(reply), "VALIDATION_ERROR");

    let reply = session
        .handle(ClientOp::SendMessage {
            board_id: target.id,
            message: chat(&ada, "hello"),
        })
        .await;
    assert!(reply.is_none());

    let stored = state.app.db.load_board(target.id).await.unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_join_and_leave_board() {
    let state = gateway().await;
    let ada = user(&state, "ada").await;
    let bob = user(&state, "bob").await;
    let open = board(&state, &ada, Visibility::Public).await;
    let closed = board(&state, &ada, Visibility::Private).await;

    let mut session = Session::open(state.clone()).await;
    let reply = session.handle(ClientOp::JoinBoard { board_id: open.id }).await;
    assert_eq!(error_code(reply), "FORBIDDEN");

    session
        .handle(ClientOp::Identify {
            user_email: bob.email.clone(),
        })
        .await;
    let filter = session.filter();
    let event = GatewayEvent::new(EventType::NewMessage, json!({}), EventTarget::Board(open.id));
    assert!(filter.admit(&event).await.is_none());

    let reply = session.handle(ClientOp::JoinBoard { board_id: open.id }).await;
    assert!(matches!(reply, Some(ServerOp::Subscribed { board_id }) if board_id == open.id));
    assert!(filter.admit(&event).await.is_some());

    let reply = session.handle(ClientOp::JoinBoard { board_id: closed.id }).await;
    assert_eq!(error_code(reply), "FORBIDDEN");

    let reply = session
        .handle(ClientOp::JoinBoard {
            board_id: Uuid::now_v7(),
        })
        .await;
    assert_eq!(error_code(reply), "NOT_FOUND");

    let reply = session.handle(ClientOp::LeaveBoard { board_id: open.id }).await;
    assert!(matches!(reply, Some(ServerOp::Unsubscribed { .. })));
    assert!(filter.admit(&event).await.is_none());
}

#[tokio::test]
async fn test_member_added_subscribes_own_connection() {
    let state = gateway().await;
    let ada = user(&state, "ada").await;
    let bob = user(&state, "bob").await;
    let target = board(&state, &ada, Visibility::Private).await;

    let mut bob_session = Session::open(state.clone()).await;
    bob_session
        .handle(ClientOp::Identify {
            user_email: bob.email.clone(),
        })
        .await;
    let bob_filter = bob_session.filter();

    let anonymous = Session::open(state.clone()).await;
    let anonymous_filter = anonymous.filter();

    let added = GatewayEvent::new(
        EventType::MemberAdded,
        json!({ "boardId": target.id, "member": { "userId": bob.id, "role": "member" } }),
        EventTarget::Board(target.id),
    );
    let frame = bob_filter.admit(&added).await;
    assert!(matches!(frame, Some(ServerOp::Dispatch { event: EventType::MemberAdded, .. })));
    assert!(anonymous_filter.admit(&added).await.is_none());

    let message = GatewayEvent::new(EventType::NewMessage, json!({}), EventTarget::Board(target.id));
    assert!(bob_filter.admit(&message).await.is_some());
}

#[tokio::test]
async fn test_user_targeted_events_reach_every_tab() {
    let state = gateway().await;
    let bob = user(&state, "bob").await;
    let mut tabs = Vec::new();
    for _ in 0..2 {
        let mut session = Session::open(state.clone()).await;
        session
            .handle(ClientOp::Identify {
                user_email: bob.email.clone(),
            })
            .await;
        tabs.push(session);
    }
    let stranger = Session::open(state.clone()).await;

    let push = GatewayEvent::new(EventType::JoinRequestSent, json!({}), EventTarget::User(bob.id));
    for tab in &tabs {
        assert!(tab.filter().admit(&push).await.is_some());
    }
    assert!(stranger.filter().admit(&push).await.is_none());

    let global = GatewayEvent::new(EventType::JoinRequestsUpdated, json!({}), EventTarget::All);
    assert!(stranger.filter().admit(&global).await.is_some());
}

#[tokio::test]
async fn test_heartbeat() {
    let state = gateway().await;
    let mut session = Session::open(state).await;
    let reply = session.handle(ClientOp::Heartbeat).await;
    assert!(matches!(reply, Some(ServerOp::HeartbeatAck { timestamp }) if timestamp > 0));
}

// ── Over the wire ───────────────────────────────────────────────────────────

async fn next_frame<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

#[tokio::test]
async fn test_socket_round_trip() {
    let state = gateway().await;
    let ada = user(&state, "ada").await;
    let target = board(&state, &ada, Visibility::Public).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router((*state).clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/gateway"))
        .await
        .expect("connect");

    let hello = next_frame(&mut ws).await;
    assert_eq!(hello["op"], "hello");
    assert_eq!(hello["d"]["heartbeatInterval"], 45_000);

    let identify = json!({ "op": "identify", "d": { "userEmail": ada.email } });
    ws.send(Message::Text(identify.to_string().into())).await.unwrap();
    let ready = next_frame(&mut ws).await;
    assert_eq!(ready["op"], "ready");
    assert_eq!(ready["d"]["boards"][0]["id"], json!(target.id));

    post_message(&state.app, target.id, chat(&ada, "from rest")).await.unwrap();
    let dispatch = next_frame(&mut ws).await;
    assert_eq!(dispatch["op"], "dispatch");
    assert_eq!(dispatch["d"]["event"], "newMessage");
    assert_eq!(dispatch["d"]["data"]["message"]["text"], "from rest");

    ws.send(Message::Text("not json".into())).await.unwrap();
    let error = next_frame(&mut ws).await;
    assert_eq!(error["op"], "error");
    assert_eq!(error["d"]["code"], "VALIDATION_ERROR");

    ws.send(Message::Text(r#"{"op":"heartbeat"}"#.into())).await.unwrap();
    let ack = next_frame(&mut ws).await;
    assert_eq!(ack["op"], "heartbeatAck");

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if !state.presence().is_online(ada.id).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!state.presence().is_online(ada.id).await);
}
