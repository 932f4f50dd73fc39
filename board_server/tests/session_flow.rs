mod support;

use serde_json::json;
use support::{
    connect, join, recv_frame, recv_json, room_info, send_binary, send_json, send_text,
    stays_silent, unique_room, wait_for_elements,
};
use tokio_tungstenite::tungstenite::{Message, protocol::frame::coding::CloseCode};

fn stroke(points: usize) -> serde_json::Value {
    let points: Vec<[f64; 2]> = (0..points).map(|i| [i as f64 * 10.0, 5.0]).collect();
    json!({"kind": "stroke", "points": points, "color": "#e74c3c", "strokeWidth": 5, "isEraser": false})
}

fn sticky(id: &str, text: &str, x: f64, y: f64) -> serde_json::Value {
    json!({"kind": "sticky", "id": id, "x": x, "y": y, "text": text})
}

#[tokio::test]
async fn two_participants_share_one_history() {
    let room = unique_room();
    let mut alice = connect().await;

    let initial = join(&mut alice, &room).await;
    assert_eq!(initial, json!({"type": "load_history", "data": []}));

    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": stroke(3)}}),
    )
    .await;
    wait_for_elements(&room, 1).await;

    let mut bob = connect().await;
    let late = join(&mut bob, &room).await;
    assert_eq!(late["type"], "load_history");
    assert_eq!(late["data"][0]["kind"], "stroke");
    assert_eq!(late["data"][0]["points"].as_array().map(Vec::len), Some(3));

    send_json(&mut alice, json!({"type": "undo", "data": room})).await;
    let empty = json!({"type": "load_history", "data": []});
    assert_eq!(recv_json(&mut alice).await, empty);
    assert_eq!(recv_json(&mut bob).await, empty);

    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": sticky("s1", "hi", 40.0, 50.0)}}),
    )
    .await;
    wait_for_elements(&room, 1).await;

    send_json(
        &mut alice,
        json!({"type": "edit_line", "data": {"room": room, "id": "s1", "newText": "bye"}}),
    )
    .await;
    let edited = json!({"type": "load_history", "data": [sticky("s1", "bye", 40.0, 50.0)]});
    assert_eq!(recv_json(&mut alice).await, edited);
    assert_eq!(recv_json(&mut bob).await, edited);
}

#[tokio::test]
async fn live_strokes_reach_everyone_but_the_drawer() {
    let room = unique_room();
    let mut alice = connect().await;
    let mut bob = connect().await;
    join(&mut alice, &room).await;
    join(&mut bob, &room).await;

    send_json(
        &mut alice,
        json!({"type": "draw_line", "data": {"room": room, "data": stroke(2)}}),
    )
    .await;

    let relayed = recv_json(&mut bob).await;
    assert_eq!(relayed["type"], "draw_line");
    assert_eq!(relayed["data"]["kind"], "stroke");
    assert_eq!(relayed["data"]["color"], "#e74c3c");
    assert!(stays_silent(&mut alice).await);

    // Live strokes are never persisted.
    let (_, info) = room_info(&room).await;
    assert_eq!(info["elements"], json!([]));
    assert_eq!(info["participants"], 2);
}

#[tokio::test]
async fn moving_an_element_updates_only_the_others() {
    let room = unique_room();
    let mut alice = connect().await;
    let mut bob = connect().await;
    join(&mut alice, &room).await;
    join(&mut bob, &room).await;

    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": sticky("s1", "hi", 0.0, 0.0)}}),
    )
    .await;
    wait_for_elements(&room, 1).await;

    send_json(
        &mut alice,
        json!({"type": "move_element", "data": {"room": room, "id": "s1", "x": 120, "y": 80}}),
    )
    .await;

    assert_eq!(
        recv_json(&mut bob).await,
        json!({"type": "load_history", "data": [sticky("s1", "hi", 120.0, 80.0)]})
    );
    assert!(stays_silent(&mut alice).await);
}

#[tokio::test]
async fn intents_for_other_rooms_are_ignored() {
    let room = unique_room();
    let mut alice = connect().await;
    join(&mut alice, &room).await;

    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": sticky("s1", "hi", 1.0, 1.0)}}),
    )
    .await;
    wait_for_elements(&room, 1).await;

    send_json(&mut alice, json!({"type": "clear", "data": "somewhere-else"})).await;
    // Follow-up edit proves the stray clear never touched this room.
    send_json(
        &mut alice,
        json!({"type": "edit_line", "data": {"room": room, "id": "s1", "newText": "still here"}}),
    )
    .await;

    assert_eq!(
        recv_json(&mut alice).await,
        json!({"type": "load_history", "data": [sticky("s1", "still here", 1.0, 1.0)]})
    );
}

#[tokio::test]
async fn intents_before_join_are_rejected_but_join_still_works() {
    let room = unique_room();
    let mut alice = connect().await;

    send_json(&mut alice, json!({"type": "clear", "data": room})).await;
    send_json(&mut alice, json!({"type": "not_an_event", "data": 1})).await;

    let initial = join(&mut alice, &room).await;
    assert_eq!(initial, json!({"type": "load_history", "data": []}));
}

#[tokio::test]
async fn undo_on_empty_room_broadcasts_nothing() {
    let room = unique_room();
    let mut alice = connect().await;
    let mut bob = connect().await;
    join(&mut alice, &room).await;
    join(&mut bob, &room).await;

    send_json(&mut alice, json!({"type": "undo", "data": room})).await;

    assert!(stays_silent(&mut alice).await);
    assert!(stays_silent(&mut bob).await);
}

#[tokio::test]
async fn clear_empties_the_board_for_everyone() {
    let room = unique_room();
    let mut alice = connect().await;
    let mut bob = connect().await;
    join(&mut alice, &room).await;
    join(&mut bob, &room).await;

    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": stroke(4)}}),
    )
    .await;
    wait_for_elements(&room, 1).await;

    send_json(&mut bob, json!({"type": "clear", "data": room})).await;

    let empty = json!({"type": "load_history", "data": []});
    assert_eq!(recv_json(&mut alice).await, empty);
    assert_eq!(recv_json(&mut bob).await, empty);
    wait_for_elements(&room, 0).await;
}

#[tokio::test]
async fn too_many_invalid_messages_close_with_policy() {
    let room = unique_room();
    let mut alice = connect().await;
    join(&mut alice, &room).await;

    for _ in 0..21 {
        send_text(&mut alice, "{not json").await;
    }

    match recv_frame(&mut alice).await {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason.as_str(), "too many invalid messages");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_reader_never_sees_history_go_backwards() {
    let room = unique_room();
    let mut alice = connect().await;
    let mut bob = connect().await;
    join(&mut alice, &room).await;
    join(&mut bob, &room).await;

    // Large snapshots fill the socket buffers so bob's room receiver overflows.
    let padding = "x".repeat(4000);
    for i in 0..20 {
        send_json(
            &mut alice,
            json!({"type": "end_stroke", "data": {"room": room, "data": sticky(&format!("pad-{i}"), &padding, 0.0, 0.0)}}),
        )
        .await;
    }
    send_json(
        &mut alice,
        json!({"type": "end_stroke", "data": {"room": room, "data": sticky("s1", "moving", 0.0, 0.0)}}),
    )
    .await;
    wait_for_elements(&room, 21).await;

    // Moves skip the mover, so only bob falls behind.
    let moves = 400;
    for x in 1..=moves {
        send_json(
            &mut alice,
            json!({"type": "move_element", "data": {"room": room, "id": "s1", "x": x, "y": 0}}),
        )
        .await;
    }

    let mut last_x = 0.0;
    while last_x < moves as f64 {
        let frame = recv_json(&mut bob).await;
        assert_eq!(frame["type"], "load_history");
        let x = frame["data"][20]["x"].as_f64().expect("sticky x");
        assert!(x >= last_x, "history went backwards: {x} after {last_x}");
        last_x = x;
    }
    assert!(stays_silent(&mut bob).await);
}

#[tokio::test]
async fn binary_frames_close_the_connection() {
    let mut alice = connect().await;

    send_binary(&mut alice, vec![1, 2, 3]).await;

    match recv_frame(&mut alice).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Unsupported),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let base_url = support::ensure_server();

    let body: serde_json::Value = reqwest::get(format!("{base_url}/health"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body");

    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let (status, body) = room_info(&unique_room()).await;

    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "room not found");
}
