//! Session linked to a fake relay over real TCP.
//!
//! The "relay" is a local `TcpListener` that plays a scripted byte stream
//! and records what the client writes back.

use std::time::Duration;

use canvas_sync::constants::LOCAL_USER;
use canvas_sync::session::Outbound;
use canvas_sync::transport;
use canvas_sync::{Command, FramingMode, Picture, Session, SessionEvent};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn relay_traffic_reaches_session_and_local_input_is_broadcast() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut session = Session::new(Picture::new(16, 16));
    session.create_local_user();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (handle, outcome) = transport::connect("127.0.0.1", port, FramingMode::Legacy, events_tx);
    let (mut relay, _) = listener.accept().await.unwrap();
    timeout(WAIT, outcome).await.unwrap().unwrap().unwrap();
    assert!(handle.is_connected());
    session.attach_transport(Box::new(handle));
    assert!(session.is_connected());

    // Relay script, deliberately cut mid-token.
    let script = concat!(
        r#"{"func":"credentials","room":"lobby","user":"guest1"}"#,
        r#"{"func":"user_join","user":"bob"}"#,
        r#"[{"func":"create_layer","layer":"B","user":"bob"},"#,
        r#"{"func":"tool_down","x":"2","y":"2","layer":"B","tool":"pen","options":"","user":"bob"}]"#,
        r#"{"func":"tool_up","x":5,"y":2,"user":"bob"}"#,
    );
    let (head, tail) = script.as_bytes().split_at(37);
    relay.write_all(head).await.unwrap();
    relay.flush().await.unwrap();
    relay.write_all(tail).await.unwrap();

    let mut handled = 0;
    while handled < 5 {
        let event = timeout(WAIT, events_rx.recv()).await.unwrap().unwrap();
        session.handle_event(event);
        handled += 1;
    }

    assert_eq!(session.identity().map(|i| i.user.as_str()), Some("guest1"));
    assert!(session.runner("bob").is_some());
    let layer = session.picture().layer("B").unwrap();
    assert_eq!(layer.raster.painted_pixels(), 4);
    assert_eq!(layer.history.command_count(), 2);

    // Local input goes out once it has been applied here.
    let clear = Command::try_from(json!({"func": "clear", "layer": "B"})).unwrap();
    let expected = clear.encode();
    session.gui_input(clear).unwrap();
    assert_eq!(session.picture().layer("B").unwrap().raster.painted_pixels(), 0);

    let mut received = vec![0u8; expected.len()];
    timeout(WAIT, relay.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    let echoed: Command = serde_json::from_slice(&received).unwrap();
    assert_eq!(echoed.func(), "clear");
    assert!(session.runner(LOCAL_USER).is_some());

    // Relay goes away: session keeps working locally.
    drop(relay);
    let event = timeout(WAIT, events_rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, SessionEvent::Disconnected);
    session.handle_event(event);
    assert!(!session.is_connected());

    session
        .gui_input(Command::try_from(json!({"func": "rename_layer", "layer": "B", "name": "Bob's"})).unwrap())
        .unwrap();
    assert_eq!(session.picture().layer("B").unwrap().name, "Bob's");
}
