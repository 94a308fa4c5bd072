//! Manual smoke-test client: connects to a running arena server, creates a
//! session and prints everything the server says.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8765".to_string());

    let (ws, _) = tokio_tungstenite::connect_async(&url).await?;
    println!("Connected to {}", url);
    let (mut sink, mut source) = ws.split();

    // Printer for everything the server pushes at us.
    let reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = source.next().await {
            if let Message::Text(text) = frame {
                println!("<- {}", text);
            }
        }
    });

    let script = [
        json!({"type": "ping"}),
        json!({"type": "create", "game_kind": "snake"}),
        json!({"type": "move", "session_id": 1, "payload": {"direction": "UP"}}),
        json!({"type": "join", "session_id": 999}),
    ];

    for message in script {
        let text = message.to_string();
        println!("-> {}", text);
        sink.send(Message::Text(text)).await?;
        sleep(Duration::from_millis(200)).await;
    }

    sleep(Duration::from_secs(1)).await;
    sink.close().await?;
    reader.abort();

    Ok(())
}
