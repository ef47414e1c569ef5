// HTTP server module - web control surface and JSON command API
//
// Handlers never touch the engine. Commands and note events are enqueued
// into channels the render loop drains on the control thread.

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::engine::Command;
use crate::settings::Settings;
use crate::source::NoteEvent;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct ApiState {
    pub command_tx: Sender<Command>,
    pub note_tx: Sender<NoteEvent>,
    pub reload_tx: Sender<()>,
    pub settings: Arc<Mutex<Settings>>,
    pub started_at: Instant,
}

/// Spawn the HTTP server on its own thread with its own tokio runtime so the
/// render loop stays synchronous.
pub fn spawn_http_server(port: u16, state: ApiState) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("httpd".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("✗ Failed to start HTTP runtime: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(run_http_server(port, state)) {
                eprintln!("✗ HTTP server error: {}", e);
            }
        })?;
    Ok(handle)
}

pub async fn run_http_server(port: u16, state: ApiState) -> Result<()> {
    let app = Router::new()
        .route("/", get(serve_index))
        .route("/api/status", get(get_status))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/command", post(post_command))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("✓ Web control surface on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> impl IntoResponse {
    Html(CONTROL_PAGE)
}

async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let settings = state.settings.lock().unwrap();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": state.started_at.elapsed().as_secs(),
        "mode": settings.mode,
        "brightness": settings.brightness,
        "led_count": settings.led_count,
        "calibrated": settings.calibrated,
    }))
}

async fn get_settings(State(state): State<ApiState>) -> impl IntoResponse {
    let settings = state.settings.lock().unwrap().clone();
    Json(settings)
}

/// Replace the settings document: sanitize, persist, and signal the render
/// loop to reload and re-apply.
async fn update_settings(
    State(state): State<ApiState>,
    Json(mut incoming): Json<Settings>,
) -> impl IntoResponse {
    incoming.sanitize();
    {
        let mut settings = state.settings.lock().unwrap();
        incoming.path = settings.path.clone();
        *settings = incoming.clone();
    }

    if let Err(e) = incoming.save() {
        eprintln!("⚠ Failed to save settings: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response();
    }

    let _ = state.reload_tx.send(());
    Json(json!({"success": true})).into_response()
}

async fn post_command(
    State(state): State<ApiState>,
    Json(command): Json<Command>,
) -> impl IntoResponse {
    match state.command_tx.send(command) {
        Ok(_) => Json(json!({"success": true})).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "engine not running"})),
        )
            .into_response(),
    }
}

async fn ws_upgrade(State(state): State<ApiState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// WebSocket clients send JSON that is either a command or a note event.
async fn handle_ws(mut socket: WebSocket, state: ApiState) {
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if !dispatch_message(&text, &state) {
                let _ = socket
                    .send(Message::Text(r#"{"error":"unknown message"}"#.to_string()))
                    .await;
            }
        }
    }
}

/// Route one JSON message into the right queue. Returns false when it parses
/// as neither a command nor a note event.
fn dispatch_message(text: &str, state: &ApiState) -> bool {
    if let Ok(command) = serde_json::from_str::<Command>(text) {
        return state.command_tx.send(command).is_ok();
    }
    if let Ok(event) = serde_json::from_str::<NoteEvent>(text) {
        return state.note_tx.send(event).is_ok();
    }
    false
}

const CONTROL_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>PianoLED Control</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #1a1a1a;
            color: #e0e0e0;
            padding: 20px;
            line-height: 1.6;
        }
        .container { max-width: 480px; margin: 0 auto; }
        h1 { color: #00aaff; margin-bottom: 20px; font-size: 1.6em; }
        label {
            display: block;
            color: #b0b0b0;
            margin: 14px 0 4px;
            font-size: 0.85em;
            text-transform: uppercase;
            letter-spacing: 0.5px;
        }
        input[type=range], select { width: 100%; }
        select, input[type=color] {
            background: #2a2a2a;
            color: #e0e0e0;
            border: 1px solid #444;
            border-radius: 4px;
            padding: 6px;
        }
        .val { color: #00aaff; font-weight: bold; }
        .row { display: flex; gap: 10px; align-items: center; }
        .toggle { margin-top: 14px; }
    </style>
</head>
<body>
    <div class="container">
        <h1>PianoLED</h1>

        <label>Mode</label>
        <select id="mode">
            <option value="free_play">Free Play</option>
            <option value="visualizer">Visualizer</option>
            <option value="velocity">Velocity</option>
            <option value="random">Random</option>
            <option value="split">Split</option>
            <option value="learning">Learning</option>
            <option value="ambient">Ambient</option>
            <option value="off">Off</option>
        </select>

        <label>Brightness: <span id="bval" class="val">128</span></label>
        <input type="range" id="brightness" min="0" max="255" value="128">

        <label>Fade time (ms): <span id="fval" class="val">200</span></label>
        <input type="range" id="fade" min="0" max="2000" step="50" value="200">

        <label>Base color</label>
        <input type="color" id="color" value="#ffffff">

        <div class="row toggle">
            <input type="checkbox" id="wave"><label for="wave" style="margin:0">Wave</label>
            <input type="checkbox" id="splash"><label for="splash" style="margin:0">Splash</label>
        </div>
    </div>

    <script>
        function send(cmd) {
            fetch('/api/command', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(cmd)
            });
        }

        var mode = document.getElementById('mode');
        var brightness = document.getElementById('brightness');
        var fade = document.getElementById('fade');
        var color = document.getElementById('color');
        var wave = document.getElementById('wave');
        var splash = document.getElementById('splash');

        mode.onchange = function() { send({ type: 'set_mode', mode: mode.value }); };
        brightness.oninput = function() {
            document.getElementById('bval').textContent = brightness.value;
            send({ type: 'set_brightness', value: +brightness.value });
        };
        fade.oninput = function() {
            document.getElementById('fval').textContent = fade.value;
            send({ type: 'set_fade_time', ms: +fade.value });
        };
        color.onchange = function() {
            send({ type: 'set_color', color: color.value.slice(1) });
        };
        wave.onchange = function() { send({ type: 'set_wave_enabled', enabled: wave.checked }); };
        splash.onchange = function() { send({ type: 'set_splash_enabled', enabled: splash.checked }); };

        fetch('/api/status').then(function(r) { return r.json(); }).then(function(s) {
            brightness.value = s.brightness;
            document.getElementById('bval').textContent = s.brightness;
        });
    </script>
</body>
</html>"##;
