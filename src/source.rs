// Note source module - uniform note-event boundary over the input transports
//
// Every transport (MIDI hardware, WebSocket clients, tests) feeds the render
// loop through the same NoteEventSource capability. Callback threads only
// enqueue; the control thread is the only place engine state is touched.

use anyhow::{anyhow, Result};
use midir::{MidiInput, MidiInputConnection};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Receiver;

/// A note event produced by any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

/// A transport that feeds note events into the render loop.
pub trait NoteEventSource {
    fn name(&self) -> &str;
    /// Drain everything queued since the last poll.
    fn poll_events(&mut self) -> Vec<NoteEvent>;
}

/// Parse a raw MIDI message into a note event.
/// Note On with velocity 0 is treated as Note Off.
pub fn parse_midi_message(message: &[u8]) -> Option<NoteEvent> {
    if message.len() < 3 {
        return None;
    }

    let status = message[0] & 0xF0;
    let note = message[1];
    let velocity = message[2];

    match status {
        0x90 if velocity > 0 => Some(NoteEvent::NoteOn { note, velocity }),
        0x90 => Some(NoteEvent::NoteOff { note }),
        0x80 => Some(NoteEvent::NoteOff { note }),
        _ => None,
    }
}

/// MIDI input via midir. The midir callback runs on its own thread and only
/// pushes parsed events into the channel.
pub struct MidiSource {
    name: String,
    rx: Receiver<NoteEvent>,
    _connection: MidiInputConnection<()>,
}

impl MidiSource {
    /// Connect to the first port whose name contains `device_name`
    /// (case-insensitive), falling back to the first available port.
    pub fn connect(device_name: &str) -> Result<Self> {
        let midi_in = MidiInput::new("pianoled")?;
        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(anyhow!("No MIDI input ports available"));
        }

        let wanted = device_name.to_lowercase();
        let port_index = ports
            .iter()
            .position(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| !wanted.is_empty() && name.to_lowercase().contains(&wanted))
                    .unwrap_or(false)
            })
            .unwrap_or(0);
        let port = &ports[port_index];
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| device_name.to_string());

        let (tx, rx) = std::sync::mpsc::channel();
        let connection = midi_in
            .connect(
                port,
                "pianoled-in",
                move |_timestamp, message, _| {
                    if let Some(event) = parse_midi_message(message) {
                        let _ = tx.send(event);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to MIDI port: {}", e))?;

        Ok(MidiSource {
            name,
            rx,
            _connection: connection,
        })
    }
}

impl NoteEventSource for MidiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_events(&mut self) -> Vec<NoteEvent> {
        self.rx.try_iter().collect()
    }
}

/// Channel-fed source for transports that already run elsewhere (the
/// WebSocket surface enqueues into one of these).
pub struct QueueSource {
    name: String,
    rx: Receiver<NoteEvent>,
}

impl QueueSource {
    pub fn new(name: &str, rx: Receiver<NoteEvent>) -> Self {
        QueueSource {
            name: name.to_string(),
            rx,
        }
    }
}

impl NoteEventSource for QueueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_events(&mut self) -> Vec<NoteEvent> {
        self.rx.try_iter().collect()
    }
}

/// List all available MIDI input port names.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("pianoled")?;
    let ports = midi_in.ports();

    let mut port_names = Vec::new();
    for port in ports.iter() {
        if let Ok(name) = midi_in.port_name(port) {
            port_names.push(name);
        }
    }
    Ok(port_names)
}
