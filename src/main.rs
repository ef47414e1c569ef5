// PianoLED - LED-per-key piano visualizer for WLED strips
// Ingests MIDI note events and renders real-time lighting effects over DDP.
use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

mod calibration;
mod device;
mod effects;
mod engine;
mod httpd;
mod notes;
mod settings;
mod source;
mod splash;
mod types;

use device::{DdpSink, FrameSink};
use engine::{Command, LedEngine, Mode};
use settings::Settings;
use source::{MidiSource, NoteEvent, NoteEventSource, QueueSource};
use types::Rgb;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LED-per-key piano visualizer streaming to WLED strips via DDP",
    long_about = "Maps MIDI note events onto an LED strip mounted above the keys.\n\
                  Renders free-play, fade, velocity-color, split, learning, and ambient\n\
                  effects at ~60 FPS and exposes a web control surface for live tuning."
)]
struct Args {
    /// Settings file path (default: ~/.config/pianoled/settings.json)
    #[arg(long)]
    settings: Option<String>,

    /// WLED device address
    #[arg(short, long)]
    wled_ip: Option<String>,

    /// Number of LEDs on the strip
    #[arg(short = 'L', long)]
    leds: Option<usize>,

    /// MIDI input device name (case-insensitive substring match)
    #[arg(long)]
    midi_device: Option<String>,

    /// Initial mode (free_play, visualizer, learning, ambient, split, velocity, random, off)
    #[arg(short, long)]
    mode: Option<String>,

    /// List available MIDI input ports and exit
    #[arg(long)]
    list_midi: bool,

    /// Disable the web control surface
    #[arg(long)]
    no_httpd: bool,

    /// Web control surface port
    #[arg(long)]
    httpd_port: Option<u16>,

    /// Skip the boot rainbow sweep
    #[arg(long)]
    no_startup_animation: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_midi {
        let ports = source::list_midi_ports()?;
        if ports.is_empty() {
            println!("No MIDI input ports available");
        }
        for (i, name) in ports.iter().enumerate() {
            println!("{}: {}", i, name);
        }
        return Ok(());
    }

    let mut settings = Settings::load_or_create(args.settings.as_deref())?;
    if let Some(ip) = args.wled_ip {
        settings.wled_ip = ip;
    }
    if let Some(leds) = args.leds {
        settings.led_count = leds;
    }
    if let Some(device) = args.midi_device {
        settings.midi_device = device;
    }
    if let Some(port) = args.httpd_port {
        settings.httpd_port = port;
    }
    settings.sanitize();

    let mut engine = LedEngine::new(settings.led_count);
    settings.apply_to(&mut engine);
    if let Some(name) = args.mode.as_deref() {
        match Mode::parse(name) {
            Some(mode) => engine.set_mode(mode),
            None => eprintln!("⚠ Unknown mode '{}', keeping {:?}", name, engine.mode()),
        }
    }

    let mut sink = DdpSink::connect(&settings.wled_ip)?;
    println!("✓ Streaming to WLED at {}", settings.wled_ip);
    println!("✓ LED count: {}", engine.led_count());

    // Input sources: every transport enqueues, only this thread mutates
    let mut sources: Vec<Box<dyn NoteEventSource>> = Vec::new();
    let midi_connected = match MidiSource::connect(&settings.midi_device) {
        Ok(midi) => {
            println!("✓ MIDI input: {}", midi.name());
            sources.push(Box::new(midi));
            true
        }
        Err(e) => {
            eprintln!("⚠ No MIDI input: {} (WebSocket input still works)", e);
            false
        }
    };

    let (command_tx, command_rx) = mpsc::channel();
    let (note_tx, note_rx) = mpsc::channel();
    let (reload_tx, reload_rx) = mpsc::channel();
    sources.push(Box::new(QueueSource::new("websocket", note_rx)));

    let shared_settings = Arc::new(Mutex::new(settings.clone()));

    let _httpd = if settings.httpd_enabled && !args.no_httpd {
        let state = httpd::ApiState {
            command_tx: command_tx.clone(),
            note_tx,
            reload_tx: reload_tx.clone(),
            settings: shared_settings.clone(),
            started_at: Instant::now(),
        };
        Some(httpd::spawn_http_server(settings.httpd_port, state)?)
    } else {
        None
    };

    let _watcher = match settings.path.as_deref() {
        Some(path) => match settings::spawn_settings_watcher(path, reload_tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                eprintln!("⚠ Settings watcher unavailable: {}", e);
                None
            }
        },
        None => None,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || shutdown_flag.store(true, Ordering::SeqCst))?;

    if !args.no_startup_animation {
        engine.play_startup_animation(&mut sink)?;
    }
    if midi_connected {
        engine.show_status(Rgb::new(0, 255, 0), 2, &mut sink)?;
    }

    run_render_loop(
        &mut engine,
        &mut sink,
        &mut sources,
        command_rx,
        reload_rx,
        shared_settings,
        shutdown,
    )
}

/// Fixed-rate render loop. Each tick: drain note events, drain commands,
/// check for a settings reload, step the engine, flush the frame. All
/// engine mutation happens here, on this one thread.
fn run_render_loop(
    engine: &mut LedEngine,
    sink: &mut DdpSink,
    sources: &mut [Box<dyn NoteEventSource>],
    command_rx: mpsc::Receiver<Command>,
    reload_rx: mpsc::Receiver<()>,
    shared_settings: Arc<Mutex<Settings>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let fps = shared_settings.lock().unwrap().fps.max(1);
    let tick = Duration::from_millis((1000 / fps as u64).max(1));
    let mut send_error_logged = false;

    println!("✓ Rendering at {} FPS ({:?} per tick)", fps, tick);

    while !shutdown.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        for source in sources.iter_mut() {
            for event in source.poll_events() {
                match event {
                    NoteEvent::NoteOn { note, velocity } => engine.note_on(note, velocity),
                    NoteEvent::NoteOff { note } => engine.note_off(note),
                }
            }
        }

        while let Ok(command) = command_rx.try_recv() {
            engine.apply(command);
        }

        if reload_rx.try_recv().is_ok() {
            // Editors and the web surface can fire bursts of change events
            while reload_rx.try_recv().is_ok() {}
            let path = shared_settings.lock().unwrap().path.clone();
            if let Some(path) = path {
                match Settings::load(&path) {
                    Ok(new_settings) => {
                        new_settings.apply_to(engine);
                        *shared_settings.lock().unwrap() = new_settings;
                        println!("✓ Settings reloaded");
                    }
                    Err(e) => eprintln!("⚠ Settings reload failed: {}", e),
                }
            }
        }

        engine.update(Instant::now());
        match sink.send_frame(engine.frame(), engine.brightness_factor()) {
            Err(e) if !send_error_logged => {
                eprintln!("⚠ Frame send failed: {}", e);
                send_error_logged = true;
            }
            Ok(()) if send_error_logged => {
                println!("✓ Frame send recovered");
                send_error_logged = false;
            }
            _ => {}
        }

        // Sleep out the rest of the tick. Fade decay uses measured elapsed
        // time, so a late tick only produces a proportionally larger step.
        let elapsed = tick_start.elapsed();
        if elapsed < tick {
            std::thread::sleep(tick - elapsed);
        }
    }

    // Leave the strip dark on exit
    engine.set_mode(Mode::Off);
    engine.update(Instant::now());
    let _ = sink.send_frame(engine.frame(), 0.0);
    println!("✓ Shut down");
    Ok(())
}
