//! Loopstream simulator
//!
//! Drives the stream end to end without audio hardware or a remote model:
//! a synthetic producer generates sine chunks faster than real time, a render
//! thread drains both decks at real time, and the main thread exercises the
//! control surface (tempo match, loop, phase align) while logging events.
//!
//! ## Command line flags
//!
//! - `--config <path>`: YAML config to load (defaults to the user config path)
//! - `--seconds <n>`: how long to run (default 20)
//! - `--write-config`: save the effective config to the config path and exit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};

use loopstream_core::config::{default_config_path, load_stream_config, save_config};
use loopstream_core::loops::LoopRequest;
use loopstream_core::{
    beat_frames, ChannelProducer, Deck, EventBus, ProducerCommand, RenderHandle, StreamCommand,
    StreamCoordinator, StreamEvent, StreamService, BEATS_PER_BAR, CHANNELS, NUM_DECKS,
};

/// Producer generates this much audio per chunk
const CHUNK_MS: u64 = 100;
/// Producer runs this many times faster than real time
const PRODUCER_SPEEDUP: u64 = 4;
/// Render quantum
const RENDER_MS: u64 = 10;

const DECK_BPM: [f64; NUM_DECKS] = [120.0, 128.0];
const DECK_PITCH_HZ: [f32; NUM_DECKS] = [220.0, 330.0];

struct Args {
    config_path: std::path::PathBuf,
    seconds: u64,
    write_config: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: default_config_path(),
        seconds: 20,
        write_config: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config_path = iter.next().context("--config needs a path")?.into();
            }
            "--seconds" => {
                args.seconds = iter
                    .next()
                    .context("--seconds needs a value")?
                    .parse()
                    .context("--seconds must be a whole number")?;
            }
            "--write-config" => args.write_config = true,
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config = load_stream_config(&args.config_path);

    if args.write_config {
        save_config(&config, &args.config_path)?;
        log::info!("stream-sim: wrote config to {:?}", args.config_path);
        return Ok(());
    }

    log::info!("stream-sim starting up ({}s run)", args.seconds);

    let sample_rate = config.sample_rate;
    let (producer, producer_rx) = ChannelProducer::new();
    let (coordinator, render) = StreamCoordinator::new(config, Box::new(producer))?;
    let ring = Arc::clone(coordinator.ring());

    let bus = EventBus::new(4096);
    let events = bus.subscribe();
    let mut service = StreamService::spawn(coordinator, bus.sender())?;

    let running = Arc::new(AtomicBool::new(true));
    let producer_thread = spawn_producer(
        service.command_tx.clone(),
        producer_rx,
        sample_rate,
        Arc::clone(&running),
    )?;
    let render_thread = spawn_render(render, sample_rate, Arc::clone(&running))?;

    for deck in Deck::ALL {
        service.send(StreamCommand::SetDeckTempo {
            deck,
            bpm: DECK_BPM[deck.index()],
            offset_seconds: 0.0,
        })?;
        service.send(StreamCommand::MarkContextChange {
            deck,
            at: Instant::now(),
        })?;
    }
    service.send(StreamCommand::MatchTempo {
        deck: Deck::B,
        master_bpm: DECK_BPM[0],
    })?;

    let started = Instant::now();
    let run_for = Duration::from_secs(args.seconds);
    let loop_at = run_for / 3;
    let mut loop_sent = false;

    while started.elapsed() < run_for {
        if !loop_sent && started.elapsed() >= loop_at {
            // Loop the last two bars deck A has received
            let write = ring.current_write(Deck::A);
            let beat = beat_frames(DECK_BPM[0], sample_rate);
            let two_bars = (beat * BEATS_PER_BAR as f64 * 2.0) as u32;
            service.send(StreamCommand::ConfigureLoop {
                deck: Deck::A,
                request: LoopRequest {
                    start: write.saturating_sub(two_bars + sample_rate),
                    end: write.saturating_sub(sample_rate),
                    crossfade_frames: (beat / 8.0) as u32,
                    repeat_count: 0,
                    active: true,
                },
            })?;
            service.send(StreamCommand::AlignPhase { deck: Deck::B })?;
            loop_sent = true;
        }

        if let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
            log_event(&event);
        }
    }

    service.shutdown();
    running.store(false, Ordering::Relaxed);
    for handle in [producer_thread, render_thread] {
        if handle.join().is_err() {
            log::error!("stream-sim: worker thread panicked");
        }
    }
    for event in events.try_iter() {
        log_event(&event);
    }

    log::info!("stream-sim finished");
    Ok(())
}

fn log_event(event: &StreamEvent) {
    match event {
        StreamEvent::HealthUpdated(report) => log::debug!(
            "{}: {:.2}s buffered ({:.0}%){}",
            report.deck,
            report.buffered_seconds,
            report.fill_percent,
            if report.paused { ", paused" } else { "" }
        ),
        other => log::info!("event: {:?}", other),
    }
}

/// Synthetic producer: one sine per deck, paused and resumed on request
fn spawn_producer(
    commands: Sender<StreamCommand>,
    control: Receiver<ProducerCommand>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let chunk_frames = (sample_rate as u64 * CHUNK_MS / 1000) as usize;
    let period = Duration::from_millis(CHUNK_MS / PRODUCER_SPEEDUP);

    thread::Builder::new()
        .name("sim-producer".into())
        .spawn(move || {
            let mut paused = [false; NUM_DECKS];
            let mut phase = [0.0f32; NUM_DECKS];

            while running.load(Ordering::Relaxed) {
                for cmd in control.try_iter() {
                    match cmd {
                        ProducerCommand::Pause(deck) => paused[deck.index()] = true,
                        ProducerCommand::Resume(deck) => paused[deck.index()] = false,
                    }
                }

                for deck in Deck::ALL {
                    if paused[deck.index()] {
                        continue;
                    }
                    let step = DECK_PITCH_HZ[deck.index()] * std::f32::consts::TAU / sample_rate as f32;
                    let mut samples = Vec::with_capacity(chunk_frames * CHANNELS);
                    for _ in 0..chunk_frames {
                        let value = phase[deck.index()].sin() * 0.25;
                        samples.push(value);
                        samples.push(value);
                        phase[deck.index()] = (phase[deck.index()] + step) % std::f32::consts::TAU;
                    }
                    if commands.send(StreamCommand::PushChunk { deck, samples }).is_err() {
                        return;
                    }
                }

                thread::sleep(period);
            }
        })
        .context("failed to spawn producer thread")
}

/// Real-time reader standing in for the audio callback
fn spawn_render(
    mut render: RenderHandle,
    sample_rate: u32,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    let quantum_frames = (sample_rate as u64 * RENDER_MS / 1000) as usize;

    thread::Builder::new()
        .name("sim-render".into())
        .spawn(move || {
            let mut buffer = vec![0.0f32; quantum_frames * CHANNELS];
            let mut silent_quanta = [0u64; NUM_DECKS];
            let mut next = Instant::now();

            while running.load(Ordering::Relaxed) {
                render.apply_commands();
                for deck in Deck::ALL {
                    if render.read_interleaved(deck, &mut buffer) < quantum_frames {
                        silent_quanta[deck.index()] += 1;
                    }
                }

                next += Duration::from_millis(RENDER_MS);
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }

            for deck in Deck::ALL {
                log::info!(
                    "sim-render: {} had {} short quanta, final read pointer {}",
                    deck,
                    silent_quanta[deck.index()],
                    render.read_pointer(deck)
                );
            }
        })
        .context("failed to spawn render thread")
}
