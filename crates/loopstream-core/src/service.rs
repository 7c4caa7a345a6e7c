//! Stream coordinator service
//!
//! Runs a [`StreamCoordinator`] on its own thread. Control commands arrive
//! over a crossbeam channel; the health controller and the auto-stop monitor
//! run off two tick timers on the same thread, so commands and ticks never
//! race each other.

use std::thread;

use crossbeam::channel::{Receiver, Sender};

use crate::coordinator::StreamCoordinator;
use crate::error::{StreamError, StreamResult};
use crate::messages::{ServiceHandle, StreamCommand, StreamEvent};

const SERVICE_NAME: &str = "StreamService";

/// Background service owning the stream coordinator
pub struct StreamService {
    coordinator: StreamCoordinator,
    command_rx: Receiver<StreamCommand>,
    event_tx: Sender<StreamEvent>,
}

impl StreamService {
    /// Spawn the service thread
    pub fn spawn(
        coordinator: StreamCoordinator,
        event_tx: Sender<StreamEvent>,
    ) -> StreamResult<ServiceHandle<StreamCommand>> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();

        let service = StreamService {
            coordinator: coordinator.with_events(event_tx.clone()),
            command_rx,
            event_tx: event_tx.clone(),
        };

        let handle = thread::Builder::new()
            .name("stream-coordinator".into())
            .spawn(move || {
                service.run();
            })
            .map_err(|e| StreamError::ServiceSpawn(e.to_string()))?;

        let _ = event_tx.try_send(StreamEvent::ServiceStarted {
            service_name: SERVICE_NAME.to_string(),
        });

        Ok(ServiceHandle {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    /// Main service loop
    fn run(mut self) {
        log::info!("StreamService started");

        let health_tick = crossbeam::channel::tick(self.coordinator.config().health.tick());
        let autostop_tick = crossbeam::channel::tick(self.coordinator.config().autostop.tick());

        loop {
            crossbeam::select! {
                recv(self.command_rx) -> cmd => {
                    match cmd {
                        Ok(StreamCommand::Shutdown) => {
                            log::info!("StreamService shutting down");
                            break;
                        }
                        Ok(cmd) => self.handle_command(cmd),
                        Err(_) => {
                            log::info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }
                recv(health_tick) -> at => {
                    if let Ok(at) = at {
                        self.coordinator.tick_health(at);
                    }
                }
                recv(autostop_tick) -> _ => {
                    self.coordinator.tick_autostop();
                }
            }
        }

        let _ = self.event_tx.try_send(StreamEvent::ServiceStopped {
            service_name: SERVICE_NAME.to_string(),
        });

        log::info!("StreamService stopped");
    }

    fn handle_command(&mut self, cmd: StreamCommand) {
        let result = match cmd {
            StreamCommand::PushChunk { deck, samples } => {
                // Rejections are already logged and published by the coordinator
                let _ = self.coordinator.push_chunk(deck, &samples);
                Ok(())
            }
            StreamCommand::ConfigureLoop { deck, request } => {
                self.coordinator.configure_loop(deck, &request).map(|_| ())
            }
            StreamCommand::ClearLoop { deck } => self.coordinator.clear_loop(deck),
            StreamCommand::AlignPhase { deck } => {
                self.coordinator.align_phase(deck);
                Ok(())
            }
            StreamCommand::SetTempoRatio { deck, ratio } => {
                self.coordinator.set_tempo_ratio(deck, ratio).map(|_| ())
            }
            StreamCommand::MatchTempo { deck, master_bpm } => {
                self.coordinator.match_tempo(deck, master_bpm).map(|_| ())
            }
            StreamCommand::SetDeckTempo {
                deck,
                bpm,
                offset_seconds,
            } => {
                self.coordinator.set_deck_tempo(deck, bpm, offset_seconds);
                Ok(())
            }
            StreamCommand::MarkContextChange { deck, at } => {
                self.coordinator.mark_context_change(deck, at);
                Ok(())
            }
            StreamCommand::SetManualPause { deck, paused } => {
                self.coordinator.set_manual_pause(deck, paused);
                Ok(())
            }
            StreamCommand::Seek { deck, frame } => {
                self.coordinator.seek(deck, frame);
                Ok(())
            }
            StreamCommand::ClearDeckBuffer { deck } => self.coordinator.clear_deck_buffer(deck),
            StreamCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            log::error!("StreamService: {}", e);
            let _ = self.event_tx.try_send(StreamEvent::ServiceError {
                service_name: SERVICE_NAME.to_string(),
                error: e.to_string(),
            });
        }
    }
}
