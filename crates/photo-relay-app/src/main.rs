#![warn(missing_docs)]
//! # photo-relay binary
//!
//! Terminal shell for photo-relay: one trigger, a colored status line, and
//! popups that stay on screen until dismissed.
//!
//! Usage: `photo-relay [config.json]`. Press Enter (or `p`) to take and upload
//! a photo, `d` to dismiss a popup, `q` to quit.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use photo_relay_app::{
    AppConfig, AppError, PhotoRelay, SequenceOutcome, app_version, init_tracing, redact_sensitive,
};
use photo_relay_auth::{AuthError, ConsentPrompt};
use photo_relay_ui::{UiState, ui_channel};
use tracing::{debug, error, info};

const TICK: Duration = Duration::from_millis(100);

enum ShellEvent {
    Line(String),
    InputClosed,
    Consent { url: String, reply: Sender<String> },
}

/// Routes consent requests to the shell so stdin has a single reader.
struct ShellConsentPrompt {
    events: Sender<ShellEvent>,
}

impl ConsentPrompt for ShellConsentPrompt {
    fn authorization_code(&self, consent_url: &str) -> Result<String, AuthError> {
        let (reply, answer) = mpsc::channel();
        self.events
            .send(ShellEvent::Consent {
                url: consent_url.to_string(),
                reply,
            })
            .map_err(|_| AuthError::ConsentDeclined("shell has exited".to_string()))?;
        answer
            .recv()
            .map_err(|_| AuthError::ConsentDeclined("no authorization code entered".to_string()))
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Shell {
    state: UiState,
    consent_reply: Option<Sender<String>>,
    worker: Option<JoinHandle<SequenceOutcome>>,
}

impl Shell {
    fn handle_line(&mut self, line: &str, relay: &PhotoRelay) -> Flow {
        if let Some(reply) = self.consent_reply.take() {
            let _ = reply.send(line.to_string());
            return Flow::Continue;
        }

        match line {
            "" | "p" | "photo" => self.press_trigger(relay),
            "d" | "dismiss" => {
                self.state.dismiss_popup();
            }
            "q" | "quit" => return Flow::Quit,
            other => println!("unknown command {other:?}; Enter = take photo, d = dismiss, q = quit"),
        }
        Flow::Continue
    }

    fn press_trigger(&mut self, relay: &PhotoRelay) {
        if !self.state.trigger_enabled {
            println!("busy; wait for the current photo to finish");
            return;
        }
        self.state.dismiss_popup();
        match relay.on_trigger() {
            Ok(handle) => self.worker = Some(handle),
            Err(AppError::Busy) => println!("busy; wait for the current photo to finish"),
            Err(error) => debug!(stage = "shell", action = "trigger_failed", %error),
        }
    }

    fn finish(&mut self) {
        if let Some(worker) = self.worker.take() {
            if !worker.is_finished() {
                println!("waiting for the current upload to finish...");
            }
            match worker.join() {
                Ok(outcome) => debug!(stage = "shell", action = "worker_joined", ?outcome),
                Err(_) => error!(stage = "shell", action = "worker_panicked"),
            }
        }
    }

    fn render(&self) {
        let (r, g, b) = self.state.status_tone.rgb();
        let trigger = if self.state.trigger_enabled {
            "[ Take Photo ]"
        } else {
            "[ .......... ]"
        };
        println!(
            "photo-relay v{}  {trigger}  \x1b[38;2;{r};{g};{b}m{}\x1b[0m",
            self.state.version, self.state.status_text
        );
        if let Some(popup) = &self.state.popup {
            println!("+-- {} --", popup.title);
            for line in popup.message.lines() {
                println!("| {line}");
            }
            println!("+-- press d to dismiss --");
        }
    }
}

fn spawn_stdin_reader(events: Sender<ShellEvent>) -> Result<(), AppError> {
    std::thread::Builder::new()
        .name("photo-relay-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if events.send(ShellEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = events.send(ShellEvent::InputClosed);
        })
        .map(|_| ())
        .map_err(|error| AppError::Worker(format!("failed to spawn stdin reader: {error}")))
}

fn run() -> Result<(), AppError> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let (events_tx, events) = mpsc::channel();
    let (notifier, queue) = ui_channel();
    let prompt = Arc::new(ShellConsentPrompt {
        events: events_tx.clone(),
    });
    let relay = PhotoRelay::from_config(&config, notifier, prompt)?;
    spawn_stdin_reader(events_tx)?;
    info!(stage = "startup", action = "ready", version = app_version());

    let mut shell = Shell {
        state: UiState::new(app_version()),
        consent_reply: None,
        worker: None,
    };
    shell.render();

    loop {
        let mut changed = false;
        match events.recv_timeout(TICK) {
            Ok(ShellEvent::Line(line)) => {
                if let Flow::Quit = shell.handle_line(line.trim(), &relay) {
                    break;
                }
                changed = true;
            }
            Ok(ShellEvent::Consent { url, reply }) => {
                println!("Open this page, approve access, then paste the code here:");
                println!("{url}");
                shell.consent_reply = Some(reply);
            }
            Ok(ShellEvent::InputClosed) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if queue.drain_into(&mut shell.state) > 0 {
            changed = true;
        }
        if changed {
            shell.render();
        }
    }

    drop(events);
    shell.consent_reply = None;
    shell.finish();
    queue.drain_into(&mut shell.state);
    Ok(())
}

/// CLI entry point.
fn main() {
    init_tracing();
    if let Err(error) = run() {
        eprintln!(
            "failed to start photo-relay: {}",
            redact_sensitive(&error.to_string())
        );
        std::process::exit(1);
    }
}
