//! Interactive chat with revealed, spoken answers.

use crate::app::App;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::client::{
    AnswerService, AudioSink, AudioState, CommandSink, HttpAnswerService, LocalAnswerService,
    Message, MessageId, NullSink, Sender, Session, SessionOptions, TransportEvent, Update,
};
use crate::config::{Prompts, Settings};
use anyhow::Result;
use console::style;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run the interactive chat command.
///
/// `server` selects a remote `savor serve` instance; an empty value means
/// the configured `client.server_url`.
pub async fn run_chat(
    server: Option<String>,
    token: Option<String>,
    mute: bool,
    settings: Settings,
) -> Result<()> {
    let (service, prompts): (Arc<dyn AnswerService>, Prompts) = match server {
        Some(url) => {
            let url = if url.trim().is_empty() {
                settings.client.server_url.clone()
            } else {
                url
            };
            let token = token.or_else(|| settings.client.token.clone());
            let prompts = Prompts::load(
                settings.prompts.custom_dir.as_deref(),
                Some(&settings.prompts.variables),
            )?;
            Output::info(&format!("Connecting to {}", url));
            let service = HttpAnswerService::new(&url, token, settings.request_timeout())?;
            (Arc::new(service), prompts)
        }
        None => {
            if let Err(e) = preflight::check(Operation::Ask, &settings) {
                Output::error(&format!("{}", e));
                Output::info("Use --server to chat through a running `savor serve`.");
                return Err(e.into());
            }
            let app = App::new(settings.clone())?;
            let service = LocalAnswerService::new(Arc::new(app.engine()), app.speech());
            (Arc::new(service), app.prompts().clone())
        }
    };

    let player = settings.client.player.clone();
    let player_args = settings.client.player_args.clone();
    let mut session = Session::new(
        service,
        &prompts.rag.greeting,
        &prompts.rag.apology,
        SessionOptions::from(&settings.client),
        move |ended| -> Box<dyn AudioSink> {
            if mute {
                Box::new(NullSink::new(ended))
            } else {
                Box::new(CommandSink::new(&player, &player_args, ended))
            }
        },
    );

    println!("\n{}", style("Savor Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about the menu. Commands: /pause, /replay, /play <id>, /quit").dim()
    );

    let mut view = ChatView::default();
    let mut stdout = std::io::stdout();
    for message in session.transcript().messages() {
        print!("{}", view.message(message));
    }
    stdout.flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let wake = tokio::select! {
            line = lines.next_line() => Wake::Line(line?),
            update = session.next_update() => Wake::Update(update),
        };

        match wake {
            Wake::Line(None) => break,
            Wake::Line(Some(line)) => match parse_input(&line) {
                Input::Empty => {}
                Input::Quit => break,
                Input::Pause if session.playback().is_idle() => {
                    print!("{}", view.note("nothing is playing"));
                }
                Input::Pause => report(&mut view, session.pause_or_resume()),
                Input::Replay => report(&mut view, session.replay()),
                Input::Play(id) => report(&mut view, session.play_message(id)),
                Input::Unknown(command) => {
                    Output::warning(&format!("Unknown command: {}", command));
                }
                Input::Query(query) => {
                    session.submit(&query);
                }
            },
            Wake::Update(None) => break,
            Wake::Update(Some(update)) => {
                let out = match update {
                    Update::Message(id) => match session.transcript().get(id) {
                        Some(message) => view.message(message),
                        None => String::new(),
                    },
                    Update::Transport(event) => view.transport(&event),
                    Update::PlaybackFailed(error) => view.note(&format!("playback failed: {}", error)),
                };
                print!("{}", out);
            }
        }
        stdout.flush()?;
    }

    Output::info("Goodbye!");
    Ok(())
}

enum Wake {
    Line(Option<String>),
    Update(Option<Update>),
}

fn report(view: &mut ChatView, result: crate::error::Result<Option<TransportEvent>>) {
    match result {
        Ok(Some(event)) => print!("{}", view.transport(&event)),
        Ok(None) => {}
        Err(e) => Output::warning(&e.to_string()),
    }
}

#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Pause,
    Replay,
    Play(MessageId),
    Unknown(String),
    Query(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Query(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit" | "exit"), None) => Input::Quit,
        (Some("pause"), None) => Input::Pause,
        (Some("replay"), None) => Input::Replay,
        (Some("play"), Some(id)) => match id.parse() {
            Ok(id) => Input::Play(MessageId(id)),
            Err(_) => Input::Unknown(line.to_string()),
        },
        _ => Input::Unknown(line.to_string()),
    }
}

/// Turns transcript changes into terminal output.
///
/// Only one assistant line is typed at a time; notes arriving while it is
/// open are held back until it closes.
#[derive(Default)]
struct ChatView {
    shown: HashMap<MessageId, usize>,
    audio: HashMap<MessageId, AudioState>,
    open: Option<MessageId>,
    held: Vec<String>,
}

impl ChatView {
    fn message(&mut self, message: &Message) -> String {
        let mut out = String::new();
        if message.sender == Sender::User {
            return out;
        }

        let shown = self.shown.get(&message.id).copied().unwrap_or(0);
        let total = message.text.chars().count();
        if total > shown {
            if self.open != Some(message.id) {
                if self.open.take().is_some() {
                    out.push('\n');
                }
                out.push_str(&format!("{} ", style(format!("Savor [{}]:", message.id)).cyan().bold()));
                self.open = Some(message.id);
            }
            out.extend(message.text.chars().skip(shown));
            self.shown.insert(message.id, total);
        }

        let previous = self.audio.insert(message.id, message.audio_state);
        if previous.is_some_and(|p| p != message.audio_state) {
            match message.audio_state {
                AudioState::Ready => {
                    self.held.push(format!("speech ready, /play {}", message.id));
                }
                AudioState::Error if total > 0 && message.final_text().is_some() => {
                    self.held.push(format!("no speech for message {}", message.id));
                }
                _ => {}
            }
        }

        if self.open == Some(message.id) && message.is_fully_revealed() {
            self.open = None;
            out.push('\n');
        }
        if self.open.is_none() {
            out.push_str(&self.flush_held());
        }
        out
    }

    fn transport(&mut self, event: &TransportEvent) -> String {
        let text = match event {
            TransportEvent::Started(id) => format!("playing {}", id),
            TransportEvent::Paused(id) => format!("paused {}", id),
            TransportEvent::Resumed(id) => format!("resumed {}", id),
            TransportEvent::Ended(_) => return String::new(),
        };
        self.note(&text)
    }

    fn note(&mut self, text: &str) -> String {
        self.held.push(text.to_string());
        if self.open.is_some() {
            return String::new();
        }
        self.flush_held()
    }

    fn flush_held(&mut self) -> String {
        self.held
            .drain(..)
            .map(|note| format!("  {}\n", style(format!("({})", note)).dim()))
            .collect()
    }
}
