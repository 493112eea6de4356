//! pdftalk main entry point
//!
//! Loads a document in the background, attaches the native speech engine
//! and reads line commands from stdin. A console observer prints the page
//! indicator, the playback status and the text being read, or one JSON
//! object per event with `--json`.

use anyhow::{bail, Context};
use log::{debug, error, info, warn};
use pdftalk::config::Config;
use pdftalk::document::open_source;
use pdftalk::playback::{Event, Phase, PlaybackState, Player};
use pdftalk::speech::create_engine;
use pdftalk::TalkError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

const HELP: &str = "\
Commands:
  p      play / pause
  n      next page
  b      previous page
  s      stop
  g N    go to page N
  r N    rate (0-100)
  t N    pitch (0-100)
  v      list voices
  v N    select voice N
  i      show status
  q      quit";

struct Args {
    debug: bool,
    json: bool,
    document: PathBuf,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut debug = false;
    let mut json = false;
    let mut document = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--debug" | "-d" => debug = true,
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Usage: {} [--debug] [--json] <document>", pdftalk::APP_NAME);
                println!("{}", HELP);
                process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option {}", other),
            other => document = Some(PathBuf::from(other)),
        }
    }

    let Some(document) = document else {
        bail!("Usage: {} [--debug] [--json] <document>", pdftalk::APP_NAME);
    };
    Ok(Args {
        debug,
        json,
        document,
    })
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to pdftalk.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("pdftalk.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open pdftalk.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "pdftalk version {} starting (debug mode, logging to pdftalk.log)",
            pdftalk::VERSION
        );
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    init_logging(args.debug);

    if let Err(e) = run(args) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    info!("Config loaded from {:?}", config.path());

    let player = Player::spawn(config.playback_options()).context("starting playback")?;
    attach_console(&player, args.json, config.show_text())?;

    match create_engine() {
        Ok(engine) => player.attach_engine(engine)?,
        Err(e) => {
            warn!("Speech engine unavailable: {}", e);
            eprintln!("Speech is unavailable: {}", e);
        }
    }

    let source = open_source(&args.document)
        .with_context(|| format!("opening {}", args.document.display()))?;
    info!("Loading {}", source.describe());
    let load = player.spawn_load(source)?;

    if !args.json {
        println!("{} {} - type h for help", pdftalk::APP_NAME, pdftalk::VERSION);
    }

    command_loop(&player)?;

    player.shutdown()?;
    match load.join() {
        Ok(Err(e)) if !matches!(e, TalkError::LoadSuperseded | TalkError::Disconnected) => {
            warn!("Document load failed: {}", e);
        }
        Err(_) => error!("Loader thread panicked"),
        _ => {}
    }
    Ok(())
}

/// Print events as they happen
fn attach_console(player: &Player, json: bool, show_text: bool) -> anyhow::Result<()> {
    let reader = player.clone();
    let mut last_index = None;

    player.events().attach_observer(move |event: &Event| {
        if json {
            match event.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to encode event: {}", e),
            }
            return;
        }

        match event {
            Event::StateChanged(state) => {
                println!("[{}] {}", state.page_label(), status_line(state));
                if show_text && state.current_index != last_index {
                    if let Some(index) = state.current_index {
                        match reader.section(index) {
                            Ok(section) => {
                                println!("--- page {} ---", section.source_page);
                                println!("{}", section.text);
                            }
                            // The loop is shutting down
                            Err(e) => debug!("No text for section {}: {}", index, e),
                        }
                    }
                }
                last_index = state.current_index;
            }
            Event::HighlightRangeChanged { .. } => {}
            Event::EngineError { message } => eprintln!("Speech error: {}", message),
        }
    })?;
    Ok(())
}

fn status_line(state: &PlaybackState) -> String {
    let phase = match state.phase {
        Phase::Idle => "stopped",
        Phase::Playing => "playing",
        Phase::Paused => "paused",
        Phase::Finished => "finished",
    };
    let tts = if state.tts_ready { "" } else { " (no speech)" };
    format!(
        "{}{} rate {:.1}x pitch {:.1}x",
        phase,
        tts,
        state.settings.rate_multiplier(),
        state.settings.pitch_multiplier()
    )
}

/// Read commands from stdin until `q` or end of input
fn command_loop(player: &Player) -> anyhow::Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let arg = words.next().map(str::parse::<usize>);

        let result = match (command, arg) {
            ("q", _) => break,
            ("h", _) | ("?", _) => {
                println!("{}", HELP);
                Ok(())
            }
            ("p", None) => player.toggle_play_pause(),
            ("n", None) => player.next(),
            ("b", None) => player.prev(),
            ("s", None) => player.stop(),
            ("g", Some(Ok(page))) if page > 0 => player.seek(page - 1),
            ("r", Some(Ok(percent))) => player.set_rate(clamp_percent(percent)),
            ("t", Some(Ok(percent))) => player.set_pitch(clamp_percent(percent)),
            ("v", None) => list_voices(player),
            ("v", Some(Ok(index))) => player.set_voice(index),
            ("i", None) => player.snapshot().map(|state| {
                println!("[{}] {}", state.page_label(), status_line(&state));
            }),
            _ => {
                println!("Unknown command: {} (h for help)", line.trim());
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(TalkError::Disconnected) => return Err(TalkError::Disconnected.into()),
            Err(e) => println!("{}", e),
        }
        io::stdout().flush()?;
    }
    Ok(())
}

fn clamp_percent(value: usize) -> u8 {
    value.min(100) as u8
}

fn list_voices(player: &Player) -> pdftalk::Result<()> {
    let voices = player.voices()?;
    if voices.is_empty() {
        println!("No voices available");
    }
    let selected = player.snapshot()?.settings.voice_index;
    for (index, voice) in voices.iter().enumerate() {
        let marker = if index == selected { '*' } else { ' ' };
        println!("{} {:2} {}", marker, index, voice.label());
    }
    Ok(())
}
