use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Instant,
};

use clap::{Parser, Subcommand};
use pose_reveal_core::{
    AppConfig, AssetResolver, ClipProfile, GuessOutcome, GuessingGame, HostClock,
    PoseRevealError, Roster, SimulatedProvider,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

type Game = GuessingGame<SimulatedProvider>;

fn main() -> pose_reveal_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Sources { player, clip } => run_sources(&config, &player, clip),
        Commands::Simulate {
            roster,
            guesses,
            reject_playback,
            overlay_rate,
            load_ms,
            think_ms,
            step_ms,
        } => {
            let media = MediaArgs {
                reject_playback,
                overlay_rate,
                load_ms,
            };
            run_simulate(&config, roster.as_deref(), &guesses, &media, think_ms, step_ms)
        }
        Commands::Play { roster, step_ms } => run_play(&config, roster.as_deref(), step_ms),
    }
}

fn load_config(path: Option<&PathBuf>) -> pose_reveal_core::Result<AppConfig> {
    let config = match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run_sources(
    config: &AppConfig,
    player: &str,
    clip: Option<u32>,
) -> pose_reveal_core::Result<()> {
    let resolver = AssetResolver::new(config.assets.clone())?;
    let sources = resolver.clip_sources(player, clip.unwrap_or(config.assets.clip_number))?;
    println!("{}", serde_json::to_string_pretty(&sources)?);
    Ok(())
}

struct MediaArgs {
    reject_playback: bool,
    overlay_rate: f64,
    load_ms: u64,
}

fn build_game(
    config: &AppConfig,
    roster: Option<&str>,
    media: &MediaArgs,
    now_ms: u64,
) -> pose_reveal_core::Result<Game> {
    let roster = match roster {
        Some(list) => Roster::parse(list)?,
        None => {
            config.validate_roster()?;
            Roster::new(config.roster.clone())?
        }
    };

    let primary = ClipProfile {
        load_ms: media.load_ms,
        reject_playback: media
            .reject_playback
            .then(|| "play() request was not allowed by the user agent".to_string()),
        ..ClipProfile::default()
    };
    let overlay = ClipProfile {
        load_ms: media.load_ms,
        rate: media.overlay_rate,
        ..ClipProfile::default()
    };

    GuessingGame::new(config, roster, SimulatedProvider::new(primary, overlay), now_ms)
}

/// Advances simulated time in `step_ms` slices, ticking the game after each.
fn advance(
    game: &mut Game,
    clock: &mut HostClock,
    total_ms: u64,
    step_ms: u64,
) -> pose_reveal_core::Result<()> {
    let step_ms = step_ms.max(1);
    let mut elapsed = 0;
    while elapsed < total_ms {
        let slice = step_ms.min(total_ms - elapsed);
        game.widget().provider().step_all(slice);
        let now = clock.advance(slice);
        game.tick(now)?;
        elapsed += slice;
        emit(game, now)?;
    }
    Ok(())
}

fn emit(game: &mut Game, now_ms: u64) -> pose_reveal_core::Result<()> {
    for event in game.drain_sync_events() {
        println!("{}", serde_json::to_string(&json!({ "at_ms": now_ms, "sync": event }))?);
    }
    for notification in game.drain_notifications() {
        println!(
            "{}",
            serde_json::to_string(&json!({ "at_ms": now_ms, "game": notification }))?
        );
    }
    Ok(())
}

fn parse_guesses(list: &str) -> pose_reveal_core::Result<Vec<&str>> {
    let guesses: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|guess| !guess.is_empty())
        .collect();
    if guesses.is_empty() {
        return Err(PoseRevealError::msg("--guesses must name at least one player"));
    }
    Ok(guesses)
}

fn run_simulate(
    config: &AppConfig,
    roster: Option<&str>,
    guesses: &str,
    media: &MediaArgs,
    think_ms: u64,
    step_ms: u64,
) -> pose_reveal_core::Result<()> {
    let guesses = parse_guesses(guesses)?;
    tracing::info!(count = guesses.len(), "running scripted session");

    let mut clock = HostClock::start();
    let mut game = build_game(config, roster, media, clock.now_ms())?;
    emit(&mut game, clock.now_ms())?;

    for guess in guesses {
        advance(&mut game, &mut clock, think_ms, step_ms)?;
        game.reveal_more();
        game.submit_guess(guess, clock.now_ms());
        emit(&mut game, clock.now_ms())?;
    }

    advance(&mut game, &mut clock, think_ms, step_ms)?;
    let view = json!({ "at_ms": clock.now_ms(), "view": game.view() });
    println!("{}", serde_json::to_string(&view)?);
    game.teardown();
    emit(&mut game, clock.now_ms())
}

fn run_play(
    config: &AppConfig,
    roster: Option<&str>,
    step_ms: u64,
) -> pose_reveal_core::Result<()> {
    const MAX_CATCH_UP_MS: u64 = 10_000;

    let media = MediaArgs {
        reject_playback: false,
        overlay_rate: 1.0,
        load_ms: ClipProfile::default().load_ms,
    };
    let mut clock = HostClock::start();
    let mut game = build_game(config, roster, &media, clock.now_ms())?;
    let mut last_input = Instant::now();

    println!("+ reveal more, - reveal less, ? show state, q quit; anything else is a guess");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let waited = (last_input.elapsed().as_millis() as u64).min(MAX_CATCH_UP_MS);
        last_input = Instant::now();
        advance(&mut game, &mut clock, waited, step_ms)?;

        match line.trim() {
            "q" => break,
            "+" => println!("reveal step {}", game.reveal_more()),
            "-" => println!("reveal step {}", game.reveal_less()),
            "?" => println!("{}", serde_json::to_string_pretty(&game.view())?),
            guess => match game.submit_guess(guess, clock.now_ms()) {
                GuessOutcome::Correct => println!("correct!"),
                GuessOutcome::Incorrect => println!("nope, try again"),
                GuessOutcome::Ignored => println!("hang on, next player is loading"),
            },
        }
        emit(&mut game, clock.now_ms())?;
        io::stdout().flush()?;
    }

    game.teardown();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Guess the player from a progressively revealed pose overlay", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the raw and overlay clip URLs for a player.
    Sources {
        player: String,
        #[arg(long)]
        clip: Option<u32>,
    },
    /// Run a scripted guessing session against simulated media.
    Simulate {
        /// Comma separated roster, overriding the configuration.
        #[arg(short, long)]
        roster: Option<String>,
        /// Comma separated guesses, submitted in order.
        #[arg(short, long)]
        guesses: String,
        /// Make the environment refuse to start the primary clip.
        #[arg(long)]
        reject_playback: bool,
        /// Overlay playback speed relative to the primary clip.
        #[arg(long, default_value_t = 1.0)]
        overlay_rate: f64,
        #[arg(long, default_value_t = 120)]
        load_ms: u64,
        /// Simulated time between guesses.
        #[arg(long, default_value_t = 1_500)]
        think_ms: u64,
        #[arg(long, default_value_t = 50)]
        step_ms: u64,
    },
    /// Play interactively on stdin.
    Play {
        #[arg(short, long)]
        roster: Option<String>,
        #[arg(long, default_value_t = 50)]
        step_ms: u64,
    },
}
