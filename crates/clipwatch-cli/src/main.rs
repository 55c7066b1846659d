mod config;
mod config_cmd;
mod sink;

use clap::{Args, Parser, Subcommand};
use clipwatch_core::clock::{Clock, ManualClock, SystemClock};
use clipwatch_core::detect::ClipDetector;
use clipwatch_core::detect::scoring::ScoringEngine;
use clipwatch_core::error::SourceError;
use clipwatch_core::matcher::KeywordMatcher;
use clipwatch_core::source::irc::{IrcSource, TwitchIrc};
use clipwatch_core::source::vod::VodChat;
use clipwatch_core::source::{ChatSource, LineStream};
use clipwatch_core::types::{ChatMessage, PipelineStats};
use clipwatch_core::wire;
use config::{Config, ConfigPaths};
use sink::ClipSink;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "clipwatch", version, about = "clip detection over livestream chat")]
struct Cli {
    /// Config file path [default: ~/.clipwatch/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append emitted clips to this file as well as stdout
    #[arg(long, global = true)]
    clips_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Stream live chat from a Twitch channel through the detector
    Irc(IrcArgs),
    /// Fetch archived VOD chat and replay it through the detector
    Vod(VodArgs),
    /// Inspect or edit the configuration
    Config(config_cmd::ConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Read chat from a file instead of stdin
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct IrcArgs {
    /// Channel to join
    #[arg(long)]
    channel: String,

    /// OAuth token (or TWITCH_OAUTH env)
    #[arg(long)]
    oauth: Option<String>,

    /// Username (or TWITCH_USERNAME env)
    #[arg(long)]
    username: Option<String>,

    /// Read-only login without credentials
    #[arg(long)]
    anonymous: bool,

    /// End the run after this much chat silence
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Print wire-format chat lines instead of running detection
    #[arg(long)]
    dump: bool,
}

#[derive(Args, Debug, Clone)]
struct VodArgs {
    /// VOD id to fetch chat for
    #[arg(long)]
    video: u64,

    /// Save fetched chat as wire-format lines instead of detecting
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print wire-format chat lines instead of running detection
    #[arg(long)]
    dump: bool,

    /// Override the Twitch Client-ID
    #[arg(long)]
    client_id: Option<String>,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let paths = match cli.config.clone() {
        Some(path) => ConfigPaths::from_file(path),
        None => match ConfigPaths::from_home() {
            Ok(paths) => paths,
            Err(err) => {
                eprintln!("config paths error: {err}");
                std::process::exit(1);
            }
        },
    };

    // The config subcommand must keep working even when the current file
    // fails validation, so it dispatches before the load-and-validate.
    if let Some(Command::Config(args)) = &cli.command {
        if let Err(err) = config_cmd::run(args, &paths) {
            eprintln!("config failed: {err}");
            std::process::exit(1);
        }
        return;
    }

    let config = match Config::load_or_create(&paths) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load failed: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("invalid config: {err}");
        std::process::exit(1);
    }

    let clips_file = cli.clips_file.clone();
    let result = match cli.command {
        Some(Command::Irc(args)) => run_irc(&config, &args, clips_file.as_deref()),
        Some(Command::Vod(args)) => run_vod(&config, &args, clips_file.as_deref()),
        Some(Command::Config(_)) => unreachable!("handled before config load"),
        None => run_stream(&config, &cli.run, clips_file.as_deref()),
    };

    if let Err(message) = result {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_detector(config: &Config, clock: Arc<dyn Clock>) -> ClipDetector {
    let mut matcher = KeywordMatcher::new(config.matcher.similarity_threshold);
    for category in &config.keywords {
        matcher.add_category(category.clone());
    }
    let scoring = ScoringEngine::new(config.scoring_config());

    ClipDetector::new(
        config.detector_config(),
        Arc::new(matcher),
        Arc::new(scoring),
        clock,
    )
}

fn attach_sink(
    detector: &mut ClipDetector,
    clips_file: Option<&Path>,
    stats: &PipelineStats,
) -> Result<(), String> {
    let mut sink = ClipSink::new(clips_file, stats.clone())
        .map_err(|err| format!("could not open clips file: {err}"))?;
    detector.on_clip(Box::new(move |event| sink.emit(event)));
    Ok(())
}

/// Drive the pipeline from a replayable source, advancing the detector
/// clock to each message timestamp: detection runs in stream time, never
/// against the host clock.
fn pump_replay<S: ChatSource>(
    source: &mut S,
    detector: &mut ClipDetector,
    stats: &PipelineStats,
    clock: &ManualClock,
) -> Result<(), SourceError> {
    while let Some(message) = source.next_message()? {
        stats.inc_messages_ingested();
        if message.timestamp_ms > clock.now_ms() {
            clock.set(message.timestamp_ms);
        }
        detector.process_message(message);
    }
    Ok(())
}

fn pump_live<S: ChatSource>(
    source: &mut S,
    detector: &mut ClipDetector,
    stats: &PipelineStats,
) -> Result<(), SourceError> {
    while let Some(message) = source.next_message()? {
        stats.inc_messages_ingested();
        detector.process_message(message);
    }
    Ok(())
}

fn run_stream(config: &Config, args: &RunArgs, clips_file: Option<&Path>) -> Result<(), String> {
    let stats = PipelineStats::new();
    let clock = Arc::new(ManualClock::default());
    let mut detector = build_detector(config, clock.clone());
    attach_sink(&mut detector, clips_file, &stats)?;

    let result = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| format!("could not open {}: {err}", path.display()))?;
            let mut source = LineStream::new(BufReader::new(file), stats.clone());
            pump_replay(&mut source, &mut detector, &stats, &clock)
        }
        None => {
            let stdin = io::stdin();
            let mut source = LineStream::new(stdin.lock(), stats.clone());
            pump_replay(&mut source, &mut detector, &stats, &clock)
        }
    };
    result.map_err(|err| err.to_string())?;

    report_stats(&stats);
    Ok(())
}

fn run_irc(config: &Config, args: &IrcArgs, clips_file: Option<&Path>) -> Result<(), String> {
    let mut irc = TwitchIrc::connect(&config.irc.host, config.irc.port)
        .map_err(|err| format!("IRC connect failed: {err}"))?;

    if args.anonymous {
        irc.authenticate_anonymous()
            .map_err(|err| format!("IRC login failed: {err}"))?;
    } else {
        let env_oauth = std::env::var("TWITCH_OAUTH").ok();
        let env_username = std::env::var("TWITCH_USERNAME").ok();
        let oauth = first_non_empty(&[
            args.oauth.as_deref(),
            env_oauth.as_deref(),
            Some(config.irc.oauth.as_str()),
        ]);
        let username = first_non_empty(&[
            args.username.as_deref(),
            env_username.as_deref(),
            Some(config.irc.username.as_str()),
        ]);

        match (oauth, username) {
            (Some(oauth), Some(username)) => irc
                .authenticate(&oauth, &username)
                .map_err(|err| format!("IRC login failed: {err}"))?,
            _ => {
                return Err(
                    "IRC credentials missing: pass --oauth/--username, set \
                     TWITCH_OAUTH/TWITCH_USERNAME, or use --anonymous"
                        .into(),
                );
            }
        }
    }

    irc.join(&args.channel)
        .map_err(|err| format!("IRC join failed: {err}"))?;

    let mut source = IrcSource::new(irc, Duration::from_millis(args.timeout_ms));

    if args.dump {
        return dump_messages(&mut source);
    }

    let stats = PipelineStats::new();
    let mut detector = build_detector(config, Arc::new(SystemClock));
    attach_sink(&mut detector, clips_file, &stats)?;
    pump_live(&mut source, &mut detector, &stats).map_err(|err| err.to_string())?;

    report_stats(&stats);
    Ok(())
}

fn run_vod(config: &Config, args: &VodArgs, clips_file: Option<&Path>) -> Result<(), String> {
    let client_id = args.client_id.as_deref().unwrap_or(&config.vod.client_id);
    let fetcher = VodChat::with_client_id(client_id);

    eprintln!("fetching chat for video {}", args.video);
    let mut report = |count: usize| {
        eprint!("\rfetched {count} messages");
        let _ = io::stderr().flush();
    };
    let messages = fetcher
        .fetch(args.video, Some(&mut report))
        .map_err(|err| format!("VOD fetch failed: {err}"))?;
    eprintln!("\rfetched {} messages", messages.len());

    if let Some(path) = &args.output {
        save_wire_lines(path, &messages)
            .map_err(|err| format!("could not write {}: {err}", path.display()))?;
        eprintln!("saved to {}", path.display());
        return Ok(());
    }

    if args.dump {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for message in &messages {
            if writeln!(out, "{}", wire::format_line(message)).is_err() {
                break;
            }
        }
        return Ok(());
    }

    // Replay the archive through the detector in stream time.
    let stats = PipelineStats::new();
    let clock = Arc::new(ManualClock::default());
    let mut detector = build_detector(config, clock.clone());
    attach_sink(&mut detector, clips_file, &stats)?;
    for message in messages {
        stats.inc_messages_ingested();
        if message.timestamp_ms > clock.now_ms() {
            clock.set(message.timestamp_ms);
        }
        detector.process_message(message);
    }

    report_stats(&stats);
    Ok(())
}

fn dump_messages<S: ChatSource>(source: &mut S) -> Result<(), String> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    while let Some(message) = source.next_message().map_err(|err| err.to_string())? {
        if writeln!(out, "{}", wire::format_line(&message)).is_err() {
            break;
        }
    }
    Ok(())
}

fn save_wire_lines(path: &Path, messages: &[ChatMessage]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for message in messages {
        writeln!(writer, "{}", wire::format_line(message))?;
    }
    writer.flush()
}

fn report_stats(stats: &PipelineStats) {
    tracing::info!(
        messages = stats.messages_ingested(),
        skipped = stats.lines_skipped(),
        clips = stats.clips_emitted(),
        "stream finished"
    );
}

fn first_non_empty(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
