use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use avqueue::{FfmpegLogLevel, Io, IoOptions, MediaKind, PipelineState, TimeBase};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  avqueue probe input.mp4 --json\n  avqueue drain input.mp4 --seek 0:00:10 --limit 240 --progress\n  avqueue dump-frame input.mp4 --at 12.5 --out frame.png\n  avqueue completions zsh > _avqueue";

/// How long a consumer waits for the pipeline before giving up.
const STALL_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Parser)]
#[command(
    name = "avqueue",
    version,
    about = "Inspect media files through the avqueue decode pipeline",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Print every frame and every recoverable error.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the selected streams of a media file.
    #[command(
        about = "Print stream information",
        visible_alias = "info",
        after_help = "Examples:\n  avqueue probe input.mp4\n  avqueue probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode a file through the queues and report what came out.
    #[command(
        about = "Drain decoded frames",
        after_help = "Examples:\n  avqueue drain input.mp4\n  avqueue drain input.mp4 --seek 01:30 --limit 100 --watermark 8"
    )]
    Drain {
        /// Input media path.
        input: PathBuf,
        /// Seek here before draining (seconds, MM:SS or HH:MM:SS).
        #[arg(long)]
        seek: Option<String>,
        /// Stop after this many video frames (or audio frames for audio-only input).
        #[arg(long)]
        limit: Option<u64>,
        /// Queue watermark in frames.
        #[arg(long, default_value_t = 100)]
        watermark: usize,
    },

    /// Save one decoded video frame as an image.
    #[command(
        about = "Save a video frame",
        after_help = "Examples:\n  avqueue dump-frame input.mp4 --out first.png\n  avqueue dump-frame input.mp4 --at 0:42 --out frame.png"
    )]
    DumpFrame {
        /// Input media path.
        input: PathBuf,
        /// Output image path (format from extension).
        #[arg(long)]
        out: PathBuf,
        /// Time of the frame (seconds, MM:SS or HH:MM:SS). Defaults to the first frame.
        #[arg(long)]
        at: Option<String>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds, trimmed);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds.parse::<f64>()?;
    let total = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    seconds_to_duration(total, trimmed)
}

/// Negative values clamp to zero; NaN, infinity and overflow are rejected.
fn seconds_to_duration(seconds: f64, input: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let seconds = if seconds < 0.0 { 0.0 } else { seconds };
    Duration::try_from_secs_f64(seconds)
        .map_err(|error| format!("invalid time value {input}: {error}").into())
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(value) = &global.log_level {
        let level = parse_log_level(value).ok_or_else(|| format!("unknown log level: {value}"))?;
        avqueue::set_ffmpeg_log_level(level);
    }
    Ok(())
}

fn seek_target(value: &str, time_base: TimeBase) -> Result<i64, Box<dyn std::error::Error>> {
    Ok(time_base.from_seconds(parse_timecode(value)?.as_secs_f64()))
}

/// Block until the decode thread has picked up the pending seek. Frames
/// popped after this point come from the new position.
fn wait_for_seek(io: &Io) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    while io.queue().lock().pending_seek().is_some() {
        if started.elapsed() > STALL_TIMEOUT {
            return Err("decode thread did not pick up the seek".into());
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

fn finished(io: &Io) -> bool {
    matches!(io.state(), PipelineState::Drained | PipelineState::Stopped)
        && io.queue().video_len() == 0
        && io.queue().audio_len() == 0
}

fn print_diagnostics(io: &Io, verbose: bool) {
    let diagnostics = io.diagnostics();
    let video_drops = diagnostics.dropped_packets(MediaKind::Video);
    let audio_drops = diagnostics.dropped_packets(MediaKind::Audio);
    let container_errors = diagnostics.container_errors();
    if video_drops + audio_drops + container_errors == 0 {
        return;
    }
    eprintln!(
        "{} dropped {video_drops} video and {audio_drops} audio packets, {container_errors} container errors",
        "warning:".yellow().bold()
    );
    if verbose {
        for error in diagnostics.drain() {
            eprintln!("  [{}] {error}", error.subsystem());
        }
    }
}

#[derive(Debug, Default)]
struct StreamTally {
    frames: u64,
    first: Option<i64>,
    last: Option<i64>,
}

impl StreamTally {
    fn record(&mut self, timestamp: i64) {
        self.frames += 1;
        self.first.get_or_insert(timestamp);
        self.last = Some(timestamp);
    }

    fn describe(&self, time_base: TimeBase) -> String {
        match (self.first, self.last) {
            (Some(first), Some(last)) => format!(
                "{} frames, {:.3}s to {:.3}s",
                self.frames,
                time_base.to_seconds(first),
                time_base.to_seconds(last)
            ),
            _ => "no frames".to_string(),
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { input, json } => {
            let io = Io::open(&input, IoOptions::default())?;
            let info = io.info();
            if json {
                let payload = json!({
                    "source": info.source,
                    "time_base": info.time_base.to_string(),
                    "duration_seconds": info.time_base.to_seconds(info.duration()),
                    "video": info.video.as_ref().map(|video| json!({
                        "stream_index": video.stream_index,
                        "width": video.width,
                        "height": video.height,
                        "fps": video.frame_rate.as_f64(),
                        "duration_seconds": info.time_base.to_seconds(video.duration),
                        "codec": video.codec,
                    })),
                    "audio": info.audio.as_ref().map(|audio| json!({
                        "stream_index": audio.stream_index,
                        "channels": audio.channels,
                        "sample_rate": audio.sample_rate,
                        "sample_format": audio.source_format,
                        "duration_seconds": info.time_base.to_seconds(audio.duration),
                        "codec": audio.codec,
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Source: {}", info.source);
                println!("Duration: {:.3}s", info.time_base.to_seconds(info.duration()));
                if let Some(video) = &info.video {
                    println!(
                        "Video: #{} {}x{} @ {} fps [{}]",
                        video.stream_index,
                        video.width,
                        video.height,
                        video.frame_rate,
                        video.codec,
                    );
                }
                if let Some(audio) = &info.audio {
                    println!(
                        "Audio: #{} {} Hz, {} ch, {} [{}]",
                        audio.stream_index,
                        audio.sample_rate,
                        audio.channels,
                        audio.source_format,
                        audio.codec,
                    );
                }
            }
        }
        Commands::Drain {
            input,
            seek,
            limit,
            watermark,
        } => {
            if limit == Some(0) {
                return Err("--limit must be greater than 0".into());
            }

            let io = Io::open(&input, IoOptions::new().with_watermark(watermark))?;
            let time_base = io.time_base();
            if let Some(value) = &seek {
                io.seek(seek_target(value, time_base)?);
                wait_for_seek(&io)?;
            }

            let progress_bar = if cli.global.progress {
                let total_ms = (time_base.to_seconds(io.info().duration()) * 1000.0) as u64;
                let pb = ProgressBar::new(total_ms);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} ms {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let counts_video = io.info().video.is_some();
            let mut video = StreamTally::default();
            let mut audio = StreamTally::default();
            let mut last_progress = Instant::now();

            loop {
                let mut idle = true;
                while let Some(frame) = io.queue().pop_video() {
                    idle = false;
                    video.record(frame.timestamp);
                    if cli.global.verbose {
                        println!("video {:>12} {}x{}", frame.timestamp, frame.width, frame.height);
                    }
                }
                for frame in io.queue().pop_audio_frames(usize::MAX) {
                    idle = false;
                    audio.record(frame.timestamp);
                    if cli.global.verbose {
                        println!(
                            "audio {:>12} {} samples {}",
                            frame.timestamp,
                            frame.sample_count(),
                            frame.info.sample_type
                        );
                    }
                }

                let reached = if counts_video { video.frames } else { audio.frames };
                if limit.is_some_and(|limit| reached >= limit) {
                    break;
                }

                if let Some(pb) = &progress_bar {
                    let latest = video.last.max(audio.last).unwrap_or(0);
                    pb.set_position((time_base.to_seconds(latest) * 1000.0).max(0.0) as u64);
                }

                if idle {
                    if finished(&io) {
                        break;
                    }
                    if last_progress.elapsed() > STALL_TIMEOUT {
                        return Err(format!("pipeline stalled in state {}", io.state()).into());
                    }
                    thread::sleep(POLL_INTERVAL);
                } else {
                    last_progress = Instant::now();
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!("{} {}", "Video:".bold(), video.describe(time_base));
            println!("{} {}", "Audio:".bold(), audio.describe(time_base));
            print_diagnostics(&io, cli.global.verbose);
        }
        Commands::DumpFrame { input, out, at } => {
            let io = Io::open(&input, IoOptions::new().with_video_watermark(2))?;
            if io.info().video.is_none() {
                return Err(format!("{} has no video stream", input.display()).into());
            }
            if let Some(value) = &at {
                io.seek(seek_target(value, io.time_base())?);
                wait_for_seek(&io)?;
            }

            let started = Instant::now();
            let frame = loop {
                if let Some(frame) = io.queue().pop_video() {
                    break frame;
                }
                if finished(&io) {
                    return Err("no video frame decoded at the requested position".into());
                }
                if started.elapsed() > STALL_TIMEOUT {
                    return Err(format!("pipeline stalled in state {}", io.state()).into());
                }
                thread::sleep(POLL_INTERVAL);
            };

            let image = frame
                .to_image()
                .ok_or("decoded frame does not match its declared size")?;
            image.save(&out)?;
            println!(
                "{} frame at {:.3}s to {}",
                "Saved".green().bold(),
                io.time_base().to_seconds(frame.timestamp),
                out.display()
            );
            print_diagnostics(&io, cli.global.verbose);
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "avqueue", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
