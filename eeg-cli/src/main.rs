mod config;
mod logging;
mod telemetry;

use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use config::CliConfig;
use eeg_core::config::SinkKind;
use eeg_core::logging::SignalLogger;
use eeg_core::serial::{find_port_by_name_hint, open_serial, SerialSource, SerialTransport};
use eeg_core::sinks::{random_uid_source, BusSession, BusSink, TextSink};
use eeg_core::Pipeline;
use logging::{LogEvent, StructuredLogger};
use telemetry::RatioTelemetryAggregator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Unicorn EEG-to-audio streaming bridge", long_about = None)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: String,

    /// Override the configured serial port.
    #[arg(short, long)]
    port: Option<String>,

    /// Enable verbose diagnostic output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut cli_config =
        CliConfig::from_file(&args.config).wrap_err_with(|| format!("Failed to load config from {}", args.config))?;

    if let Some(port) = args.port {
        cli_config.stream.serial.port = Some(port);
    }
    if args.verbose {
        cli_config.terminal.logging.level = config::LogLevel::Debug;
    }

    let mut event_logger = StructuredLogger::new(cli_config.terminal.logging.clone())?;
    let mut signal_logger = SignalLogger::new(cli_config.terminal.logging.to_core_log_config());

    event_logger.log(LogEvent::Info {
        message: "starting EEG streaming session".to_string(),
    })?;

    let port = match &cli_config.stream.serial.port {
        Some(p) => p.clone(),
        None => find_port_by_name_hint().wrap_err("failed to locate a serial port")?,
    };

    event_logger.log(LogEvent::Info { message: format!("opening {port}") })?;

    let transport = open_serial(&port).wrap_err_with(|| format!("failed to open {port}"))?;

    match cli_config.stream.sink.kind {
        SinkKind::Audio => run_audio_sink(cli_config, transport, &mut signal_logger, &mut event_logger),
        SinkKind::Text | SinkKind::Bus => {
            run_decode_only_sink(cli_config, transport, &mut signal_logger, &mut event_logger)
        }
    }
}

/// Drives the full audio pipeline: filtered, resampled, ratio-controlled
/// real-time playback.
fn run_audio_sink(
    cli_config: CliConfig,
    transport: Box<dyn SerialTransport>,
    signal_logger: &mut SignalLogger,
    event_logger: &mut StructuredLogger,
) -> Result<()> {
    let pipeline =
        Pipeline::start(cli_config.stream.clone(), transport, signal_logger).wrap_err("failed to start pipeline")?;

    event_logger.log(LogEvent::Info {
        message: "pipeline running; press Ctrl+C to stop".to_string(),
    })?;

    let mut telemetry = RatioTelemetryAggregator::new(cli_config.terminal.telemetry_interval_secs);

    // Signal handling is out of scope: the process runs until killed, and
    // the pipeline's `Drop` impl tears down the stream and producer thread
    // on any orderly unwind (e.g. from an error returned above).
    loop {
        std::thread::sleep(Duration::from_millis(100));
        if let Some(event) = telemetry.sample(
            pipeline.current_ratio(),
            pipeline.output_limit(),
            pipeline.frames_dropped(),
            pipeline.frames_decoded(),
            pipeline.framing_errors(),
        ) {
            event_logger.log(LogEvent::Ratio(event))?;
        }
    }
}

/// Drives the text or streaming-bus sink: handshake, warm up, then decode
/// and hand off each raw sample directly, bypassing the filter, resampler,
/// and ratio controller entirely (those are audio-only concerns).
fn run_decode_only_sink(
    cli_config: CliConfig,
    transport: Box<dyn SerialTransport>,
    signal_logger: &mut SignalLogger,
    event_logger: &mut StructuredLogger,
) -> Result<()> {
    let config = &cli_config.stream;
    config.validate().wrap_err("invalid configuration")?;

    let mut source = SerialSource::new(transport);

    signal_logger.info("SERIAL", "handshaking");
    source.start_acquisition().wrap_err("handshake failed")?;

    signal_logger.info("SERIAL", format!("warmup: discarding {} frames", config.pipeline.warmup_frames));
    for _ in 0..config.pipeline.warmup_frames {
        source.pull_frame().wrap_err("failed during warmup")?;
    }

    match config.sink.kind {
        SinkKind::Text => {
            let path = config
                .sink
                .text_path
                .as_ref()
                .expect("validated above: text sink always carries a text_path");
            let mut sink = TextSink::create(path).wrap_err("failed to open text sink")?;
            event_logger.log(LogEvent::Info { message: format!("writing decoded samples to {}", path.display()) })?;

            let mut last_report = Instant::now();
            loop {
                let sample = source.pull_frame().wrap_err("transport failure")?;
                sink.write_sample(&sample).wrap_err("failed to write sample")?;
                sink.flush().wrap_err("failed to flush text sink")?;
                maybe_report_counters(&source, event_logger, &mut last_report, cli_config.terminal.telemetry_interval_secs)?;
            }
        }
        SinkKind::Bus => {
            let session = BusSession::new(random_uid_source);
            let (sink, _receiver) = BusSink::new(session, config.pipeline.input_buffer_frames());
            event_logger.log(LogEvent::Info {
                message: format!("streaming-bus session {} started", sink.session().session_id),
            })?;

            let mut last_report = Instant::now();
            loop {
                let sample = source.pull_frame().wrap_err("transport failure")?;
                sink.publish(sample);
                maybe_report_counters(&source, event_logger, &mut last_report, cli_config.terminal.telemetry_interval_secs)?;
            }
        }
        SinkKind::Audio => unreachable!("run_decode_only_sink is only called for Text/Bus sinks"),
    }
}

/// Log the serial source's telemetry counters once per `interval_secs`,
/// mirroring the audio path's periodic ratio telemetry.
fn maybe_report_counters<T: SerialTransport>(
    source: &SerialSource<T>,
    event_logger: &mut StructuredLogger,
    last_report: &mut Instant,
    interval_secs: f64,
) -> Result<()> {
    if last_report.elapsed().as_secs_f64() < interval_secs {
        return Ok(());
    }
    *last_report = Instant::now();
    event_logger.log(LogEvent::Info {
        message: format!(
            "decoded={} dropped={} framing_errors={}",
            source.frames_decoded(),
            source.frames_dropped(),
            source.framing_errors()
        ),
    })
}
