use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use confique::Config;
use crossbeam_channel::tick;
use dgtz_control::*;
use log::{info, warn, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::{fs::File, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(version, about = "Register-level control of V1720-family digitizers")]
struct Cli {
    /// Board configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Use the in-memory simulated board instead of the hardware library
    #[arg(long)]
    simulate: bool,

    /// Also log to this file (`auto` picks a dated name)
    #[arg(long)]
    log_file: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the link and print the board identification
    Info,
    /// Write the baseline register set
    Init,
    /// Apply the trigger and acquisition settings of the configuration file
    Configure,
    /// Print buffer status and stored event count once
    Status,
    /// Poll buffer status and event count periodically
    Monitor {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many polls
        #[arg(long)]
        count: Option<usize>,
    },
    /// Log every named register
    Dump,
    /// Read one register
    Read {
        #[arg(value_parser = parse_u32)]
        address: u32,
    },
    /// Write one register
    Write {
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(value_parser = parse_u32)]
        value: u32,
    },
}

fn default_log_path() -> PathBuf {
    let now = time::OffsetDateTime::now_utc();
    PathBuf::from(format!(
        "dgtz_control_{}{:02}{:02}_{:02}{:02}{:02}.log",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    ))
}

fn init_logging(verbose: u8, log_file: Option<&str>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let log_config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let path = match path {
            "auto" => default_log_path(),
            other => PathBuf::from(other),
        };
        let file = File::create(&path)
            .with_context(|| format!("couldn't create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, log_config, file));
    }
    CombinedLogger::init(loggers).context("logger already initialized")?;
    Ok(())
}

fn print_buffer_status<T: BusTransport>(board: &mut BoardConnection<T>) -> Result<()> {
    let full = board.check_buffer_status()?;
    let events = board.num_fpga_events()?;
    let full_channels: Vec<usize> = full
        .iter()
        .enumerate()
        .filter_map(|(ch, &is_full)| is_full.then_some(ch))
        .collect();
    info!(
        "Board {}: events stored: {}\tfull buffers: {:?}",
        board.board_id(),
        events,
        full_channels
    );
    Ok(())
}

fn execute<T: BusTransport>(
    board: &mut BoardConnection<T>,
    command: &Command,
    config: &Conf,
) -> Result<()> {
    match command {
        Command::Info => {
            if let Some(identity) = board.identity() {
                println!("{identity}");
            }
            println!("Enabled channels: 0x{:02X}", board.enabled_channel_mask()?);
        }
        Command::Init => board.initialize()?,
        Command::Configure => configure_board(board, config)?,
        Command::Status => print_buffer_status(board)?,
        Command::Monitor { interval_ms, count } => {
            let ticker = tick(Duration::from_millis(*interval_ms));
            let mut polls = 0;
            while count.map_or(true, |n| polls < n) {
                ticker.recv().context("monitor ticker closed")?;
                print_buffer_status(board)?;
                polls += 1;
            }
        }
        Command::Dump => log_all(std::slice::from_mut(board)),
        Command::Read { address } => {
            let value = board.get_register(*address)?;
            println!("0x{address:04X}: 0x{value:08X}");
        }
        Command::Write { address, value } => {
            board.set_register(*address, *value)?;
            println!("0x{address:04X} <- 0x{value:08X}");
        }
    }
    Ok(())
}

fn run<T: BusTransport>(transport: T, cli: &Cli, config: &Conf) -> Result<()> {
    let mut board = config.link.connection(transport);
    board
        .open_link()
        .map_err(|e| anyhow!("couldn't open board {}: {e}", board.board_id()))?;

    let result = execute(&mut board, &cli.command, config);
    if let Err(ref e) = result {
        warn!("Board {}: {e} (status {})", board.board_id(), board.last_status());
    }
    board.close_link()?;
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = Conf::builder()
        .file(&cli.config)
        .load()
        .with_context(|| format!("couldn't load {}", cli.config.display()))?;

    #[cfg(feature = "caen")]
    {
        if !cli.simulate {
            return run(CaenTransport, &cli, &config);
        }
    }

    if !cli.simulate && !cfg!(feature = "caen") {
        warn!("Built without the `caen` feature, using the simulated board");
    }
    run(SimulatedTransport::default(), &cli, &config)
}
