use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dockarm-sim")]
#[command(about = "Headless charger docking simulation for a seven-joint arm")]
pub struct Cli {
    /// Who drives the arm toward the socket
    #[arg(short, long, value_enum, default_value_t = Mode::Policy)]
    pub mode: Mode,

    /// Session configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Persistent joint limit file (JSON)
    #[arg(short, long)]
    pub limits: Option<PathBuf>,

    /// Number of control ticks to run
    #[arg(short, long, default_value_t = 2000)]
    pub ticks: u64,

    /// Write one JSON telemetry record per tick to this file
    #[arg(long)]
    pub telemetry: Option<PathBuf>,

    /// Seed for the socket placement jitter
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Maximum socket placement jitter per axis (meters)
    #[arg(long, default_value_t = 0.0, value_parser = parse_jitter)]
    pub socket_jitter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// IK tracks the standoff pose; no policy actions
    Standoff,
    /// The task phase machine scripts approach and insertion
    Scripted,
    /// IK to the hand-off radius, then the scripted policy takes over
    Policy,
}

impl Cli {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

fn parse_jitter(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("jitter must be a finite distance >= 0, got {}", s))
    }
}
