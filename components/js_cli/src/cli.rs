//! Command line arguments

use clap::Parser;

/// Run a compiled JavaScript program
#[derive(Debug, Parser)]
#[command(name = "jsvm", version)]
pub struct Cli {
    /// Serialized program to run
    pub file: String,

    /// Print the disassembly instead of running the program
    #[arg(short = 'd', long)]
    pub disassemble: bool,

    /// Allocations between automatic collections
    #[arg(long, value_name = "N")]
    pub gc_threshold: Option<usize>,

    /// Maximum call depth before a RangeError is raised
    #[arg(long, value_name = "N")]
    pub max_call_depth: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Runtime configuration selected by the flags
    pub fn runtime_config(&self) -> interpreter::RuntimeConfig {
        let mut config = interpreter::RuntimeConfig::new();
        if let Some(threshold) = self.gc_threshold {
            config = config.with_gc_threshold(threshold);
        }
        if let Some(depth) = self.max_call_depth {
            config = config.with_max_call_depth(depth);
        }
        config
    }

    /// Default log filter for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
