//! CLI argument parsing

use std::time::Duration;

use clap::{Args, Parser};
use pktstat_capture::{CaptureConfig, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "pktstat")]
#[command(version, about = "Per-flow packet and byte counters for live traffic", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CaptureArgs {
    /// Network interface to capture packets from
    #[arg(short, long)]
    pub interface: String,

    /// Snap length for packet capture
    #[arg(
        short,
        long,
        default_value_t = 65535,
        value_parser = clap::value_parser!(i32).range(1..)
    )]
    pub snaplen: i32,

    /// Seconds between two statistics reports
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub report_interval: u64,

    /// Records buffered between capture and aggregation
    #[arg(
        long,
        value_name = "RECORDS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub queue_capacity: u64,
}

impl CaptureArgs {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig::default().with_snaplen(self.snaplen)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_report_interval(Duration::from_secs(self.report_interval))
            .with_queue_capacity(usize::try_from(self.queue_capacity).unwrap_or(usize::MAX))
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn capture_args(argv: &[&str]) -> CaptureArgs {
        Cli::try_parse_from(argv.iter().copied()).unwrap().capture
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_capture_defaults() {
        let args = capture_args(&["pktstat", "-i", "eth0"]);
        assert_eq!(args.interface, "eth0");
        assert_eq!(args.snaplen, 65535);
        assert_eq!(args.report_interval, 10);
        assert_eq!(args.queue_capacity, 1000);

        assert_eq!(args.capture_config(), CaptureConfig::default());
        assert_eq!(args.pipeline_config(), PipelineConfig::default());
    }

    #[test]
    fn test_capture_long_flags() {
        let args = capture_args(&[
            "pktstat",
            "--interface",
            "wlan0",
            "--snaplen",
            "128",
            "--report-interval",
            "2",
            "--queue-capacity",
            "64",
        ]);
        assert_eq!(args.interface, "wlan0");
        assert_eq!(args.capture_config().snaplen, 128);

        let config = args.pipeline_config();
        assert_eq!(config.report_interval, Duration::from_secs(2));
        assert_eq!(config.queue_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_snaplen() {
        let args = capture_args(&["pktstat", "-i", "eth0", "-s", "96"]);
        assert_eq!(args.snaplen, 96);
    }

    #[test]
    fn test_bare_invocation_fails() {
        let err = Cli::try_parse_from(["pktstat"]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_interface_is_required() {
        let err = Cli::try_parse_from(["pktstat", "-s", "96"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(Cli::try_parse_from(["pktstat", "-i", "eth0", "-s", "0"]).is_err());
        assert!(Cli::try_parse_from(["pktstat", "-i", "eth0", "--report-interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["pktstat", "-i", "eth0", "--queue-capacity", "0"]).is_err());
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::try_parse_from(["pktstat", "-i", "eth0", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["pktstat", "-v", "--interface", "eth0"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }
}
