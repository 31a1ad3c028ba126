use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// Stepper command batch sender with DONE wait.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("target").required(true).args(["port", "list"])))]
pub struct Args {
    /// Serial port, e.g. COM3 or /dev/ttyUSB0
    #[arg(short, long)]
    pub port: Option<String>,

    /// List serial ports and exit
    #[arg(short, long)]
    pub list: bool,

    /// Baud rate [default: 115200]
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Delay after each DONE, in seconds [default: 1.0]
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Give up waiting for DONE after this many seconds (waits forever if unset)
    #[arg(long)]
    pub ack_timeout: Option<f64>,

    /// Config file holding serial settings and command sequences
    #[arg(short, long, default_value = "seqrep.toml")]
    pub config: PathBuf,

    /// enable debug messages
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn port_with_overrides() {
        let args = Args::try_parse_from(["seqrep", "-p", "/dev/ttyUSB0", "-b", "9600", "-d", "0.25"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert!(!args.list);
        assert_eq!(args.baud, Some(9600));
        assert_eq!(args.delay, Some(0.25));
        assert_eq!(args.config, PathBuf::from("seqrep.toml"));
    }

    #[test]
    fn list_alone() {
        let args = Args::try_parse_from(["seqrep", "--list"]).unwrap();
        assert!(args.list);
        assert!(args.port.is_none());
    }

    #[test]
    fn port_or_list_is_required() {
        assert!(Args::try_parse_from(["seqrep"]).is_err());
        assert!(Args::try_parse_from(["seqrep", "-b", "9600"]).is_err());
    }

    #[test]
    fn port_and_list_conflict() {
        assert!(Args::try_parse_from(["seqrep", "-p", "COM9", "-l"]).is_err());
    }
}
