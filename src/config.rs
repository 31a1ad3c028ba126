use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::debug;
use serde::{Deserialize, Serialize};
use steplink_rs::SerialConfig;

use crate::cli::Args;

/// Environment variables with this prefix override file settings,
/// e.g. `SEQREP_SERIAL__BAUD=9600`.
pub const ENV_PREFIX: &str = "SEQREP_";

/// Serial settings, durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSection {
    pub baud: u32,
    /// Upper bound of one blocking read
    pub read_timeout: f64,
    /// Grace period after opening, while the board resets
    pub settle: f64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baud: 115200,
            read_timeout: 1.0,
            settle: 2.0,
        }
    }
}

/// Batches sent once after opening, and batches repeated until interrupted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub startup: Vec<String>,
    pub repeat: Vec<String>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            startup: vec![
                "A 2 1000".to_string(),
                "T 2 2000".to_string(),
                "L 2 200".to_string(),
                "P 2 0 P 1 0 P 0 0".to_string(),
            ],
            repeat: vec![
                "P 2 0".to_string(),
                "P 2 0".to_string(),
                "P 2 -15000".to_string(),
                "P 2 -15000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Pause after each DONE, in seconds
    pub delay: f64,
    /// Give up on a handshake after this many seconds; absent means wait forever
    pub ack_timeout: Option<f64>,
    pub serial: SerialSection,
    pub sequence: Sequence,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay: 1.0,
            ack_timeout: None,
            serial: SerialSection::default(),
            sequence: Sequence::default(),
        }
    }
}

/// Command-line values that take precedence over every other layer
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    delay: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack_timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<SerialOverrides>,
}

#[derive(Debug, Serialize)]
struct SerialOverrides {
    baud: u32,
}

impl From<&Args> for CliOverrides {
    fn from(args: &Args) -> Self {
        Self {
            delay: args.delay,
            ack_timeout: args.ack_timeout,
            serial: args.baud.map(|baud| SerialOverrides { baud }),
        }
    }
}

impl Config {
    /// Layer defaults, the TOML file at `path` (if present), `SEQREP_*`
    /// environment variables, and finally the command line.
    pub fn load(path: &Path, args: &Args) -> Result<Self, figment::Error> {
        debug!("Loading configuration from {}", path.display());
        let config: Config = Self::figment(path)
            .merge(Serialized::defaults(CliOverrides::from(args)))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn validate(&self) -> Result<(), figment::Error> {
        let durations = [
            ("delay", Some(self.delay)),
            ("ack_timeout", self.ack_timeout),
            ("serial.read_timeout", Some(self.serial.read_timeout)),
            ("serial.settle", Some(self.serial.settle)),
        ];
        for (key, value) in durations {
            if let Some(value) = value {
                if let Err(e) = Duration::try_from_secs_f64(value) {
                    return Err(figment::Error::from(format!(
                        "{} must be a non-negative number of seconds, got {} ({})",
                        key, value, e
                    )));
                }
            }
        }
        if self.serial.read_timeout == 0.0 {
            return Err(figment::Error::from(
                "serial.read_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baudrate: self.serial.baud,
            timeout: seconds(self.serial.read_timeout),
            ..SerialConfig::default()
        }
    }

    pub fn delay(&self) -> Duration {
        seconds(self.delay)
    }

    pub fn settle(&self) -> Duration {
        seconds(self.serial.settle)
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout.map(seconds)
    }
}

/// Seconds to `Duration`, saturating values `validate` would have rejected.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
