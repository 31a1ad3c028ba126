use std::io::{Read, Write};
use std::time::Duration;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use steplink_rs::{open_port, BatchDispatcher, CancelToken, LinkError, Result};

use crate::config::Config;

/// How often a pause wakes up to look for Ctrl-C
const PAUSE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Open `port`, let the board settle, then run the configured sequences.
///
/// The port is closed when this returns, whichever way it returns.
pub fn run_port(port: &str, config: &Config, cancel: &CancelToken) -> Result<()> {
    let serial = open_port(port, &config.serial_config())?;
    let mut dispatcher = BatchDispatcher::new(serial);

    pause(cancel, config.settle(), "Waiting for the board to reset")?;
    run(&mut dispatcher, config, cancel)
}

/// Send the startup batches once, then the repeat batches until cancelled.
///
/// Every batch is followed by its DONE handshake and the configured delay.
/// Ends with `LinkError::Cancelled` on interrupt; never ends on its own
/// unless the repeat list is empty.
pub fn run<S: Read + Write>(
    dispatcher: &mut BatchDispatcher<S>,
    config: &Config,
    cancel: &CancelToken,
) -> Result<()> {
    info!("=== Sending Startup Commands ===");
    for batch in &config.sequence.startup {
        dispatch(dispatcher, batch, config, cancel)?;
    }

    if config.sequence.repeat.is_empty() {
        warn!("No repeating commands configured, stopping after startup");
        return Ok(());
    }

    info!("=== Starting Repeating Commands ===");
    loop {
        for batch in &config.sequence.repeat {
            dispatch(dispatcher, batch, config, cancel)?;
        }
    }
}

fn dispatch<S: Read + Write>(
    dispatcher: &mut BatchDispatcher<S>,
    batch: &str,
    config: &Config,
    cancel: &CancelToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(LinkError::Cancelled);
    }
    let ack = dispatcher.send_batch(batch, cancel, config.ack_timeout())?;
    debug!("Batch {:?} acknowledged after {} line(s)", batch, ack.transcript.len());
    pause(cancel, config.delay(), "Delay")
}

/// Sleep with a spinner, waking early on cancellation.
fn pause(cancel: &CancelToken, duration: Duration, message: &str) -> Result<()> {
    if duration.is_zero() {
        return if cancel.is_cancelled() { Err(LinkError::Cancelled) } else { Ok(()) };
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("{} ({:.1}s)", message, duration.as_secs_f64()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let completed = cancel.sleep(duration, PAUSE_CHECK_INTERVAL);
    spinner.finish_and_clear();

    if completed {
        Ok(())
    } else {
        Err(LinkError::Cancelled)
    }
}
