//! Implementation of the `sharelock hold` command.
//!
//! Acquires the lock as the current user and keeps it until the requested
//! time has passed or the lock is lost. Killing the process leaves the lock
//! file behind; the next acquirer reclaims it because the OS dropped the lock.

use super::load_config;
use crate::cli::HoldArgs;
use sharelock::error::{LockError, Result};
use sharelock::{AcquireTimeout, LockClient, LockLost, Owner};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Execute the `sharelock hold` command.
pub fn cmd_hold(args: HoldArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(&args.dir, config_path)?;
    let client = LockClient::new(&args.dir, config)?;

    let mut handle = client.acquire(acquire_timeout(&args), &Owner::current())?;
    println!(
        "acquired generation={} pid={}",
        handle.generation(),
        handle.owner().pid
    );

    let lost = handle
        .take_loss_receiver()
        .and_then(|losses| wait_for_loss(&losses, args.seconds.map(Duration::from_secs)));

    handle.release();
    match lost {
        Some(lost) => Err(LockError::Lost(lost.to_string())),
        None => {
            println!("released");
            Ok(())
        }
    }
}

fn acquire_timeout(args: &HoldArgs) -> AcquireTimeout {
    if args.wait {
        AcquireTimeout::Unbounded
    } else {
        AcquireTimeout::from(Some(Duration::from_millis(args.timeout_ms.unwrap_or(0))))
    }
}

/// Block until a loss notification arrives or `hold_for` elapses.
fn wait_for_loss(losses: &Receiver<LockLost>, hold_for: Option<Duration>) -> Option<LockLost> {
    match hold_for {
        Some(limit) => losses.recv_timeout(limit).ok(),
        None => losses.recv().ok(),
    }
}
