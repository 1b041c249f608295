//! Implementation of the `sharelock status` command.
//!
//! Reads the lock record without attempting acquisition and prints the
//! holder, heartbeat age, and generation.

use super::load_config;
use chrono::Utc;
use sharelock::error::Result;
use sharelock::locks::{self, LockInfo};
use std::path::Path;

/// Execute the `sharelock status` command.
pub fn cmd_status(dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(dir, config_path)?;
    let lock_path = dir.join(&config.lock_file_name);

    match locks::status(&lock_path, &config)? {
        None => println!("No active lock."),
        Some(info) => print!("{}", render(&info, config.stale_timeout_ms)),
    }
    Ok(())
}

fn render(info: &LockInfo, stale_timeout_ms: u64) -> String {
    let record = &info.record;
    let mut out = format!("{}\n", info);
    out.push_str(&format!("  Owner:      {}\n", record.owner));
    out.push_str(&format!(
        "  Acquired:   {}\n",
        record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "  Heartbeat:  {} ago\n",
        record.age_string(Utc::now())
    ));
    out.push_str(&format!("  Generation: {}\n", record.generation));
    if info.is_stale {
        out.push_str(&format!(
            "  Status:     STALE (no heartbeat for over {} ms; the holder may be frozen or gone)\n",
            stale_timeout_ms
        ));
    }
    out.push_str(&format!("  Path:       {}\n", info.path.display()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sharelock::{LockRecord, Owner};
    use std::path::PathBuf;
    use std::time::Duration as StdDuration;

    fn info(heartbeat_secs_ago: i64, stale: bool) -> LockInfo {
        let now = Utc::now();
        let mut record = LockRecord::new(Owner::new("marie", "WH-PC-04", 4242), now, 3);
        record.last_heartbeat = now - Duration::seconds(heartbeat_secs_ago);
        LockInfo {
            path: PathBuf::from("/share/.lock"),
            record,
            heartbeat_age: StdDuration::from_secs(heartbeat_secs_ago as u64),
            is_stale: stale,
        }
    }

    #[test]
    fn render_fresh_holder() {
        let text = render(&info(2, false), 30_000);
        assert!(text.starts_with("Database is in use by marie on WH-PC-04 since "));
        assert!(text.contains("  Owner:      marie@WH-PC-04 (pid 4242)"));
        assert!(text.contains("  Generation: 3"));
        assert!(!text.contains("STALE"));
    }

    #[test]
    fn render_stale_holder() {
        let text = render(&info(120, true), 30_000);
        assert!(text.contains("Status:     STALE"));
        assert!(text.contains("2m 0s ago"));
    }

    #[test]
    fn status_of_empty_folder_succeeds() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(cmd_status(temp.path(), None).is_ok());
    }
}
