//! Implementation of the `sharelock break` command.
//!
//! Force-breaking is the one path that can put two writers on the same
//! datastore, so the command shows the recorded holder and asks for a typed
//! confirmation unless `--yes` is given.

use super::load_config;
use crate::cli::BreakArgs;
use sharelock::error::{LockError, Result};
use sharelock::{BreakConfirmation, ForceBreakOutcome, LockClient};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Word the user must type to confirm a force-break.
const CONFIRM_WORD: &str = "break";

/// Execute the `sharelock break` command.
pub fn cmd_break(args: BreakArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(&args.dir, config_path)?;
    let client = LockClient::new(&args.dir, config)?;
    client.ensure_supported()?;

    match client.status() {
        Ok(Some(info)) => println!("{}", info),
        Ok(None) => println!("No lock record found."),
        Err(e) => println!("{}", e),
    }

    if !args.yes {
        let stdin = io::stdin();
        let confirmed = confirm(&mut stdin.lock(), &mut io::stdout())
            .map_err(|e| LockError::io("failed to read confirmation", e))?;
        if !confirmed {
            return Err(LockError::UserError(
                "force-break not confirmed; the lock was left in place".to_string(),
            ));
        }
    }

    match client.force_break(BreakConfirmation::user_confirmed())? {
        ForceBreakOutcome::NotHeld => println!("Lock is not held; nothing to break."),
        ForceBreakOutcome::Broken { previous } => {
            println!("Broke lock held by {}", previous.owner);
            println!(
                "  Last heartbeat: {}",
                previous.last_heartbeat.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Generation:     {}", previous.generation);
        }
    }
    Ok(())
}

/// Ask for the confirmation word on `output` and read the answer from `input`.
fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<bool> {
    writeln!(
        output,
        "Breaking a lock whose holder is still running lets two clients write the datastore."
    )?;
    write!(output, "Type '{}' to continue: ", CONFIRM_WORD)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == CONFIRM_WORD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirm_accepts_the_typed_word() {
        let mut output = Vec::new();
        assert!(confirm(&mut Cursor::new("break\n"), &mut output).unwrap());
        assert!(String::from_utf8(output).unwrap().contains("Type 'break'"));
    }

    #[test]
    fn confirm_rejects_anything_else() {
        let mut output = Vec::new();
        assert!(!confirm(&mut Cursor::new("y\n"), &mut output).unwrap());
        assert!(!confirm(&mut Cursor::new(""), &mut output).unwrap());
    }

    #[test]
    fn break_on_free_lock_succeeds() {
        let temp = tempfile::TempDir::new().unwrap();
        let args = BreakArgs {
            dir: temp.path().to_path_buf(),
            yes: true,
        };
        assert!(cmd_break(args, None).is_ok());
    }
}
