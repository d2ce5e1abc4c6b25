//! Line output shared by all fixture roles

use crate::FixtureError;
use std::io::{self, Write};

/// Write `line` to stdout and flush before returning
///
/// Nothing stays in the std buffer after this returns, so a child launched
/// afterwards starts with an empty stdout buffer.
pub fn emit(line: &str) -> Result<(), FixtureError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}
