//! Progress lines on the caller's output stream.

use std::fmt;
use std::io::Write;

/// Write one line. A broken output stream must not abort a run whose
/// state already lives in the manifest, so failures are only logged.
pub(crate) fn emit(out: &mut dyn Write, args: fmt::Arguments<'_>) {
    if let Err(e) = out.write_fmt(args).and_then(|()| out.write_all(b"\n")) {
        log::debug!("Failed to write progress line: {e}");
    }
}
