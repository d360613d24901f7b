//! Background delivery worker for async-enabled rules
//!
//! One thread per rule drains a bounded queue of pre-rendered payloads in
//! arrival order: console first, then file. The channel closing is the only
//! termination signal; everything enqueued before the close is still written
//! before the thread exits.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{LogError, LogResult};
use crate::file::FileSink;
use crate::format::print_console;

/// Spawn the delivery thread for one rule.
///
/// A failed file write is announced on the console fallback and the loop
/// moves on to the next message; one bad write must never stop the rest of
/// the stream.
pub(crate) fn spawn(
    module: String,
    receiver: Receiver<String>,
    console: bool,
    sink: Option<Arc<FileSink>>,
) -> LogResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("modlog-{}", module))
        .spawn(move || {
            for payload in receiver {
                if console {
                    print_console(&payload);
                }
                if let Some(sink) = &sink {
                    if let Err(e) = sink.write(&payload) {
                        sink.report_failure(&module, &e);
                    }
                }
            }
        })
        .map_err(LogError::Io)
}
