use backtrace::Backtrace;
use std::{cell::RefCell, io, path::Path, sync::Once};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{writer::MakeWriterExt, Layer},
    prelude::*,
};

thread_local! {
    pub static BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Logs into daily rotated files inside `log_folder` and to stdout. Keep the returned guard alive
/// for as long as the process runs, dropping it flushes the file writer.
///
/// # Panics
/// In case a global subscriber has already been installed.
pub fn tracing_setup(log_folder: &Path, verbose: bool) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_folder, "easyyolo.log");
    let (file_appender, guard_flush_file) = tracing_appender::non_blocking(file_appender);
    let file_layer = Layer::new()
        .with_writer(file_appender.with_max_level(Level::INFO))
        .with_line_number(true)
        .compact()
        .with_ansi(false)
        .with_file(true);
    let stdout_level = if verbose { Level::DEBUG } else { Level::WARN };
    let stdout_layer = Layer::new()
        .with_writer(io::stdout.with_max_level(stdout_level))
        .with_target(false)
        .with_line_number(true);
    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();
    std::panic::set_hook(Box::new(|info| {
        let trace = Backtrace::new();
        tracing::error!("panic: {info}\n{trace:?}");
        BACKTRACE.with(move |b| b.borrow_mut().replace(trace));
    }));
    guard_flush_file
}

static INIT: Once = Once::new();

pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}
