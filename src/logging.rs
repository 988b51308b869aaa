use std::any::Any;
#[cfg(all(feature = "app", not(test)))]
use std::path::Path;

pub const LOG_ENV: &str = "MDSTICKER_LOG";
pub const LOG_FILE_BASENAME: &str = "mdsticker";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 30;

fn default_spec() -> &'static str {
    if cfg!(debug_assertions) {
        "warn,mdsticker_lib=debug"
    } else {
        "warn,mdsticker_lib=info"
    }
}

/// First non-blank of `MDSTICKER_LOG` and `RUST_LOG`, else the build default.
fn resolve_spec(own: Option<String>, rust_log: Option<String>) -> String {
    own.into_iter()
        .chain(rust_log)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_spec().to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("<non-string panic payload>")
}

/// Starts the file logger in `log_dir` (the app data dir) and installs the panic hook.
#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(log_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(log_dir)?;
    let spec = resolve_spec(std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok());

    Logger::try_with_str(&spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::None
        })
        .start()?;

    install_panic_hook();
    log::info!("logger initialized dir={} spec={spec}", log_dir.display());
    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = panic_message(info.payload());
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_prefers_own_variable_then_rust_log() {
        assert_eq!(
            resolve_spec(Some("trace".into()), Some("error".into())),
            "trace"
        );
        assert_eq!(resolve_spec(Some("  ".into()), Some("error".into())), "error");
        assert_eq!(resolve_spec(None, Some("".into())), default_spec());
        assert!(default_spec().contains("mdsticker_lib="));
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(literal.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
