use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "EPL_LOG";

/// Installs the fmt subscriber. The filter comes from `EPL_LOG`, then
/// `RUST_LOG`, then `default_filter`. Later calls are no-ops.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}
