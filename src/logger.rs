use log::{LevelFilter, SetLoggerError};

/// Initializes `env_logger`. `RUST_LOG` is read first, `level` then
/// overrides the crate's own level. Fails when a logger is already
/// installed.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    // resolver internals log every retry and truncated UDP answer
    builder.filter_module("hickory_proto", LevelFilter::Error);
    builder.filter_module("hickory_resolver", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("spf_flattener", level);
    builder.try_init()
}
