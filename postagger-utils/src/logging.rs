use std::fs::OpenOptions;
use std::path::Path;

use env_logger::{Builder, Target, WriteStyle};
use failure::{format_err, Fallible};
use log::LevelFilter;

/// Construct a logger builder.
///
/// Messages of level `info` and up are logged, unless `RUST_LOG`
/// specifies otherwise. Messages are written to standard error, or
/// appended to `log_file` when it is given.
pub fn logger_builder<P>(log_file: Option<P>) -> Fallible<Builder>
where
    P: AsRef<Path>,
{
    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG");

    if let Some(log_file) = log_file {
        let log_file = log_file.as_ref();
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|err| {
                format_err!("Cannot open log file '{}': {}", log_file.display(), err)
            })?;

        builder
            .target(Target::Pipe(Box::new(f)))
            .write_style(WriteStyle::Never);
    }

    Ok(builder)
}
