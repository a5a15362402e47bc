use crate::{args::Args, MainError};
use log::{Level, LevelFilter};
use simplelog::{
    format_description, Color, ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode,
};

// Use the same format as simple_logger
const TIMESTAMP_FORMAT_OFFSET: &[simplelog::FormatItem<'_>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory]:[offset_minute]"
);

fn level_filter(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Log to the terminal, errors and warnings go to stderr.
pub fn init_logger(args: &Args) -> Result<(), MainError> {
    let config = ConfigBuilder::new()
        .set_level_color(Level::Info, Some(Color::Green))
        .set_level_color(Level::Debug, Some(Color::Magenta))
        .set_level_color(Level::Trace, None)
        .set_level_padding(LevelPadding::Right)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        // The HTTP server is chatty on trace
        .add_filter_ignore_str("tiny_http")
        .set_time_format_custom(TIMESTAMP_FORMAT_OFFSET)
        .set_time_offset_to_local()
        .map_err(|_| MainError::FailedLoggerTimezones)?
        .build();

    TermLogger::init(
        level_filter(args.quiet, args.verbose),
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    Ok(())
}
