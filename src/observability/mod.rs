//! Observability: structured logging setup and span macros

pub mod logging;

pub use logging::{
    init_default_logging, init_logging, init_logging_with_level, parse_level, LogFormat,
};

pub use logging::{command_span, session_span};
