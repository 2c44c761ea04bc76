#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod journal;
pub mod light;
pub mod moisture;
pub mod peripherals;
pub mod toolbox;
pub mod tools;
pub mod water;

pub use config::Config;
pub use error::ToolError;
pub use toolbox::Toolbox;
