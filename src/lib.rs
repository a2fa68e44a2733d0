#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::field_reassign_with_default
)]

pub mod agent;
pub mod approval;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod providers;
pub mod runtime;
pub mod security;
pub mod session;
pub mod tools;
pub(crate) mod util;

pub use config::Config;
