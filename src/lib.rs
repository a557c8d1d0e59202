#![warn(clippy::pedantic)]
// Noisy doc/signature lints
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference: format!("{}", x) over format!("{x}") for complex exprs
#![allow(clippy::uninlined_format_args)]
// Timestamps and durations cross between u64/i64/f64
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

pub mod address_book;
pub mod channels;
pub mod cli;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod errors;
pub mod formatter;
pub mod session;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
