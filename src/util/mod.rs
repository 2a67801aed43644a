//! Small text and number helpers shared by the engine and the orchestrator.

mod duration;
mod number;
mod wrap;

pub use duration::format_elapsed;
pub use number::{parse_number, parse_signed};
pub use wrap::wrap_text;
