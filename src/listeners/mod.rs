//! The built-in listeners (`spec.md` §4.9, §4.10): the progress printer,
//! the failed-assertion diagrammer, the generator overrider, the log
//! printer, the exception printer, and test inclusion/exclusion. Each is a
//! small, independently testable [`crate::bus::Listener`]; [`crate::cli`]
//! wires the set together based on resolved flags and constructs the
//! [`crate::bus::Bus`] that drives them.

pub mod diagram;
pub mod exception_printer;
pub mod filter;
pub mod log_printer;
pub mod overrider;
pub mod progress;

pub use diagram::DiagramListener;
pub use exception_printer::ExceptionPrinterListener;
pub use filter::{compile_pattern, pattern_matches, IncludeExcludeListener};
pub use log_printer::LogPrinterListener;
pub use overrider::GeneratorOverrideListener;
pub use progress::ProgressListener;
