//! MiniMIPS instruction-set model and test-program front end.

/// Front-end error type.
pub mod errors;
/// Operation table with operand formats.
pub mod isa;
/// Standard preparator and comparator library.
pub mod library;
/// `InstructionSetModel` implementation.
pub mod model;
/// Assembly listing sink.
pub mod printer;
/// Register numbering and aliases.
pub mod registers;
/// Demo templates.
pub mod templates;

pub use errors::FrontEndError;
pub use library::standard_template;
pub use model::{reg, MiniMips, REGISTER_MODE};
pub use printer::ListingPrinter;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;
