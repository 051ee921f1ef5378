//! Filename construction from resolved metadata.
//!
//! - [`text`] holds the pure string transforms (sanitizing, author
//!   abbreviation, math-symbol expansion, title casing).
//! - [`autoname`] renders a user template against a [`Metadata`](crate::resolver::Metadata) record.

pub mod autoname;
pub mod text;

pub use autoname::{AutonameError, DEFAULT_AUTONAME_FORMAT, PLACEHOLDERS, autoname};
pub use text::{authors_to_string, convert_math_symbols, sanitize_filename, title_case};
