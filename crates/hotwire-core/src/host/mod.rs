//! Module hosts that plug into a [`Session`](crate::Session).

mod directive;

pub use directive::{parse_directives, CallbackRecord, Directive, DirectiveLoader, Journal};
