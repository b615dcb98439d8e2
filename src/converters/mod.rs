//! Converter providers. Each provider bundles a set of named converters
//! and installs them into a [`ConverterRegistry`](crate::ConverterRegistry)
//! through [`ConverterProvider`](crate::ConverterProvider).

mod builtin;
mod eval;
mod pathfind;

pub use builtin::StdConverters;
pub use eval::EvalConverters;
pub use pathfind::PathConverters;
