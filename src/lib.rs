#[cfg(feature = "cli")]
pub mod cli;
pub mod converters;
pub mod dest;
pub mod expr;
pub mod json;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod shorthand;
pub mod tokenizer;
pub mod value;

pub use dest::{DestError, DestObject, Record, RecordRef};
pub use json::{from_json, to_json};
pub use path::{ItemFinder, PathError, PathFinder, PathLookup};
pub use pipeline::{Pipe, PipeError};
pub use registry::{ConvError, ConverterProvider, ConverterRegistry};
pub use value::{TypeTag, Value};
