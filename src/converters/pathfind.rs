//! The `ByPath` converter: dotted-path lookup into the pipeline value,
//! backed by [`PathFinder`].

use std::rc::Rc;

use crate::path::PathFinder;
use crate::registry::{ConvError, ConverterProvider, ConverterRegistry};
use crate::tokenizer::trim_quotes;
use crate::value::Value;

/// Installs `ByPath`, bound to a finder carrying the `@name` globals.
pub struct PathConverters {
    finder: Rc<PathFinder>,
}

impl PathConverters {
    pub fn new(finder: PathFinder) -> Self {
        PathConverters {
            finder: Rc::new(finder),
        }
    }
}

fn path_arg(args: &[String]) -> Result<&str, ConvError> {
    args.first()
        .map(|s| trim_quotes(s))
        .ok_or_else(|| ConvError::Argument("missing path".into()))
}

impl ConverterProvider for PathConverters {
    fn register_into(self, registry: &mut ConverterRegistry) {
        let finder = Rc::clone(&self.finder);
        registry.register_unary("ByPath", move |value, args| {
            let lookup = finder.get_value(&value, path_arg(args)?, true)?;
            Ok(lookup.value)
        });

        let finder = self.finder;
        registry.register_nary("ByPath", move |vals, args| {
            let root = Value::Array(vals.to_vec());
            let lookup = finder.get_value(&root, path_arg(args)?, true)?;
            Ok(lookup.value)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipe;
    use std::collections::HashMap;

    fn library() -> Value {
        let mut verne = HashMap::new();
        verne.insert("author".to_string(), Value::String("Jules Verne".into()));
        verne.insert("title".to_string(), Value::String("Nemo".into()));
        let mut wells = HashMap::new();
        wells.insert("author".to_string(), Value::String("H. G. Wells".into()));
        wells.insert("title".to_string(), Value::String("The Time Machine".into()));
        let mut books = HashMap::new();
        books.insert(
            "book".to_string(),
            Value::Array(vec![Value::Object(verne), Value::Object(wells)]),
        );
        let mut root = HashMap::new();
        root.insert("books".to_string(), Value::Object(books));
        Value::Object(root)
    }

    fn pipe_with_paths(globals: HashMap<String, Value>) -> Pipe {
        let mut pipe = Pipe::with_defaults();
        pipe.register_path_finder(PathFinder::new(globals));
        pipe
    }

    #[test]
    fn test_by_path_finds_nested_values() {
        let pipe = pipe_with_paths(HashMap::new());
        let out = pipe
            .run(
                "ByPath 'books.book[author=\"Jules Verne\"].title'",
                library(),
            )
            .unwrap();
        assert_eq!(out, Value::Array(vec![Value::String("Nemo".into())]));
    }

    #[test]
    fn test_by_path_with_global() {
        let mut globals = HashMap::new();
        globals.insert("wanted".to_string(), Value::String("H. G. Wells".into()));
        let pipe = pipe_with_paths(globals);
        let out = pipe
            .run("ByPath 'books.book[author=@wanted].title'", library())
            .unwrap();
        assert_eq!(
            out,
            Value::Array(vec![Value::String("The Time Machine".into())])
        );
    }

    #[test]
    fn test_missing_global_is_fatal() {
        let pipe = pipe_with_paths(HashMap::new());
        let err = pipe
            .run("ByPath 'books.book[author=@nobody].title'", library())
            .unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn test_soft_miss_yields_null() {
        let pipe = pipe_with_paths(HashMap::new());
        let out = pipe.run("ByPath 'books.missing.title'", library()).unwrap();
        assert_eq!(out, Value::Null);
    }
}
