//! Stage tokenizing for pipeline expressions.
//!
//! A pipeline is a sequence of stages separated by `|`; each stage is a
//! converter name followed by whitespace-delimited arguments. A span
//! bounded by matching single or double quotes is one token regardless
//! of internal whitespace. Quotes are retained; converters that want the
//! bare text call [`trim_quotes`].

use std::sync::OnceLock;

use regex::Regex;

/// One pipeline stage: the converter name followed by its arguments.
pub type Stage = Vec<String>;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[^"]*"|'[^']*'|\S+"#).expect("token pattern is valid"))
}

/// Split pipeline text into stages on `|` tokens and each stage into
/// tokens on whitespace, keeping quoted spans atomic. Empty stages
/// (leading/trailing/doubled `|`) are dropped. Ordering is preserved.
///
/// # Examples
///
/// ```
/// use ducto::tokenizer::tokenize;
///
/// let stages = tokenize("Convert ToInt32 | AsArrayWithOneItem");
/// assert_eq!(stages.len(), 2);
/// assert_eq!(stages[0], vec!["Convert", "ToInt32"]);
/// ```
pub fn tokenize(text: &str) -> Vec<Stage> {
    let mut stages: Vec<Stage> = vec![Vec::new()];
    for m in token_regex().find_iter(text) {
        let tok = m.as_str();
        if tok == "|" {
            stages.push(Vec::new());
        } else if let Some(stage) = stages.last_mut() {
            stage.push(tok.to_string());
        }
    }
    stages.retain(|stage| !stage.is_empty());
    stages
}

/// Strip one matching pair of surrounding single or double quotes.
pub fn trim_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &token[1..token.len() - 1];
        }
    }
    token
}

#[test]
fn test_quoted_argument_stays_one_token() {
    let stages = tokenize("ExprEval \"a - 1\" a");
    assert_eq!(stages, vec![vec!["ExprEval", "\"a - 1\"", "a"]]);
}

#[test]
fn test_single_quotes() {
    let stages = tokenize("ExprEval 'IF(a%2==1, a+1, a)' a");
    assert_eq!(stages, vec![vec!["ExprEval", "'IF(a%2==1, a+1, a)'", "a"]]);
}

#[test]
fn test_empty_stages_dropped() {
    let stages = tokenize("| Convert ToInt32 |  | ToUpper |");
    assert_eq!(
        stages,
        vec![vec!["Convert", "ToInt32"], vec!["ToUpper"]]
    );
}

#[test]
fn test_ordering_preserved() {
    let stages = tokenize("A one | B two three | C");
    assert_eq!(
        stages,
        vec![
            vec!["A", "one"],
            vec!["B", "two", "three"],
            vec!["C"]
        ]
    );
}

#[test]
fn test_trim_quotes() {
    assert_eq!(trim_quotes("\"a - 1\""), "a - 1");
    assert_eq!(trim_quotes("'x'"), "x");
    assert_eq!(trim_quotes("plain"), "plain");
    assert_eq!(trim_quotes("\"unbalanced'"), "\"unbalanced'");
    assert_eq!(trim_quotes("\""), "\"");
}
