//! Dot-notation configuration, e.g. from a kernel command line.
//!
//! `stages.boot[0].commands[0]="echo hi" stages.boot[0].name=greet` builds
//! the same tree as the equivalent YAML document.  Tokens without `=` are
//! ignored, and step fields that do not decode are dropped one by one so a
//! partly valid line still yields its valid steps.

use serde_yaml::{Mapping, Value};

use super::{Config, Step};

/// Largest sequence index accepted in a path.
const MAX_INDEX: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parse dot-notation `text` into a [`Config`].
#[must_use]
pub fn parse(text: &str) -> Config {
    let mut root = Value::Mapping(Mapping::new());
    for token in tokenize(text) {
        let Some((path, raw)) = token.split_once('=') else {
            continue;
        };
        match parse_path(path) {
            Some(segments) => insert(&mut root, &segments, typed(raw)),
            None => tracing::debug!("ignoring malformed dot-notation key '{path}'"),
        }
    }
    decode(root)
}

/// Split on unquoted whitespace, removing the quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// `a.b[0][1].c` into keys and indices.  `None` for empty keys or bad indices.
fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = part.find('[').map_or((part, ""), |i| part.split_at(i));
        if key.is_empty() {
            return None;
        }
        segments.push(Segment::Key(key.to_string()));
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index: usize = inner.get(..close)?.parse().ok()?;
            if index > MAX_INDEX {
                return None;
            }
            segments.push(Segment::Index(index));
            rest = inner.get(close + 1..)?;
        }
    }
    Some(segments)
}

/// Booleans and numbers keep their YAML type; everything else is a string.
fn typed(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

fn insert(node: &mut Value, path: &[Segment], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    match first {
        Segment::Key(key) => {
            if !node.is_mapping() {
                *node = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(map) = node {
                if !map.contains_key(key.as_str()) {
                    map.insert(Value::String(key.clone()), Value::Null);
                }
                if let Some(child) = map.get_mut(key.as_str()) {
                    insert(child, rest, value);
                }
            }
        }
        Segment::Index(index) => {
            if !node.is_sequence() {
                *node = Value::Sequence(Vec::new());
            }
            if let Value::Sequence(seq) = node {
                if seq.len() <= *index {
                    seq.resize(index + 1, Value::Null);
                }
                if let Some(child) = seq.get_mut(*index) {
                    insert(child, rest, value);
                }
            }
        }
    }
}

fn decode(root: Value) -> Config {
    let mut config = Config::default();
    let Value::Mapping(mut map) = root else {
        return config;
    };
    if let Some(name) = map.remove("name") {
        config.name = scalar_text(&name);
    }
    let Some(Value::Mapping(stages)) = map.remove("stages") else {
        return config;
    };
    for (stage, steps) in stages {
        let (Value::String(stage), Value::Sequence(steps)) = (stage, steps) else {
            continue;
        };
        config
            .stages
            .insert(stage, steps.into_iter().map(decode_step).collect());
    }
    config
}

fn decode_step(value: Value) -> Step {
    if let Ok(step) = serde_yaml::from_value(value.clone()) {
        return step;
    }
    let Value::Mapping(map) = value else {
        return Step::default();
    };
    let valid: Mapping = map
        .into_iter()
        .filter(|(key, field)| {
            let mut single = Mapping::new();
            single.insert(key.clone(), field.clone());
            let ok = serde_yaml::from_value::<Step>(Value::Mapping(single)).is_ok();
            if !ok {
                tracing::debug!("dropping undecodable step field {key:?}");
            }
            ok
        })
        .collect();
    serde_yaml::from_value(Value::Mapping(valid)).unwrap_or_default()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
