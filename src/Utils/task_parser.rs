/// parse task documents with structure like
/// " title1 key1: value1, value2 key2: value3 title2 key3: value4" which have titles (sections)
/// and pairs key - list of values, into HashMap<String, HashMap<String, Vec<Value>>>.
/// Lines starting with //, # or % are comments.
///
/// Used to read solver settings from text, e.g.
/// ```text
/// solver    method: radau5 lin_sol: dense
/// tolerance atol: 1e-6 rtol: 1e-6
/// ```
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, map_res, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, separated_pair, terminated},
};
use std::collections::HashMap;
use std::fmt;

pub type SectionMap = HashMap<String, Vec<Value>>;
pub type DocumentMap = HashMap<String, SectionMap>;

/// enum to represent different value types:
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    pub fn as_string(&self) -> Option<&String> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }
    /// integers are accepted as floats too
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Float(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::Boolean(val) => write!(f, "{}", val),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    Parse(String),
    /// text left after the last section that could be parsed
    Remaining(String),
    UnknownSection(String),
    UnknownKey { section: String, key: String },
    BadValue { section: String, key: String, expected: String },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskError::Parse(msg) => write!(f, "parsing error: {}", msg),
            TaskError::Remaining(rest) => {
                write!(f, "failed to parse entire document. Remaining: '{}'", rest)
            }
            TaskError::UnknownSection(s) => write!(f, "unknown section '{}'", s),
            TaskError::UnknownKey { section, key } => {
                write!(f, "unknown key '{}' in section '{}'", key, section)
            }
            TaskError::BadValue {
                section,
                key,
                expected,
            } => write!(f, "{}.{}: expected {}", section, key, expected),
        }
    }
}

impl std::error::Error for TaskError {}

/// Parses a title or a key (word characters without spaces)
pub(crate) fn parse_name(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    let mut parser = map(parser, String::from);
    parser.parse(input)
}

pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    // a single value: everything up to a comma, whitespace or semicolon
    let value_parser = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r' | ';'));
    let mut value_parser = map_res(value_parser, |s: &str| -> Result<Value, String> {
        if let Ok(val) = s.parse::<i64>() {
            Ok(Value::Integer(val))
        } else if let Ok(val) = s.parse::<f64>() {
            Ok(Value::Float(val))
        } else if let Ok(val) = s.parse::<bool>() {
            Ok(Value::Boolean(val))
        } else {
            Ok(Value::String(s.to_string()))
        }
    });
    value_parser.parse(input)
}

pub(crate) fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let separator_coma = delimited(space0, tag(","), space0);
    let mut value_parser = separated_list1(separator_coma, parse_value);
    value_parser.parse(input)
}

/// key: value1, value2, ...
pub(crate) fn parse_key_value_pair(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon_separator = delimited(space0, tag(":"), space0);
    let mut parser = separated_pair(parse_name, colon_separator, parse_value_list);
    parser.parse(input)
}

/// a title followed by one or more key-value pairs
pub(crate) fn parse_section(input: &str) -> IResult<&str, (String, SectionMap)> {
    let (input, title) = parse_name(input)?;
    let (input, _) = multispace0(input)?;
    let mut parser = many1(terminated(parse_key_value_pair, multispace0));
    let (input, pairs) = parser.parse(input)?;
    let section_map: SectionMap = pairs.into_iter().collect();
    Ok((input, (title, section_map)))
}

fn filter_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("//")
                && !trimmed.starts_with('#')
                && !trimmed.starts_with('%')
                && !trimmed.is_empty()
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Parses the entire document into a HashMap; repeated sections are merged
pub fn parse_document(input: &str) -> Result<DocumentMap, TaskError> {
    let filtered = filter_comments(input);
    let mut parser = many1(delimited(multispace0, parse_section, multispace0));
    let (remaining, sections) = parser
        .parse(filtered.as_str())
        .map_err(|e| TaskError::Parse(format!("{:?}", e)))?;
    if !remaining.trim().is_empty() {
        return Err(TaskError::Remaining(remaining.to_string()));
    }
    let mut result: DocumentMap = HashMap::new();
    for (title, section_map) in sections {
        result.entry(title).or_default().extend(section_map);
    }
    Ok(result)
}

/// checks that only known sections and keys are present
pub fn check_document(doc: &DocumentMap, template: &[(&str, &[&str])]) -> Result<(), TaskError> {
    for (title, section) in doc {
        let Some((_, keys)) = template.iter().find(|(t, _)| *t == title.as_str()) else {
            return Err(TaskError::UnknownSection(title.clone()));
        };
        for key in section.keys() {
            if !keys.contains(&key.as_str()) {
                return Err(TaskError::UnknownKey {
                    section: title.clone(),
                    key: key.clone(),
                });
            }
        }
    }
    Ok(())
}

/// typed access to the first value of section.key
pub fn get_value<'a>(doc: &'a DocumentMap, section: &str, key: &str) -> Option<&'a Value> {
    doc.get(section)
        .and_then(|s| s.get(key))
        .and_then(|values| values.first())
}

pub fn get_f64(doc: &DocumentMap, section: &str, key: &str) -> Result<Option<f64>, TaskError> {
    match get_value(doc, section, key) {
        None => Ok(None),
        Some(v) => v.as_float().map(Some).ok_or_else(|| bad(section, key, "a number")),
    }
}

pub fn get_usize(doc: &DocumentMap, section: &str, key: &str) -> Result<Option<usize>, TaskError> {
    match get_value(doc, section, key) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .filter(|i| *i >= 0)
            .map(|i| Some(i as usize))
            .ok_or_else(|| bad(section, key, "a non-negative integer")),
    }
}

pub fn get_bool(doc: &DocumentMap, section: &str, key: &str) -> Result<Option<bool>, TaskError> {
    match get_value(doc, section, key) {
        None => Ok(None),
        Some(v) => v.as_boolean().map(Some).ok_or_else(|| bad(section, key, "true or false")),
    }
}

pub fn get_string(doc: &DocumentMap, section: &str, key: &str) -> Option<String> {
    get_value(doc, section, key).map(|v| v.to_string())
}

/// all values of section.key as numbers
pub fn get_f64_list(
    doc: &DocumentMap,
    section: &str,
    key: &str,
) -> Result<Option<Vec<f64>>, TaskError> {
    let Some(values) = doc.get(section).and_then(|s| s.get(key)) else {
        return Ok(None);
    };
    values
        .iter()
        .map(|v| v.as_float().ok_or_else(|| bad(section, key, "numbers")))
        .collect::<Result<Vec<f64>, TaskError>>()
        .map(Some)
}

fn bad(section: &str, key: &str, expected: &str) -> TaskError {
    TaskError::BadValue {
        section: section.to_string(),
        key: key.to_string(),
        expected: expected.to_string(),
    }
}
