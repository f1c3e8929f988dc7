use serde::Serialize;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Literal form of a single value, `None`/`True`/quoted strings included.
    pub fn to_literal(&self) -> String {
        match self {
            CellValue::Null => "None".to_string(),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) => quote(s),
        }
    }
}

/// Plain display used in the bulleted answer grounding (no quotes).
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "-"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "sí" } else { "no" }),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// Rows returned by one statement. `columns` is empty when the rows were
/// recovered from literal text rather than produced by the executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column_index(n).is_some())
    }

    pub fn to_literal(&self) -> String {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(CellValue::to_literal).collect();
                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();
        format!("[{}]", rows.join(", "))
    }
}

/// What the executor boundary produced for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(RowSet),
    ExecutionError(String),
}

impl QueryOutcome {
    /// Diagnostic text stored as `raw_data` in the answer package.
    pub fn to_literal(&self) -> String {
        match self {
            QueryOutcome::Rows(rows) => rows.to_literal(),
            QueryOutcome::ExecutionError(msg) => format!("Error ejecutando SQL: {}", msg),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("constructor calls nested too deeply")]
    TooDeep,
}

const MAX_NESTING: usize = 64;

/// Parses a tuple-list literal such as `[('A', 1), ('B', None)]`.
///
/// Accepts single or double quoted strings with backslash escapes, integers,
/// floats, `None`, `True`, `False` and constructor calls like
/// `Decimal('4.50')` (read as a float) or `datetime.date(2024, 1, 2)` (kept
/// as its source text). Rows may be tuples or lists.
pub fn parse_literal(text: &str) -> Result<RowSet, LiteralError> {
    let mut parser = LiteralParser {
        src: text,
        chars: text.char_indices().peekable(),
        depth: 0,
    };

    parser.skip_ws();
    parser.expect('[')?;
    let mut rows = Vec::new();
    loop {
        parser.skip_ws();
        if parser.eat(']') {
            break;
        }
        rows.push(parser.row()?);
        parser.skip_ws();
        if parser.eat(',') {
            continue;
        }
        parser.expect(']')?;
        break;
    }
    parser.skip_ws();
    if let Some((offset, found)) = parser.chars.next() {
        return Err(LiteralError::Unexpected { found, offset });
    }

    Ok(RowSet::new(Vec::new(), rows))
}

struct LiteralParser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl LiteralParser<'_> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((offset, found)) => Err(LiteralError::Unexpected { found, offset }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn row(&mut self) -> Result<Vec<CellValue>, LiteralError> {
        let close = match self.chars.next() {
            Some((_, '(')) => ')',
            Some((_, '[')) => ']',
            Some((offset, found)) => return Err(LiteralError::Unexpected { found, offset }),
            None => return Err(LiteralError::UnexpectedEnd),
        };

        let mut cells = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(cells);
            }
            cells.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(close)?;
            return Ok(cells);
        }
    }

    fn value(&mut self) -> Result<CellValue, LiteralError> {
        match self.peek() {
            Some('\'') | Some('"') => self.string().map(CellValue::Text),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.word(),
            Some(found) => Err(LiteralError::Unexpected {
                found,
                offset: self.offset(),
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let delimiter = match self.chars.next() {
            Some((_, c)) => c,
            None => return Err(LiteralError::UnexpectedEnd),
        };
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some((_, c)) if c == delimiter => return Ok(out),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(LiteralError::UnexpectedEnd),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, c)) => out.push(c),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<CellValue, LiteralError> {
        let start = self.offset();
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_')
        ) {
            self.chars.next();
        }
        let token = self.src[start..self.offset()].replace('_', "");
        parse_number(&token)
    }

    fn word(&mut self) -> Result<CellValue, LiteralError> {
        let start = self.offset();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
            self.chars.next();
        }
        let name = &self.src[start..self.offset()];

        self.skip_ws();
        if self.peek() != Some('(') {
            return match name {
                "None" | "NULL" | "null" => Ok(CellValue::Null),
                "True" | "true" => Ok(CellValue::Bool(true)),
                "False" | "false" => Ok(CellValue::Bool(false)),
                _ => {
                    let offset = start;
                    let found = name.chars().next().unwrap_or('?');
                    Err(LiteralError::Unexpected { found, offset })
                }
            };
        }

        // Constructor call: Decimal('1.5'), datetime.date(2024, 1, 2), ...
        self.expect('(')?;
        if self.depth >= MAX_NESTING {
            return Err(LiteralError::TooDeep);
        }
        self.depth += 1;
        let args = self.arguments();
        self.depth -= 1;
        let args = args?;
        let end = self.offset();

        match (name, args.as_slice()) {
            ("Decimal", [CellValue::Text(s)]) => parse_number(s),
            ("Decimal", [n @ (CellValue::Integer(_) | CellValue::Float(_))]) => Ok(n.clone()),
            _ => Ok(CellValue::Text(self.src[start..end].to_string())),
        }
    }
}

impl LiteralParser<'_> {
    fn arguments(&mut self) -> Result<Vec<CellValue>, LiteralError> {
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                return Ok(args);
            }
            args.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(args);
        }
    }
}

fn parse_number(token: &str) -> Result<CellValue, LiteralError> {
    if let Ok(i) = token.parse::<i64>() {
        return Ok(CellValue::Integer(i));
    }
    token
        .parse::<f64>()
        .map(CellValue::Float)
        .map_err(|_| LiteralError::InvalidNumber(token.to_string()))
}
