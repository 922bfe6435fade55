//! A small pandas-style query language used by every `--query` flag.
//!
//! ```text
//! access == "CC0"
//! `Object Name` in ["Vase", "Bowl"] and not `Is Highlight`
//! 1850 <= `Object Begin Date` < 1900 | Department == 'Arms and Armor'
//! ```
//!
//! Missing cells are `None`; like pandas, `None` compares unequal to
//! everything (including itself), and ordering between mismatched types is
//! false rather than an error.

use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Value),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    Literal(Value),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Column(String),
    Literal(Value),
    List(Vec<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(|message| query_error(source, message))?;
        if tokens.is_empty() {
            return Err(query_error(source, "query is empty"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(|message| query_error(source, message))?;
        if let Some(token) = parser.peek() {
            return Err(query_error(source, format!("unexpected token {:?}", token)));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Every column the query refers to.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut columns = BTreeSet::new();
        collect_columns(&self.expr, &mut columns);
        columns
    }

    /// Fails when the query refers to a column the table does not have.
    pub fn check_columns(&self, available: &[String]) -> Result<()> {
        match self
            .columns()
            .into_iter()
            .find(|column| !available.contains(column))
        {
            Some(missing) => Err(query_error(
                &self.source,
                format!("name '{}' is not a column", missing),
            )),
            None => Ok(()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        truthy(&eval(&self.expr, record))
    }
}

fn query_error(query: &str, message: impl Into<String>) -> EtlError {
    EtlError::QueryError {
        query: query.to_string(),
        message: message.into(),
    }
}

fn collect_columns(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Column(name) => {
            out.insert(name.clone());
        }
        Expr::Literal(_) => {}
        Expr::List(items) => items.iter().for_each(|item| collect_columns(item, out)),
        Expr::Compare(a, _, b) | Expr::And(a, b) | Expr::Or(a, b) => {
            collect_columns(a, out);
            collect_columns(b, out);
        }
        Expr::In {
            needle, haystack, ..
        } => {
            collect_columns(needle, out);
            collect_columns(haystack, out);
        }
        Expr::Not(inner) => collect_columns(inner, out),
    }
}

fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(format!("unexpected '{}' at position {}", c, i)),
                };
                tokens.push(Token::Cmp(op));
                i += width;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|ch| *ch == '`')
                    .map(|offset| start + offset)
                    .ok_or_else(|| "unterminated back-quoted column name".to_string())?;
                tokens.push(Token::Ident(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().filter(|ch| **ch != '_').collect();
                tokens.push(Token::Num(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "True" => Token::Literal(Value::Bool(true)),
                    "False" => Token::Literal(Value::Bool(false)),
                    "None" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected '{}' at position {}", other, i)),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> std::result::Result<Value, String> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Value::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("invalid number '{}'", text))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> std::result::Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    /// `a < b <= c` expands to `a < b and b <= c`.
    fn parse_comparison(&mut self) -> std::result::Result<Expr, String> {
        let first = self.parse_operand()?;
        let mut result: Option<Expr> = None;
        let mut left = first.clone();

        loop {
            let step = match self.peek() {
                Some(Token::Cmp(op)) => {
                    let op = *op;
                    self.pos += 1;
                    let right = self.parse_operand()?;
                    let step = Expr::Compare(Box::new(left), op, Box::new(right.clone()));
                    left = right;
                    step
                }
                Some(Token::In) => {
                    self.pos += 1;
                    let haystack = self.parse_operand()?;
                    let step = Expr::In {
                        needle: Box::new(left),
                        haystack: Box::new(haystack.clone()),
                        negated: false,
                    };
                    left = haystack;
                    step
                }
                Some(Token::Not) if self.tokens.get(self.pos + 1) == Some(&Token::In) => {
                    self.pos += 2;
                    let haystack = self.parse_operand()?;
                    let step = Expr::In {
                        needle: Box::new(left),
                        haystack: Box::new(haystack.clone()),
                        negated: true,
                    };
                    left = haystack;
                    step
                }
                _ => break,
            };
            result = Some(match result {
                None => step,
                Some(prev) => Expr::And(Box::new(prev), Box::new(step)),
            });
        }

        Ok(result.unwrap_or(first))
    }

    fn parse_operand(&mut self) -> std::result::Result<Expr, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::Column(name)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(n)),
            Some(Token::Literal(v)) => Ok(Expr::Literal(v)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')'".to_string());
                }
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_operand()?);
                    if self.eat(&Token::Comma) {
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        continue;
                    }
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                    return Err("expected ',' or ']' in list".to_string());
                }
                Ok(Expr::List(items))
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of query".to_string()),
        }
    }
}

fn eval(expr: &Expr, record: &Record) -> Value {
    match expr {
        Expr::Column(name) => record.get(name).cloned().unwrap_or(Value::Null),
        Expr::Literal(value) => value.clone(),
        Expr::List(items) => Value::Array(items.iter().map(|item| eval(item, record)).collect()),
        Expr::Compare(a, op, b) => Value::Bool(compare(&eval(a, record), *op, &eval(b, record))),
        Expr::In {
            needle,
            haystack,
            negated,
        } => {
            let needle = eval(needle, record);
            let found = match eval(haystack, record) {
                Value::Array(items) => items.iter().any(|item| compare(&needle, CmpOp::Eq, item)),
                other => compare(&needle, CmpOp::Eq, &other),
            };
            Value::Bool(found != *negated)
        }
        Expr::And(a, b) => Value::Bool(truthy(&eval(a, record)) && truthy(&eval(b, record))),
        Expr::Or(a, b) => Value::Bool(truthy(&eval(a, record)) || truthy(&eval(b, record))),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, record))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn compare(a: &Value, op: CmpOp, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return op == CmpOp::Ne;
    }
    match (ordering(a, b), op) {
        (Some(ord), CmpOp::Eq) => ord == Ordering::Equal,
        (Some(ord), CmpOp::Ne) => ord != Ordering::Equal,
        (Some(ord), CmpOp::Lt) => ord == Ordering::Less,
        (Some(ord), CmpOp::Le) => ord != Ordering::Greater,
        (Some(ord), CmpOp::Gt) => ord == Ordering::Greater,
        (Some(ord), CmpOp::Ge) => ord != Ordering::Less,
        (None, CmpOp::Ne) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        let mut record = Record::default();
        for (k, v) in value.as_object().unwrap() {
            record.insert(k.clone(), v.clone());
        }
        record
    }

    #[test]
    fn test_string_equality() {
        let query = Query::parse(r#"access == "CC0""#).unwrap();
        assert!(query.matches(&record(json!({"access": "CC0"}))));
        assert!(!query.matches(&record(json!({"access": "Usage conditions apply"}))));
        assert!(!query.matches(&record(json!({"access": null}))));
    }

    #[test]
    fn test_backquoted_columns_and_boolean_logic() {
        let query =
            Query::parse("`Is Public Domain` and (`Object Name` == 'Vase' or Department != \"Arms\")")
                .unwrap();
        assert_eq!(
            query.columns().into_iter().collect::<Vec<_>>(),
            vec!["Department", "Is Public Domain", "Object Name"]
        );
        assert!(query.matches(&record(json!({
            "Is Public Domain": true, "Object Name": "Bowl", "Department": "Asian Art"
        }))));
        assert!(!query.matches(&record(json!({
            "Is Public Domain": false, "Object Name": "Vase", "Department": "Asian Art"
        }))));
        assert!(!query.matches(&record(json!({
            "Is Public Domain": true, "Object Name": "Sword", "Department": "Arms"
        }))));
    }

    #[test]
    fn test_numeric_and_chained_comparisons() {
        let query = Query::parse("1850 <= year < 1900 & image_height > 2000.5").unwrap();
        assert!(query.matches(&record(json!({"year": 1850, "image_height": 3000}))));
        assert!(!query.matches(&record(json!({"year": 1900, "image_height": 3000}))));
        assert!(!query.matches(&record(json!({"year": 1875, "image_height": 2000}))));
        assert!(!query.matches(&record(json!({"year": "1875", "image_height": 3000}))));
    }

    #[test]
    fn test_in_and_not_in() {
        let query = Query::parse("object_type in ['Chair', 'Table'] and not unit_code in ['NMAH']").unwrap();
        assert!(query.matches(&record(json!({"object_type": "Chair", "unit_code": "CHNDM"}))));
        assert!(!query.matches(&record(json!({"object_type": "Chair", "unit_code": "NMAH"}))));

        let query = Query::parse("unit_code not in ['NMAH', 'SAAM']").unwrap();
        assert!(query.matches(&record(json!({"unit_code": "CHNDM"}))));
        assert!(!query.matches(&record(json!({"unit_code": "SAAM"}))));
    }

    #[test]
    fn test_null_semantics() {
        let eq = Query::parse("date == None").unwrap();
        let ne = Query::parse("date != 'x'").unwrap();
        assert!(!eq.matches(&record(json!({"date": null}))));
        assert!(ne.matches(&record(json!({"date": null}))));
        assert!(ne.matches(&record(json!({}))));
    }

    #[test]
    fn test_check_columns() {
        let query = Query::parse("`Object Name` == 'Vase'").unwrap();
        assert!(query.check_columns(&["Object Name".to_string()]).is_ok());
        let err = query.check_columns(&["Medium".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Object Name"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Query::parse("").is_err());
        assert!(Query::parse("access ==").is_err());
        assert!(Query::parse("access = 'CC0'").is_err());
        assert!(Query::parse("(access == 'CC0'").is_err());
        assert!(Query::parse("access == 'CC0").is_err());
        assert!(Query::parse("a == 1 b").is_err());
    }
}
