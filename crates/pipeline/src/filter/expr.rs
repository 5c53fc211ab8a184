//! `cond` 필터의 조건식
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | "(" expr ")" | compare
//! compare := operand ( op operand )?
//! op      := "==" | "!=" | "<" | "<=" | ">" | ">=" | "=~" | "!~"
//! operand := string | number | true | false | nil | /regex/ | field
//! field   := a.b[0] | [a][b][0]
//! ```
//!
//! 식은 설정 로딩 시 한 번 파싱되며, 정규식도 이때 컴파일됩니다.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use logship_core::LogEvent;
use logship_core::event::value_to_string;

use crate::error::StageError;

/// 파싱된 조건식
#[derive(Debug)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CompareOp, Operand),
    Match {
        operand: Operand,
        regex: Regex,
        negate: bool,
    },
    Truthy(Operand),
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// 피연산자 -- 리터럴 또는 이벤트 필드 경로
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Field(String),
}

impl Operand {
    fn resolve(&self, event: &LogEvent) -> Option<Value> {
        match self {
            Operand::Literal(v) => Some(v.clone()),
            Operand::Field(path) => event.get(path),
        }
    }
}

impl Expr {
    /// 조건식을 파싱합니다.
    pub fn parse(input: &str) -> Result<Self, StageError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: input.len(),
        };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some((offset, tok)) => Err(StageError::Expression {
                offset,
                reason: format!("unexpected token {tok:?}"),
            }),
        }
    }

    /// 이벤트에 대해 조건식을 평가합니다.
    pub fn eval(&self, event: &LogEvent) -> bool {
        match self {
            Expr::Or(a, b) => a.eval(event) || b.eval(event),
            Expr::And(a, b) => a.eval(event) && b.eval(event),
            Expr::Not(inner) => !inner.eval(event),
            Expr::Truthy(operand) => operand.resolve(event).is_some_and(|v| truthy(&v)),
            Expr::Compare(lhs, op, rhs) => {
                let lhs = lhs.resolve(event).unwrap_or(Value::Null);
                let rhs = rhs.resolve(event).unwrap_or(Value::Null);
                compare(&lhs, *op, &rhs)
            }
            Expr::Match {
                operand,
                regex,
                negate,
            } => {
                let matched = match operand.resolve(event) {
                    None | Some(Value::Null) => false,
                    Some(v) => regex.is_match(&value_to_string(&v)),
                };
                matched != *negate
            }
        }
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

fn compare(lhs: &Value, op: CompareOp, rhs: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(lhs, rhs),
        CompareOp::Ne => !values_equal(lhs, rhs),
        _ => {
            let Some(ordering) = order(lhs, rhs) else {
                return false;
            };
            match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Eq | CompareOp::Ne => false,
            }
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Op(CompareOp),
    Match,
    NotMatch,
    Str(String),
    Regex(String),
    Num(f64),
    Bool(bool),
    Nil,
    Field(String),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, StageError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |offset: usize, reason: &str| StageError::Expression {
        offset,
        reason: reason.to_owned(),
    };

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let (token, width) = match (c, next) {
            (c, _) if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('=', Some('=')) => (Token::Op(CompareOp::Eq), 2),
            ('=', Some('~')) => (Token::Match, 2),
            ('!', Some('=')) => (Token::Op(CompareOp::Ne), 2),
            ('!', Some('~')) => (Token::NotMatch, 2),
            ('!', _) => (Token::Not, 1),
            ('<', Some('=')) => (Token::Op(CompareOp::Le), 2),
            ('<', _) => (Token::Op(CompareOp::Lt), 1),
            ('>', Some('=')) => (Token::Op(CompareOp::Ge), 2),
            ('>', _) => (Token::Op(CompareOp::Gt), 1),
            ('"' | '\'', _) => {
                let (s, used) = read_quoted(&chars[i..], c)
                    .ok_or_else(|| err(offset, "unterminated string"))?;
                (Token::Str(s), used)
            }
            ('/', _) => {
                let (s, used) = read_quoted(&chars[i..], '/')
                    .ok_or_else(|| err(offset, "unterminated regex"))?;
                (Token::Regex(s), used)
            }
            ('[', _) => {
                let (path, used) =
                    read_bracket_path(&chars[i..]).ok_or_else(|| err(offset, "malformed field reference"))?;
                (Token::Field(path), used)
            }
            (c, _) if c.is_ascii_digit() || c == '-' => {
                let used = chars[i..]
                    .iter()
                    .enumerate()
                    .take_while(|&(n, &(_, ch))| ch.is_ascii_digit() || ch == '.' || (n == 0 && ch == '-'))
                    .count();
                let text: String = chars[i..i + used].iter().map(|&(_, ch)| ch).collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| err(offset, &format!("invalid number '{text}'")))?;
                (Token::Num(num), used)
            }
            (c, _) if is_ident_start(c) => {
                let used = chars[i..]
                    .iter()
                    .take_while(|&&(_, ch)| is_ident_char(ch))
                    .count();
                let word: String = chars[i..i + used].iter().map(|&(_, ch)| ch).collect();
                let token = match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "nil" | "null" => Token::Nil,
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Field(word),
                };
                (token, used)
            }
            (c, _) => return Err(err(offset, &format!("unexpected character '{c}'"))),
        };

        tokens.push((offset, token));
        i += width;
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '.' | '-' | '[' | ']')
}

/// 따옴표로 감싼 문자열을 읽습니다. `\`는 다음 문자를 그대로 포함합니다.
///
/// 정규식 리터럴은 `\/`만 풀고 나머지 이스케이프는 정규식 엔진에 넘깁니다.
fn read_quoted(chars: &[(usize, char)], quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Some((out, i + 1));
        }
        if c == '\\' {
            let escaped = chars.get(i + 1)?.1;
            if quote == '/' && escaped != '/' {
                out.push('\\');
            }
            out.push(escaped);
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
    None
}

/// `[a][b][0]` 형식을 `a.b[0]` 경로로 변환합니다.
fn read_bracket_path(chars: &[(usize, char)]) -> Option<(String, usize)> {
    let mut path = String::new();
    let mut i = 0;
    while chars.get(i).map(|&(_, c)| c) == Some('[') {
        let len = chars[i + 1..].iter().position(|&(_, c)| c == ']')?;
        let segment: String = chars[i + 1..i + 1 + len].iter().map(|&(_, c)| c).collect();
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }
        if segment.parse::<i64>().is_ok() {
            if path.is_empty() {
                return None;
            }
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
        }
        i += len + 2;
    }
    Some((path, i))
}

// ─── Parser ──────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(o, t)| (*o, t))
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        item
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|(_, t)| t == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_here(&self, reason: &str) -> StageError {
        StageError::Expression {
            offset: self.peek().map_or(self.end, |(o, _)| o),
            reason: reason.to_owned(),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, StageError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, StageError> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, StageError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&Token::RParen) {
                return Err(self.error_here("expected ')'"));
            }
            return Ok(inner);
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, StageError> {
        let lhs = self.parse_operand()?;
        match self.peek().map(|(_, t)| t.clone()) {
            Some(Token::Op(op)) => {
                self.pos += 1;
                let rhs = self.parse_operand()?;
                Ok(Expr::Compare(lhs, op, rhs))
            }
            Some(tok @ (Token::Match | Token::NotMatch)) => {
                self.pos += 1;
                let offset = self.peek().map_or(self.end, |(o, _)| o);
                let pattern = match self.advance() {
                    Some((_, Token::Regex(p) | Token::Str(p))) => p,
                    _ => {
                        return Err(StageError::Expression {
                            offset,
                            reason: "expected regex or string after match operator".to_owned(),
                        });
                    }
                };
                Ok(Expr::Match {
                    operand: lhs,
                    regex: Regex::new(&pattern)?,
                    negate: tok == Token::NotMatch,
                })
            }
            _ => Ok(Expr::Truthy(lhs)),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, StageError> {
        let offset = self.peek().map_or(self.end, |(o, _)| o);
        let operand = match self.advance() {
            Some((_, Token::Str(s))) => Operand::Literal(Value::String(s)),
            Some((_, Token::Num(n))) => Operand::Literal(number(n)),
            Some((_, Token::Bool(b))) => Operand::Literal(Value::Bool(b)),
            Some((_, Token::Nil)) => Operand::Literal(Value::Null),
            Some((_, Token::Field(path))) => Operand::Field(path),
            Some((_, tok)) => {
                return Err(StageError::Expression {
                    offset,
                    reason: format!("expected operand, found {tok:?}"),
                });
            }
            None => {
                return Err(StageError::Expression {
                    offset,
                    reason: "unexpected end of expression".to_owned(),
                });
            }
        };
        Ok(operand)
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> LogEvent {
        let mut event = LogEvent::with_message("GET /index.html 200");
        event.set_value("level", "debug");
        event.set_value("status", 404);
        event.set_value("http", json!({"method": "GET", "latency": 1.5}));
        event.set_value("items", json!(["a", "b"]));
        event.add_tag(["web"]);
        event
    }

    fn eval(src: &str) -> bool {
        Expr::parse(src)
            .unwrap_or_else(|e| panic!("{src}: {e}"))
            .eval(&event())
    }

    #[test]
    fn equality_and_inequality() {
        assert!(eval(r#"[level] == "debug""#));
        assert!(eval(r#"level != "info""#));
        assert!(eval("status == 404"));
        assert!(eval("status == 404.0"));
        assert!(eval("missing == nil"));
    }

    #[test]
    fn ordering_on_numbers_and_strings() {
        assert!(eval("status >= 400 && status < 500"));
        assert!(eval("[http][latency] > 1"));
        assert!(eval(r#"level < "info""#));
        assert!(!eval(r#"status > "400""#));
    }

    #[test]
    fn regex_match() {
        assert!(eval(r#"message =~ /^GET \/index/"#));
        assert!(eval(r#"message !~ "POST""#));
        assert!(!eval("missing =~ /.*/"));
    }

    #[test]
    fn boolean_logic_and_grouping() {
        assert!(eval(r#"!(level == "info") && (status == 1 || status == 404)"#));
        assert!(eval("http.method and items[1]"));
        assert!(!eval("missing || false"));
    }

    #[test]
    fn bracket_paths_with_index() {
        assert!(eval(r#"[items][-1] == "b""#));
        assert!(eval(r#"items[0] == "a""#));
    }

    #[test]
    fn parse_errors_report_offset() {
        let err = Expr::parse("status == ").unwrap_err();
        assert!(matches!(err, StageError::Expression { offset: 10, .. }));

        let err = Expr::parse("(status == 1").unwrap_err();
        assert!(matches!(err, StageError::Expression { .. }));

        let err = Expr::parse(r#"level == "debug"#).unwrap_err();
        assert!(matches!(err, StageError::Expression { offset: 9, .. }));

        assert!(matches!(Expr::parse("message =~ /(/"), Err(StageError::Regex(_))));
    }
}
