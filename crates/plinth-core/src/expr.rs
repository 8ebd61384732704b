//! Built-in expression language for `@` defaults and variables.
//!
//! ```text
//! variables["vendor"] ~ "/" ~ lower(answers["name"])
//! answers["license"] == "MIT" ? "permissive" : "other"
//! ```
//!
//! Supported: string, number, `true`/`false`/`null` literals, `variables[..]`
//! and `answers[..]` lookups (also `variables.key`), `!`, `&&`, `||`, `==`,
//! `!=`, `~` (string concatenation), `+`/`-`, `cond ? a : b`, parentheses and
//! the functions `lower`, `upper`, `trim` and `slug`. Branches of `?:`, `&&`
//! and `||` are evaluated lazily so unused lookups never fail.

use crate::defaults::{EvalError, ExpressionEvaluator, ExpressionScope};
use serde_json::{Number, Value};

/// Default [`ExpressionEvaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEvaluator;

impl ExpressionEvaluator for BasicEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        scope: &mut dyn ExpressionScope,
    ) -> Result<Value, EvalError> {
        let node = parse(expression)?;
        node.eval(scope)
    }
}

/// Deepest nesting of parentheses, ternaries and unary operators.
const MAX_DEPTH: usize = 64;

/// Longest accepted expression, in tokens. Bounds operator chains, which
/// parse iteratively but still build nested trees.
const MAX_TOKENS: usize = 1024;

/// Parse expression text into a syntax tree.
fn parse(text: &str) -> Result<Node, EvalError> {
    let tokens = tokenize(text)?;
    if tokens.len() > MAX_TOKENS {
        return Err(EvalError::Syntax(format!(
            "expression is longer than {MAX_TOKENS} tokens"
        )));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.ternary()?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(EvalError::Syntax(format!("unexpected {}", token.describe()))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Variables,
    Answers,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Lookup(Namespace, String),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Eq(Box<Node>, Box<Node>),
    Ne(Box<Node>, Box<Node>),
    Concat(Box<Node>, Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
}

impl Node {
    fn eval(&self, scope: &mut dyn ExpressionScope) -> Result<Value, EvalError> {
        match self {
            Node::Literal(value) => Ok(value.clone()),
            Node::Lookup(Namespace::Variables, key) => Ok(scope.variable(key)?),
            Node::Lookup(Namespace::Answers, key) => Ok(scope.answer(key)?),
            Node::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(scope)?))),
            Node::And(left, right) => {
                if truthy(&left.eval(scope)?) {
                    Ok(Value::Bool(truthy(&right.eval(scope)?)))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            Node::Or(left, right) => {
                if truthy(&left.eval(scope)?) {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(truthy(&right.eval(scope)?)))
                }
            }
            Node::Eq(left, right) => Ok(Value::Bool(loose_eq(
                &left.eval(scope)?,
                &right.eval(scope)?,
            ))),
            Node::Ne(left, right) => Ok(Value::Bool(!loose_eq(
                &left.eval(scope)?,
                &right.eval(scope)?,
            ))),
            Node::Concat(left, right) => {
                let mut text = to_text(&left.eval(scope)?)?;
                text.push_str(&to_text(&right.eval(scope)?)?);
                Ok(Value::String(text))
            }
            Node::Add(left, right) => {
                let (left, right) = (left.eval(scope)?, right.eval(scope)?);
                match (&left, &right) {
                    (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
                    _ => arithmetic(&left, &right, "+", |a, b| a.checked_add(b), |a, b| a + b),
                }
            }
            Node::Sub(left, right) => {
                let (left, right) = (left.eval(scope)?, right.eval(scope)?);
                arithmetic(&left, &right, "-", |a, b| a.checked_sub(b), |a, b| a - b)
            }
            Node::Ternary(condition, then, otherwise) => {
                if truthy(&condition.eval(scope)?) {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
            Node::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, &values)
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numbers compare by value so `1 == 1.0` holds.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn to_text(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => Err(EvalError::Runtime(format!(
            "cannot convert {} to a string",
            type_name(value)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    op: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(EvalError::Runtime(format!(
            "cannot apply `{op}` to {} and {}",
            type_name(left),
            type_name(right)
        )));
    };
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(result) = int_op(a, b) {
            return Ok(Value::Number(result.into()));
        }
    }
    let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    Number::from_f64(float_op(a, b))
        .map(Value::Number)
        .ok_or_else(|| EvalError::Runtime(format!("`{op}` produced a non-finite number")))
}

fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let [arg] = args else {
        return Err(EvalError::Runtime(format!(
            "{name}() takes 1 argument, {} given",
            args.len()
        )));
    };
    let text = to_text(arg)?;
    let result = match name {
        "lower" => text.to_lowercase(),
        "upper" => text.to_uppercase(),
        "trim" => text.trim().to_string(),
        "slug" => slugify(&text),
        _ => return Err(EvalError::Runtime(format!("unknown function `{name}`"))),
    };
    Ok(Value::String(result))
}

/// Lowercase, with every run of non-alphanumerics collapsed into one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(Number),
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
    Comma,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Tilde,
    Plus,
    Minus,
    Question,
    Colon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Str(s) => format!("string {s:?}"),
            Token::Num(n) => format!("number {n}"),
            Token::Ident(name) => format!("identifier `{name}`"),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Bang => "!",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Tilde => "~",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Str(_) | Token::Num(_) | Token::Ident(_) => "",
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '"' | '\'' => {
                let (literal, end) = read_string(&chars, i)?;
                i = end;
                tokens.push(Token::Str(literal));
                continue;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)?));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            '&' if next == Some('&') => Token::AndAnd,
            '|' if next == Some('|') => Token::OrOr,
            '=' if next == Some('=') => Token::EqEq,
            '!' if next == Some('=') => Token::NotEq,
            '!' => Token::Bang,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '~' => Token::Tilde,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '?' => Token::Question,
            ':' => Token::Colon,
            other => {
                return Err(EvalError::Syntax(format!(
                    "unexpected character '{other}' at offset {i}"
                )))
            }
        };
        i += token.symbol().len();
        tokens.push(token);
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start`; returns the literal and the index past it.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| EvalError::Syntax("unterminated escape".into()))?;
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((literal, i + 1)),
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    Err(EvalError::Syntax("unterminated string literal".into()))
}

fn parse_number(literal: &str) -> Result<Number, EvalError> {
    if let Ok(int) = literal.parse::<i64>() {
        return Ok(int.into());
    }
    literal
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| EvalError::Syntax(format!("invalid number `{literal}`")))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::Syntax(format!(
                "expression nested deeper than {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

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

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(EvalError::Syntax(format!(
                "expected `{}`, found {}",
                expected.symbol(),
                token.describe()
            ))),
            None => Err(EvalError::Syntax(format!(
                "expected `{}`, found end of expression",
                expected.symbol()
            ))),
        }
    }

    fn ternary(&mut self) -> Result<Node, EvalError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Node, EvalError> {
        let condition = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.ternary()?;
        self.expect(Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Node::Ternary(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn or(&mut self) -> Result<Node, EvalError> {
        let mut node = self.and()?;
        while self.eat(&Token::OrOr) {
            node = Node::Or(Box::new(node), Box::new(self.and()?));
        }
        Ok(node)
    }

    fn and(&mut self) -> Result<Node, EvalError> {
        let mut node = self.equality()?;
        while self.eat(&Token::AndAnd) {
            node = Node::And(Box::new(node), Box::new(self.equality()?));
        }
        Ok(node)
    }

    fn equality(&mut self) -> Result<Node, EvalError> {
        let mut node = self.additive()?;
        loop {
            if self.eat(&Token::EqEq) {
                node = Node::Eq(Box::new(node), Box::new(self.additive()?));
            } else if self.eat(&Token::NotEq) {
                node = Node::Ne(Box::new(node), Box::new(self.additive()?));
            } else {
                return Ok(node);
            }
        }
    }

    fn additive(&mut self) -> Result<Node, EvalError> {
        let mut node = self.unary()?;
        loop {
            if self.eat(&Token::Tilde) {
                node = Node::Concat(Box::new(node), Box::new(self.unary()?));
            } else if self.eat(&Token::Plus) {
                node = Node::Add(Box::new(node), Box::new(self.unary()?));
            } else if self.eat(&Token::Minus) {
                node = Node::Sub(Box::new(node), Box::new(self.unary()?));
            } else {
                return Ok(node);
            }
        }
    }

    fn unary(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::Bang) {
            return Ok(Node::Not(Box::new(self.nested(Self::unary)?)));
        }
        if self.eat(&Token::Minus) {
            let operand = self.nested(Self::unary)?;
            return Ok(Node::Sub(
                Box::new(Node::Literal(Value::Number(0.into()))),
                Box::new(operand),
            ));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, EvalError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Node::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Node::Literal(Value::Number(n))),
            Some(Token::LParen) => {
                let node = self.ternary()?;
                self.expect(Token::RParen)?;
                Ok(node)
            }
            Some(Token::Ident(name)) => self.identifier(name),
            Some(token) => Err(EvalError::Syntax(format!("unexpected {}", token.describe()))),
            None => Err(EvalError::Syntax("unexpected end of expression".into())),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Node, EvalError> {
        let namespace = match name.as_str() {
            "true" => return Ok(Node::Literal(Value::Bool(true))),
            "false" => return Ok(Node::Literal(Value::Bool(false))),
            "null" => return Ok(Node::Literal(Value::Null)),
            "variables" => Namespace::Variables,
            "answers" => Namespace::Answers,
            _ if self.peek() == Some(&Token::LParen) => return self.call(name),
            _ => return Err(EvalError::Syntax(format!("unknown identifier `{name}`"))),
        };

        let key = if self.eat(&Token::LBracket) {
            let key = match self.next() {
                Some(Token::Str(key)) => key,
                Some(token) => {
                    return Err(EvalError::Syntax(format!(
                        "expected a quoted key, found {}",
                        token.describe()
                    )))
                }
                None => return Err(EvalError::Syntax("expected a quoted key".into())),
            };
            self.expect(Token::RBracket)?;
            key
        } else if self.eat(&Token::Dot) {
            match self.next() {
                Some(Token::Ident(key)) => key,
                _ => return Err(EvalError::Syntax(format!("expected a key after `{name}.`"))),
            }
        } else {
            return Err(EvalError::Syntax(format!("`{name}` must be indexed")));
        };

        Ok(Node::Lookup(namespace, key))
    }

    fn call(&mut self, name: String) -> Result<Node, EvalError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.ternary()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }
        Ok(Node::Call(name, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScaffoldError;
    use serde_json::{json, Map};

    /// Scope over fixed maps, without variable recursion.
    struct MapScope {
        variables: Map<String, Value>,
        answers: Map<String, Value>,
    }

    impl MapScope {
        fn new(variables: Value, answers: Value) -> Self {
            Self {
                variables: variables.as_object().cloned().unwrap_or_default(),
                answers: answers.as_object().cloned().unwrap_or_default(),
            }
        }
    }

    impl ExpressionScope for MapScope {
        fn variable(&mut self, key: &str) -> crate::Result<Value> {
            self.variables
                .get(key)
                .cloned()
                .ok_or_else(|| ScaffoldError::UndefinedVariable { name: key.into() })
        }

        fn answer(&self, key: &str) -> crate::Result<Value> {
            self.answers
                .get(key)
                .cloned()
                .ok_or_else(|| ScaffoldError::UndefinedAnswer { name: key.into() })
        }
    }

    fn eval(expression: &str, scope: &mut MapScope) -> Result<Value, EvalError> {
        BasicEvaluator.evaluate(expression, scope)
    }

    #[test]
    fn test_concatenation_and_functions() {
        let mut scope = MapScope::new(json!({"vendor": "Acme"}), json!({"name": " My App "}));
        assert_eq!(
            eval(r#"lower(variables["vendor"]) ~ "/" ~ slug(answers.name)"#, &mut scope).unwrap(),
            json!("acme/my-app")
        );
        assert_eq!(
            eval(r#"upper(trim(answers["name"]))"#, &mut scope).unwrap(),
            json!("MY APP")
        );
    }

    #[test]
    fn test_ternary_is_lazy() {
        let mut scope = MapScope::new(json!({}), json!({"license": "MIT"}));
        // The untaken branch references an unknown answer
        let value = eval(
            r#"answers["license"] == "MIT" ? "permissive" : answers["missing"]"#,
            &mut scope,
        )
        .unwrap();
        assert_eq!(value, json!("permissive"));
    }

    #[test]
    fn test_boolean_operators() {
        let mut scope = MapScope::new(json!({}), json!({"a": true, "b": "", "n": 0}));
        assert_eq!(eval(r#"answers.a && !answers.b"#, &mut scope).unwrap(), json!(true));
        assert_eq!(eval(r#"answers.n || answers.b"#, &mut scope).unwrap(), json!(false));
        assert_eq!(eval(r#"answers.n != 0"#, &mut scope).unwrap(), json!(false));
        assert_eq!(eval("1 == 1.0", &mut scope).unwrap(), json!(true));
    }

    #[test]
    fn test_arithmetic() {
        let mut scope = MapScope::new(json!({"year": 2024}), json!({}));
        assert_eq!(eval("variables.year + 1", &mut scope).unwrap(), json!(2025));
        assert_eq!(eval("(10 - 2.5) - 1", &mut scope).unwrap(), json!(6.5));
        assert_eq!(eval("-3 + 1", &mut scope).unwrap(), json!(-2));
        assert_eq!(eval(r#""a" + 'b'"#, &mut scope).unwrap(), json!("ab"));
        assert!(matches!(
            eval(r#""a" - 1"#, &mut scope),
            Err(EvalError::Runtime(_))
        ));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let mut scope = MapScope::new(json!({}), json!({}));
        let nested = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        for text in ["!".repeat(100_000) + "true", nested, "1 + ".repeat(5_000) + "1"] {
            assert!(matches!(eval(&text, &mut scope), Err(EvalError::Syntax(_))));
        }

        let bangs = "!".repeat(MAX_DEPTH + 1) + "true";
        assert!(matches!(eval(&bangs, &mut scope), Err(EvalError::Syntax(_))));
        let parens = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(matches!(eval(&parens, &mut scope), Err(EvalError::Syntax(_))));
        let shallow = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(eval(&shallow, &mut scope).unwrap(), json!(1));
    }

    #[test]
    fn test_scope_errors_pass_through() {
        let mut scope = MapScope::new(json!({}), json!({}));
        let err = eval(r#"answers["later"]"#, &mut scope).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Scope(ScaffoldError::UndefinedAnswer { .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        let mut scope = MapScope::new(json!({}), json!({}));
        for bad in [
            r#"answers["x""#,
            "answers",
            "unknown",
            r#""open"#,
            "1 +",
            "a ? b",
            "#",
            "variables[1]",
            "true false",
        ] {
            assert!(
                matches!(eval(bad, &mut scope), Err(EvalError::Syntax(_))),
                "expected syntax error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_unknown_function_and_arity() {
        let mut scope = MapScope::new(json!({}), json!({}));
        assert!(matches!(eval("shout('x')", &mut scope), Err(EvalError::Runtime(_))));
        assert!(matches!(eval("lower('a', 'b')", &mut scope), Err(EvalError::Runtime(_))));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("--already--slugged--"), "already-slugged");
        assert_eq!(slugify(""), "");
    }
}
