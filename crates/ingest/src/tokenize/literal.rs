//! Decoder for Python-literal renderings of log envelopes.
//!
//! Raw files written by older collectors contain lines such as
//! `{'log': 'stdout F 2024-05-01 ...', 'stream': 'stdout'}` rather than JSON.
//! This accepts dicts, lists, tuples, quoted strings, numbers and the
//! `True` / `False` / `None` constants, and yields the equivalent JSON value.

use serde_json::{Map, Number, Value};

/// Same nesting limit serde_json applies.
const MAX_DEPTH: usize = 128;

pub fn parse_literal(input: &str) -> Result<Value, String> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(format!("trailing input at offset {}", parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected '{want}', found '{c}' at offset {}", self.pos)),
            None => Err(format!("expected '{want}', found end of input")),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.nested(Self::dict),
            Some('[') => self.nested(|p| p.sequence('[', ']')),
            Some('(') => self.nested(|p| p.sequence('(', ')')),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.constant(),
            Some(c) => Err(format!("unexpected '{c}' at offset {}", self.pos)),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, String>,
    ) -> Result<Value, String> {
        if self.depth >= MAX_DEPTH {
            return Err(format!("nesting too deep at offset {}", self.pos));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn dict(&mut self) -> Result<Value, String> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => "null".to_string(),
                other => return Err(format!("unsupported dict key: {other}")),
            };
            self.skip_ws();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(format!("expected ',' or '}}', found '{c}'")),
                None => return Err("unterminated dict".to_string()),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, String> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => return Err(format!("expected ',' or '{close}', found '{c}'")),
                None => return Err("unterminated sequence".to_string()),
            }
        }
    }

    fn string(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("unexpected end of input")?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), String> {
        let c = self.bump().ok_or("unterminated escape")?;
        match c {
            '\\' | '\'' | '"' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            '\n' => {}
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, String> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or("truncated hex escape")?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| format!("bad hex escape: {e}"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number: {raw}"))
    }

    fn constant(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            other => Err(format!("unknown name: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_python_dict() {
        let v = parse_literal(
            "{'log': 'stdout F hello | it\\'s', 'stream': \"stdout\", 'n': 3, 'ok': True, 'x': None}",
        )
        .unwrap();
        assert_eq!(v["log"], "stdout F hello | it's");
        assert_eq!(v["stream"], "stdout");
        assert_eq!(v["n"], 3);
        assert_eq!(v["ok"], true);
        assert!(v["x"].is_null());
    }

    #[test]
    fn parses_nested_sequences_and_floats() {
        let v = parse_literal("{'sort': [1714557600000, (2, 3)], 'score': -1.5,}").unwrap();
        assert_eq!(v["sort"][0], 1714557600000_i64);
        assert_eq!(v["sort"][1][1], 3);
        assert_eq!(v["score"], -1.5);
    }

    #[test]
    fn decodes_escapes() {
        let v = parse_literal(r"'tab\there \x41é\n'").unwrap();
        assert_eq!(v, Value::String("tab\there A\u{e9}\n".to_string()));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_literal("{'log': 'unterminated}").is_err());
        assert!(parse_literal("{'log' 'x'}").is_err());
        assert!(parse_literal("not a literal").is_err());
        assert!(parse_literal("{'a': 1} trailing").is_err());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let deep = "[".repeat(200_000);
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.contains("nesting too deep"), "{err}");

        let at_limit = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&at_limit).is_ok());
        let over = format!("{}{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(parse_literal(&over).is_err());
    }
}
