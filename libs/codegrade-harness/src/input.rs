/// Literal Input Parser
///
/// Turns the free-form `input_data` of a test case into an ordered list of
/// typed arguments. Precedence is structure first, then line count, then
/// token count:
///
/// 1. Blank input → no arguments
/// 2. JSON array → one argument per element; JSON object or scalar → one argument
/// 3. Several non-blank lines → one coerced argument per line
/// 4. One line with several whitespace tokens → one coerced argument per token
/// 5. Otherwise → the whole trimmed input, coerced, as a single argument
///
/// Coercion: optional sign plus digits → integer; contains `.` and parses →
/// float; anything else stays a trimmed string.

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered mapping
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Plain text form, used when a literal has to be forced into a string slot
    pub fn to_plain_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::List(_) | Value::Map(_) => self.to_json(),
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_json(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_json).collect();
                format!("[{}]", inner.join(","))
            }
            Value::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}:{}", quote_json(k), v.to_json()))
                    .collect();
                format!("{{{}}}", inner.join(","))
            }
        }
    }
}

/// Ordered argument list derived from one `input_data` string
pub type ParsedInput = Vec<Value>;

pub fn parse(raw: &str) -> ParsedInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return match json {
            serde_json::Value::Array(items) => items.into_iter().map(from_json).collect(),
            other => vec![from_json(other)],
        };
    }

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() > 1 {
        return lines.into_iter().map(coerce_scalar).collect();
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > 1 {
        return tokens.into_iter().map(coerce_scalar).collect();
    }

    vec![coerce_scalar(trimmed)]
}

/// Integer, then float, then string
pub fn coerce_scalar(text: &str) -> Value {
    let text = text.trim();
    let digits = text.strip_prefix('-').or_else(|| text.strip_prefix('+')).unwrap_or(text);

    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
    }

    if text.contains('.') {
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
    }

    Value::Str(text.to_string())
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

/// Float text that always keeps a decimal point or exponent
pub fn format_float(f: f64) -> String {
    let text = format!("{:?}", f);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

pub fn quote_json(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
