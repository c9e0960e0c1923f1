//! Best-effort signature inference.
//!
//! Used only when the submission is a bare function body with no header to
//! read. Parameter names come from identifiers the body reads but never
//! declares, in order of first appearance; parameter types (Java) come from
//! the parsed test inputs. When the body does not mention enough names, a
//! fixed pool (`a`, `b`, `c`, ...) fills the gap and the result is marked as
//! a guess.

use super::scan::mask_literals;
use super::{Param, Signature};
use crate::input::Value;
use codegrade_common::types::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const NAME_POOL: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h"];

const PYTHON_RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield", "self", "cls", "print", "len", "range", "int", "str",
    "float", "list", "dict", "set", "tuple", "bool", "sum", "min", "max", "abs", "sorted",
    "reversed", "enumerate", "zip", "map", "filter", "any", "all", "round", "input",
    "isinstance", "type", "ord", "chr", "divmod", "pow", "iter", "next", "json", "math",
];

const JAVA_RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
    "throw", "throws", "transient", "try", "void", "volatile", "while", "true", "false",
    "null", "var", "System", "out", "err", "println", "print", "printf", "String", "Math",
    "Arrays", "List", "ArrayList", "Map", "HashMap", "Set", "HashSet", "Integer", "Long",
    "Double", "Boolean", "Character", "length", "size", "args",
];

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

static PY_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*([A-Za-z_][\w \t,]*?)[ \t]*=[^=]").unwrap());
static PY_BINDERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:for|as|lambda)\s+([A-Za-z_][\w\s,]*?)\s*(?:\bin\b|:|\)|$)").unwrap()
});
static JAVA_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:int|long|double|float|boolean|char|byte|short|var|[A-Z]\w*(?:\s*<[^;(){}]*?>)?)(?:\s*\[\s*\])*\s+([A-Za-z_]\w*)\s*(?:=|;|:|,|\))",
    )
    .unwrap()
});
static RETURN_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breturn\b[ \t]*([^;\n]*)").unwrap());
static FLOAT_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());
static NEW_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^new\s+(\w+)\s*((?:\[[^\]]*\])+)").unwrap());

/// How much of an inferred signature is backed by the code itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Every parameter name was read out of the body
    Evidence,
    /// At least one parameter name came from the fallback pool
    Guess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferredSignature {
    pub signature: Signature,
    pub confidence: Confidence,
}

/// Infer a header for a bare body, with one parameter per parsed input
pub fn infer_signature(
    language: Language,
    body: &str,
    inputs: &[Value],
    function_name: &str,
) -> InferredSignature {
    let free = free_identifiers(language, body);
    let all_names: HashSet<String> = IDENT
        .find_iter(&mask_literals(body, language))
        .map(|m| m.as_str().to_string())
        .collect();

    let mut names: Vec<String> = free.into_iter().take(inputs.len()).collect();
    let mut confidence = Confidence::Evidence;

    let mut pool = NAME_POOL
        .iter()
        .map(|n| n.to_string())
        .chain((NAME_POOL.len()..).map(|i| format!("arg{}", i)))
        .filter(|n| !all_names.contains(n));
    while names.len() < inputs.len() {
        confidence = Confidence::Guess;
        match pool.next() {
            Some(name) if !names.contains(&name) => names.push(name),
            Some(_) => continue,
            None => break,
        }
    }

    let params: Vec<Param> = names
        .into_iter()
        .zip(inputs)
        .map(|(name, value)| Param {
            type_name: match language {
                Language::Java => Some(java_type_for(value)),
                Language::Python => None,
            },
            name,
            has_default: false,
            variadic: false,
        })
        .collect();

    let return_type = match language {
        Language::Java => Some(infer_java_return_type(body, &params)),
        Language::Python => None,
    };

    let raw_params = params
        .iter()
        .map(|p| match &p.type_name {
            Some(t) => format!("{} {}", t, p.name),
            None => p.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    InferredSignature {
        signature: Signature {
            name: function_name.to_string(),
            params,
            raw_params,
            return_type,
            owner: None,
            throws: None,
        },
        confidence,
    }
}

/// Identifiers the body reads without declaring, in order of first use
pub fn free_identifiers(language: Language, body: &str) -> Vec<String> {
    let masked = mask_literals(body, language);
    let reserved: HashSet<&str> = match language {
        Language::Python => PYTHON_RESERVED.iter().copied().collect(),
        Language::Java => JAVA_RESERVED.iter().copied().collect(),
    };
    let declared = declared_names(language, &masked);

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for m in IDENT.find_iter(&masked) {
        let name = m.as_str();
        if reserved.contains(name) || declared.contains(name) {
            continue;
        }
        if language == Language::Java && name.starts_with(|c: char| c.is_ascii_uppercase()) {
            continue;
        }
        // member access, or the tail of a numeric literal such as `1e5`
        let before = &masked[..m.start()];
        if before.trim_end().ends_with('.') || before.ends_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        if masked[m.end()..].trim_start().starts_with('(') {
            continue;
        }
        if seen.insert(name.to_string()) {
            found.push(name.to_string());
        }
    }
    found
}

fn declared_names(language: Language, masked: &str) -> HashSet<String> {
    let mut declared = HashSet::new();
    match language {
        Language::Python => {
            for caps in PY_ASSIGN.captures_iter(masked).chain(PY_BINDERS.captures_iter(masked)) {
                for target in caps[1].split(',') {
                    let target = target.trim();
                    if IDENT.find(target).map(|m| m.as_str() == target).unwrap_or(false) {
                        declared.insert(target.to_string());
                    }
                }
            }
        }
        Language::Java => {
            for caps in JAVA_DECL.captures_iter(masked) {
                declared.insert(caps[1].to_string());
            }
        }
    }
    declared
}

/// Java parameter type for a parsed input value
pub fn java_type_for(value: &Value) -> String {
    match value {
        Value::List(items) => {
            let element = items.iter().find(|v| !matches!(v, Value::Null));
            match element {
                Some(inner @ Value::List(_)) => format!("{}[]", java_type_for(inner)),
                Some(Value::Str(_)) => "String[]".to_string(),
                Some(Value::Float(_)) => "double[]".to_string(),
                Some(Value::Bool(_)) => "boolean[]".to_string(),
                _ => "int[]".to_string(),
            }
        }
        Value::Str(_) => "String".to_string(),
        Value::Float(_) => "double".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        _ => "int".to_string(),
    }
}

fn infer_java_return_type(body: &str, params: &[Param]) -> String {
    let masked = mask_literals(body, Language::Java);
    let Some(caps) = RETURN_EXPR.captures(&masked) else {
        return "void".to_string();
    };
    let start = caps.get(1).map(|m| m.start()).unwrap_or(0);
    let end = caps.get(1).map(|m| m.end()).unwrap_or(0);
    // read the expression from the original text so literals are visible
    let expr = body[start..end].trim();

    if expr.is_empty() {
        return "void".to_string();
    }
    if expr.starts_with('"') {
        return "String".to_string();
    }
    if expr.starts_with('\'') {
        return "char".to_string();
    }
    if expr == "true" || expr == "false" || expr.starts_with('!') {
        return "boolean".to_string();
    }
    if FLOAT_LITERAL.is_match(expr) {
        return "double".to_string();
    }
    if let Some(array) = NEW_ARRAY.captures(expr) {
        let dims = array[2].matches('[').count();
        return format!("{}{}", &array[1], "[]".repeat(dims));
    }
    if let Some(param) = params.iter().find(|p| p.name == expr) {
        if let Some(t) = &param.type_name {
            return t.clone();
        }
    }
    "int".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_body_uses_free_names() {
        let inferred = infer_signature(
            Language::Python,
            "return a + b",
            &[Value::Int(2), Value::Int(3)],
            "solve",
        );
        let names: Vec<_> = inferred.signature.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(inferred.confidence, Confidence::Evidence);
        assert_eq!(inferred.signature.raw_params, "a, b");
    }

    #[test]
    fn test_python_locals_and_calls_are_not_parameters() {
        let body = "total = 0\nfor x in nums:\n    total += x\nreturn helper(total)";
        assert_eq!(free_identifiers(Language::Python, body), vec!["nums"]);
    }

    #[test]
    fn test_pool_fills_missing_names() {
        let inferred = infer_signature(
            Language::Python,
            "return 42",
            &[Value::Int(1), Value::Int(2)],
            "solve",
        );
        let names: Vec<_> = inferred.signature.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(inferred.confidence, Confidence::Guess);
    }

    #[test]
    fn test_pool_skips_names_already_in_body() {
        let inferred = infer_signature(Language::Python, "a = 1\nreturn a", &[Value::Int(1)], "f");
        assert_eq!(inferred.signature.params[0].name, "b");
    }

    #[test]
    fn test_zero_inputs_means_zero_params() {
        let inferred = infer_signature(Language::Python, "return x", &[], "solve");
        assert!(inferred.signature.params.is_empty());
        assert_eq!(inferred.confidence, Confidence::Evidence);
    }

    #[test]
    fn test_java_types_follow_inputs() {
        let inputs = vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::Str("x".to_string()),
            Value::Float(0.5),
            Value::Int(3),
        ];
        let body = "int total = 0;\nfor (int v : nums) total += v;\nreturn total + s.length() + k + (int) ratio;";
        let inferred = infer_signature(Language::Java, body, &inputs, "solve");
        let rendered = inferred.signature.raw_params;
        assert_eq!(rendered, "int[] nums, String s, double k, int ratio");
        assert_eq!(inferred.signature.return_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_java_return_type_inference() {
        let params: Vec<Param> = vec![];
        assert_eq!(infer_java_return_type("return \"hi\";", &params), "String");
        assert_eq!(infer_java_return_type("return true;", &params), "boolean");
        assert_eq!(infer_java_return_type("return 1.5;", &params), "double");
        assert_eq!(infer_java_return_type("return new int[n];", &params), "int[]");
        assert_eq!(infer_java_return_type("System.out.println(1);", &params), "void");
    }

    #[test]
    fn test_java_type_for_nested_lists() {
        let grid = Value::List(vec![Value::List(vec![Value::Int(1)])]);
        assert_eq!(java_type_for(&grid), "int[][]");
        assert_eq!(java_type_for(&Value::List(vec![])), "int[]");
    }
}
