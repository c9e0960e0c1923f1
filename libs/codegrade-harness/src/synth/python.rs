//! Python strategy.
//!
//! A function is located by its `def` header; its body region runs from the
//! header to the next blank line or the next line indented no deeper than the
//! `def` itself. The entry block calls the function positionally and prints
//! structured results as compact JSON.

use super::inference::{self, Confidence};
use super::scan::{
    dedent, indent, indent_width, mask_literals, matching_paren, replace_placeholder,
    split_top_level, trim_blank_lines,
};
use super::{BodySpan, LanguageHarness, Located, Param, Signature, SynthesisInput};
use crate::error::SynthesisError;
use crate::input::{format_float, quote_json, Value};
use crate::HarnessDefaults;
use codegrade_common::types::Language;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

static DEF_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)def[ \t]+([A-Za-z_]\w*)[ \t]*\(").unwrap());
/// What follows the closing paren of a `def`: optional annotation, then `:`
static DEF_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]*(?:->([^:\n]*))?:").unwrap());
static DEF_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*def\b").unwrap());
static CLASS_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*class[ \t]+([A-Za-z_]\w*)").unwrap());
static DIRECT_IO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:print|input)\s*\(|\bsys\.std(?:in|out)\b").unwrap());
static TOP_RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*return\b").unwrap());
static JSON_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^import[ \t]+json[ \t]*$").unwrap());

#[derive(Debug, Clone)]
pub struct PythonHarness {
    placeholder: String,
}

impl PythonHarness {
    pub fn new(defaults: &HarnessDefaults) -> Self {
        Self {
            placeholder: defaults.template_placeholder.clone(),
        }
    }

    /// Read the `def` header opened by `caps`; `None` when the parameter
    /// list never closes or no `:` follows it.
    fn locate(&self, code: &str, masked: &str, caps: &Captures) -> Option<Located> {
        let opening = caps.get(0)?;
        let open = opening.end() - 1;
        let close = matching_paren(code, open, Language::Python)?;
        let tail = DEF_TAIL.captures(&masked[close + 1..])?;
        let tail_end = close + 1 + tail.get(0)?.end();

        let raw = &code[open + 1..close];
        let owner = owning_class(masked, opening.start(), caps[1].len());
        let return_type = tail
            .get(1)
            .map(|m| code[close + 1 + m.start()..close + 1 + m.end()].trim().to_string());

        Some(Located {
            signature: Signature {
                name: caps[2].to_string(),
                params: parse_params(raw, owner.is_some()),
                raw_params: raw.split_whitespace().collect::<Vec<_>>().join(" "),
                return_type,
                owner,
                throws: None,
            },
            start: opening.start(),
            header_end: tail_end,
        })
    }

    fn headers(&self, code: &str, masked: &str) -> Vec<Located> {
        DEF_OPEN
            .captures_iter(masked)
            .filter_map(|caps| self.locate(code, masked, &caps))
            .collect()
    }
}

impl LanguageHarness for PythonHarness {
    fn language(&self) -> Language {
        Language::Python
    }

    fn is_complete_program(&self, code: &str) -> bool {
        let masked = mask_literals(code, Language::Python);
        DIRECT_IO.is_match(&masked) && !DEF_KEYWORD.is_match(&masked) && !TOP_RETURN.is_match(&masked)
    }

    fn detect_signature(
        &self,
        code: &str,
        preferred: &str,
    ) -> Result<Option<Located>, SynthesisError> {
        let masked = mask_literals(code, Language::Python);
        let mut found = self.headers(code, &masked);

        if found.is_empty() {
            if DEF_KEYWORD.is_match(&masked) {
                return Err(SynthesisError::NoSignature(
                    "a `def` is present but its header could not be read".to_string(),
                ));
            }
            return Ok(None);
        }

        let chosen = found
            .iter()
            .position(|l| l.signature.name == preferred)
            .or_else(|| found.iter().position(|l| indent_width(&code[l.start..]) == 0))
            .unwrap_or(0);
        Ok(Some(found.swap_remove(chosen)))
    }

    fn extract_body(&self, code: &str, located: &Located) -> Result<BodySpan, SynthesisError> {
        let def_indent = indent_width(&code[located.start..]);
        let body_start = located.header_end;
        let mut body_end = code[body_start..]
            .find('\n')
            .map(|n| body_start + n)
            .unwrap_or(code.len());

        let mut pos = body_end;
        while pos < code.len() {
            let line_start = pos + 1;
            let line_end = code[line_start..]
                .find('\n')
                .map(|n| line_start + n)
                .unwrap_or(code.len());
            let line = &code[line_start..line_end];
            if line.trim().is_empty() || indent_width(line) <= def_indent {
                break;
            }
            body_end = line_end;
            pos = line_end;
        }

        Ok(BodySpan {
            start: located.start,
            body_start,
            body_end,
            end: body_end,
        })
    }

    fn render_entrypoint(&self, signature: &Signature, inputs: &[Value]) -> String {
        let callee = match &signature.owner {
            Some(owner) => format!("{}().{}", owner, signature.name),
            None => signature.name.clone(),
        };
        let args = call_arguments(signature, inputs).join(", ");

        let mut block = String::from("if __name__ == \"__main__\":\n");
        block.push_str(&format!("    _result = {}({})\n", callee, args));
        block.push_str("    if isinstance(_result, (list, tuple, dict)):\n");
        block.push_str("        print(json.dumps(_result, separators=(\",\", \":\")))\n");
        block.push_str("    else:\n");
        block.push_str("        print(_result)\n");
        block
    }

    fn apply_template(
        &self,
        template: &str,
        user_code: &str,
        function_name: &str,
    ) -> Result<String, SynthesisError> {
        if template.contains(&self.placeholder) {
            return Ok(replace_placeholder(template, &self.placeholder, user_code));
        }

        let target = self
            .detect_signature(template, function_name)?
            .filter(|l| l.signature.name == function_name);
        let Some(located) = target else {
            return Ok(format!("{}\n\n{}\n", template.trim_end(), user_code.trim_end()));
        };

        let span = self.extract_body(template, &located)?;
        let def_indent = indent_width(&template[located.start..]);
        let user = dedent(trim_blank_lines(user_code));
        let user_masked = mask_literals(&user, Language::Python);
        let brings_def = !self.headers(&user, &user_masked).is_empty();

        let mut out = String::with_capacity(template.len() + user.len());
        if brings_def {
            out.push_str(&template[..span.start]);
            out.push_str(&indent(&user, def_indent));
        } else {
            out.push_str(&template[..span.body_start]);
            out.push('\n');
            out.push_str(&indent(&user, def_indent + 4));
        }
        out.push_str(&template[span.end..]);
        Ok(out)
    }

    fn synthesize(&self, input: &SynthesisInput) -> Result<String, SynthesisError> {
        let code = trim_blank_lines(input.code);

        let (definitions, signature) = match self.detect_signature(code, input.function_name)? {
            Some(located) => (code.to_string(), located.signature),
            None => {
                let body = dedent(code);
                let inferred = inference::infer_signature(
                    Language::Python,
                    &body,
                    input.inputs,
                    input.function_name,
                );
                if inferred.confidence == Confidence::Guess {
                    debug!(
                        function = %inferred.signature.name,
                        params = %inferred.signature.raw_params,
                        "Parameter names guessed for bare Python body"
                    );
                }
                let def = format!(
                    "def {}({}):\n{}",
                    inferred.signature.name,
                    inferred.signature.raw_params,
                    indent(&body, 4)
                );
                (def, inferred.signature)
            }
        };

        let mut program = String::new();
        if !JSON_IMPORT.is_match(&definitions) {
            program.push_str("import json\n\n");
        }
        program.push_str(&definitions);
        program.push_str("\n\n\n");
        program.push_str(&self.render_entrypoint(&signature, input.inputs));
        Ok(program)
    }
}

/// Python literal text for a parsed value
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format_float(*f),
        Value::Float(f) if f.is_nan() => "float(\"nan\")".to_string(),
        Value::Float(f) if *f > 0.0 => "float(\"inf\")".to_string(),
        Value::Float(_) => "float(\"-inf\")".to_string(),
        Value::Str(s) => quote_json(s),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", quote_json(k), python_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Inputs beyond the positional slots are dropped; missing required ones become `None`
fn call_arguments(signature: &Signature, inputs: &[Value]) -> Vec<String> {
    let take = match signature.max_arity() {
        Some(max) => inputs.len().min(max),
        None => inputs.len(),
    };
    let mut args: Vec<String> = inputs[..take].iter().map(python_literal).collect();
    while args.len() < signature.required_arity() {
        args.push("None".to_string());
    }
    args
}

fn parse_params(raw: &str, is_method: bool) -> Vec<Param> {
    let mut params = Vec::new();
    for (i, piece) in split_top_level(raw).into_iter().enumerate() {
        if piece == "/" || piece.starts_with("**") {
            continue;
        }
        // keyword-only parameters follow a bare `*`
        if piece == "*" {
            break;
        }

        let variadic = piece.starts_with('*');
        let name = piece
            .trim_start_matches('*')
            .split([':', '='])
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() || (is_method && i == 0 && (name == "self" || name == "cls")) {
            continue;
        }

        params.push(Param {
            name,
            type_name: None,
            has_default: piece.contains('='),
            variadic,
        });
        if variadic {
            break;
        }
    }
    params
}

/// Class that directly encloses the `def` at `def_start`, if any
fn owning_class(masked: &str, def_start: usize, def_indent: usize) -> Option<String> {
    if def_indent == 0 {
        return None;
    }
    masked[..def_start]
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .find(|l| indent_width(l) < def_indent)
        .and_then(|l| CLASS_HEADER.captures(l))
        .map(|caps| caps[1].to_string())
}
