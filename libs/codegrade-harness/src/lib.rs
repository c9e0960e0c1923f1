pub mod error;
pub mod input;
pub mod synth;

pub use error::SynthesisError;
pub use input::{parse, ParsedInput, Value};
pub use synth::inference::{Confidence, InferredSignature};
pub use synth::{LanguageHarness, Signature, Strategy};

use codegrade_common::types::Language;
use serde::{Deserialize, Serialize};
use synth::SynthesisInput;
use tracing::debug;

/// Implicit defaults the synthesizer falls back on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessDefaults {
    /// Called when a task names no function and the code has no header
    pub function_name: String,
    /// Public class the Java compiler expects for `Main.java`
    pub java_class_name: String,
    /// Token in `template_code` replaced by the student's code
    pub template_placeholder: String,
}

impl Default for HarnessDefaults {
    fn default() -> Self {
        Self {
            function_name: "solve".to_string(),
            java_class_name: "Main".to_string(),
            template_placeholder: "{{USER_CODE}}".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessRequest<'a> {
    pub language: Language,
    pub user_code: &'a str,
    pub function_name: Option<&'a str>,
    pub template_code: Option<&'a str>,
    pub inputs: &'a [Value],
}

/// Program ready to hand to the execution engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedProgram {
    pub language: Language,
    pub source: String,
    /// `false` when the code was passed through verbatim
    pub wrapped: bool,
}

/// Build a runnable program for one test case.
///
/// Complete programs (before or after templating) are passed through
/// unchanged; everything else goes through the language strategy.
pub fn synthesize(
    request: &HarnessRequest,
    defaults: &HarnessDefaults,
) -> Result<WrappedProgram, SynthesisError> {
    if request.user_code.trim().is_empty() {
        return Err(SynthesisError::EmptySource);
    }

    let strategy = Strategy::for_language(request.language, defaults);
    let harness = strategy.harness();
    let function_name = request
        .function_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(defaults.function_name.as_str());

    let verbatim = |source: &str| WrappedProgram {
        language: request.language,
        source: source.to_string(),
        wrapped: false,
    };

    if harness.is_complete_program(request.user_code) {
        debug!(language = %request.language, "Complete program submitted, skipping harness");
        return Ok(verbatim(request.user_code));
    }

    let code = match request.template_code.filter(|t| !t.trim().is_empty()) {
        Some(template) => {
            let merged = harness.apply_template(template, request.user_code, function_name)?;
            if harness.is_complete_program(&merged) {
                debug!(language = %request.language, "Template produced a complete program");
                return Ok(verbatim(&merged));
            }
            merged
        }
        None => request.user_code.to_string(),
    };

    let source = harness.synthesize(&SynthesisInput {
        code: &code,
        function_name,
        inputs: request.inputs,
    })?;

    Ok(WrappedProgram {
        language: request.language,
        source,
        wrapped: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(language: Language, code: &'a str, inputs: &'a [Value]) -> HarnessRequest<'a> {
        HarnessRequest {
            language,
            user_code: code,
            function_name: Some("solve"),
            template_code: None,
            inputs,
        }
    }

    #[test]
    fn test_python_end_to_end_program() {
        let inputs = parse("2 3");
        let program =
            synthesize(&request(Language::Python, "return a + b", &inputs), &HarnessDefaults::default())
                .unwrap();
        assert!(program.wrapped);
        assert_eq!(
            program.source,
            "import json\n\ndef solve(a, b):\n    return a + b\n\n\nif __name__ == \"__main__\":\n    _result = solve(2, 3)\n    if isinstance(_result, (list, tuple, dict)):\n        print(json.dumps(_result, separators=(\",\", \":\")))\n    else:\n        print(_result)\n"
        );
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let err = synthesize(&request(Language::Java, "  \n ", &[]), &HarnessDefaults::default())
            .unwrap_err();
        assert_eq!(err, SynthesisError::EmptySource);
    }

    #[test]
    fn test_complete_programs_pass_through() {
        let code = "import sys\nn = int(sys.stdin.read())\nprint(n + 1)\n";
        let program =
            synthesize(&request(Language::Python, code, &[]), &HarnessDefaults::default()).unwrap();
        assert!(!program.wrapped);
        assert_eq!(program.source, code);
    }

    #[test]
    fn test_template_that_completes_a_program_passes_through() {
        let template = "public class Main {\n    static int solve(int n) {\n        {{USER_CODE}}\n    }\n\n    public static void main(String[] args) {\n        System.out.println(solve(4));\n    }\n}\n";
        let req = HarnessRequest {
            template_code: Some(template),
            ..request(Language::Java, "return n * 2;", &[])
        };
        let program = synthesize(&req, &HarnessDefaults::default()).unwrap();
        assert!(!program.wrapped);
        assert!(program.source.contains("        return n * 2;\n"));
    }

    #[test]
    fn test_missing_function_name_uses_default() {
        let req = HarnessRequest {
            function_name: Some("  "),
            ..request(Language::Python, "return 1", &[])
        };
        let program = synthesize(&req, &HarnessDefaults::default()).unwrap();
        assert!(program.source.contains("def solve():"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let inputs = parse("[[1, 2], \"x\", 2.5]");
        let defaults = HarnessDefaults::default();
        for (language, code) in [
            (Language::Python, "return len(xs) + len(s)"),
            (Language::Java, "return xs.length + s.length();"),
        ] {
            let first = synthesize(&request(language, code, &inputs), &defaults).unwrap();
            let second = synthesize(&request(language, code, &inputs), &defaults).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_defaults_deserialize_partially() {
        let defaults: HarnessDefaults = serde_json::from_str(r#"{"function_name": "main_fn"}"#).unwrap();
        assert_eq!(defaults.function_name, "main_fn");
        assert_eq!(defaults.java_class_name, "Main");
    }
}
