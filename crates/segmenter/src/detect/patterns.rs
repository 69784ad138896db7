//! Line classifiers shared by detectors and regex-driven strategies.

use crate::language::Language;
use regex::Regex;
use std::sync::OnceLock;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

cached_regex!(
    function_def_re,
    r"^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|static|const|extern)\s+)*(?:function\b\*?\s*(?P<js>[A-Za-z_$][\w$]*)|fn\s+(?P<rs>[A-Za-z_]\w*)|def\s+(?P<py>[A-Za-z_]\w*)|func\s+(?:\([^)]*\)\s*)?(?P<go>[A-Za-z_]\w*)|(?:let|var)\s+(?P<arrow>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>))"
);

cached_regex!(
    const_arrow_re,
    r"^\s*(?:export\s+)?const\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)"
);

cached_regex!(
    class_def_re,
    r"^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:(?:abstract|data|sealed|final)\s+)*(?:class|struct|interface|trait|enum)\s+(?P<name>[A-Za-z_$][\w$]*)"
);

cached_regex!(
    impl_re,
    r"^\s*(?:unsafe\s+)?impl(?:<[^>]*>)?\s+(?:[\w:<>, ]+\s+for\s+)?(?P<name>[A-Za-z_][\w:]*)"
);

cached_regex!(
    import_re,
    r#"^\s*(?:import\s|from\s+\S+\s+import\s|use\s+[\w:{*]|pub\s+use\s|#include\s|extern\s+crate\s|using\s+[\w.]+\s*;|require(?:_relative)?[\s(]|(?:const|let|var)\s+[\w{}, ]+\s*=\s*require\()"#
);

cached_regex!(export_re, r"^\s*export\s");

cached_regex!(
    control_re,
    r"\b(?:if|else|for|while|switch|case|catch|try|match|loop|elif|except|finally|do)\b"
);

cached_regex!(
    def_keyword_re,
    r"\b(?:function|def|fn|func|class|struct|interface|trait|impl|enum)\b"
);

/// Name of the function defined on this line, if any
#[must_use]
pub fn function_definition(line: &str) -> Option<String> {
    if let Some(caps) = function_def_re().captures(line) {
        return ["js", "rs", "py", "go", "arrow"]
            .iter()
            .find_map(|group| caps.name(group))
            .map(|m| m.as_str().to_string())
            .or_else(|| Some(String::new()));
    }
    const_arrow_re()
        .captures(line)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str().to_string())
}

#[must_use]
pub fn is_function_definition(line: &str) -> bool {
    function_def_re().is_match(line) || const_arrow_re().is_match(line)
}

/// Name of the class-like type defined on this line, if any
#[must_use]
pub fn class_definition(line: &str) -> Option<String> {
    class_def_re()
        .captures(line)
        .or_else(|| impl_re().captures(line))
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str().to_string())
}

#[must_use]
pub fn is_class_definition(line: &str) -> bool {
    class_def_re().is_match(line) || impl_re().is_match(line)
}

#[must_use]
pub fn is_import(line: &str) -> bool {
    import_re().is_match(line)
}

#[must_use]
pub fn is_export(line: &str) -> bool {
    export_re().is_match(line)
}

#[must_use]
pub fn has_control_keyword(line: &str) -> bool {
    control_re().is_match(line)
}

#[must_use]
pub fn control_keyword_count(text: &str) -> usize {
    control_re().find_iter(text).count()
}

#[must_use]
pub fn def_keyword_count(text: &str) -> usize {
    def_keyword_re().find_iter(text).count()
}

#[must_use]
pub fn is_comment(line: &str, language: Language) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    language
        .comment_prefixes()
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
        && !(trimmed.starts_with("#include") || trimmed.starts_with("#["))
}

#[must_use]
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Leading whitespace width (tabs count as 4)
#[must_use]
pub fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}
