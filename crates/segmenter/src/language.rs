use crate::error::{Result, SegmenterError};
use std::path::Path;

/// Language of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Swift,
    Kotlin,
    Markdown,
    Json,
    Yaml,
    Toml,
    Xml,
    Html,
    Unknown,
}

impl Language {
    /// Detect language from a caller-supplied name (`"javascript"`, `"ts"`, ...)
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "rust" => Self::Rust,
            "python" => Self::Python,
            "javascript" | "jsx" => Self::JavaScript,
            "typescript" | "tsx" => Self::TypeScript,
            "golang" => Self::Go,
            "c++" => Self::Cpp,
            "c#" => Self::CSharp,
            "markdown" => Self::Markdown,
            "html" => Self::Html,
            other => Self::from_extension(other),
        }
    }

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" | "csharp" => Self::CSharp,
            "rb" | "ruby" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" | "kts" | "kotlin" => Self::Kotlin,
            "md" | "markdown" | "mdx" => Self::Markdown,
            "json" | "jsonc" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "toml" => Self::Toml,
            "xml" | "svg" | "xsd" => Self::Xml,
            "html" | "htm" => Self::Html,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Resolve from the caller's language name, falling back to the path
    pub fn resolve(name: &str, file_path: Option<&str>) -> Self {
        match Self::from_name(name) {
            Self::Unknown => file_path.map_or(Self::Unknown, Self::from_path),
            lang => lang,
        }
    }

    /// Get language name as string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Unknown => "unknown",
        }
    }

    /// Programming language (as opposed to documents and data formats)
    pub const fn is_code(self) -> bool {
        !matches!(
            self,
            Self::Markdown
                | Self::Json
                | Self::Yaml
                | Self::Toml
                | Self::Xml
                | Self::Html
                | Self::Unknown
        )
    }

    /// Indentation delimits blocks instead of braces
    pub const fn uses_indentation_blocks(self) -> bool {
        matches!(self, Self::Python)
    }

    /// Check if this language is supported for AST parsing
    pub const fn supports_ast(self) -> bool {
        matches!(
            self,
            Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(SegmenterError::unsupported_language(self.as_str())),
        }
    }

    /// Get typical comment prefixes for this language
    pub fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Rust
            | Self::JavaScript
            | Self::TypeScript
            | Self::Go
            | Self::Java
            | Self::C
            | Self::Cpp
            | Self::CSharp
            | Self::Swift
            | Self::Kotlin => &["//", "/*", "*"],
            Self::Python | Self::Ruby | Self::Yaml | Self::Toml => &["#", "\"\"\"", "'''"],
            Self::Xml | Self::Html | Self::Markdown => &["<!--"],
            Self::Json | Self::Unknown => &["//", "#", "/*"],
        }
    }

    /// Get import/use statement prefixes for this language
    pub fn import_patterns(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["use ", "extern crate ", "mod "],
            Self::Python => &["import ", "from "],
            Self::JavaScript | Self::TypeScript => &["import ", "require(", "export * from"],
            Self::Go | Self::Java | Self::Swift | Self::Kotlin => &["import "],
            Self::CSharp => &["using "],
            Self::Ruby => &["require ", "require_relative ", "include "],
            Self::C | Self::Cpp => &["#include "],
            _ => &[],
        }
    }
}

/// Coarse classification used for direct strategy overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Code,
    Test,
    Markdown,
    /// XML / HTML
    Markup,
    /// JSON / YAML / TOML and friends
    StructuredConfig,
    Text,
}

impl FileKind {
    pub fn classify(language: Language, file_path: Option<&str>) -> Self {
        match language {
            Language::Markdown => return Self::Markdown,
            Language::Xml | Language::Html => return Self::Markup,
            Language::Json | Language::Yaml | Language::Toml => return Self::StructuredConfig,
            _ => {}
        }

        if let Some(path) = file_path {
            match Language::from_path(path) {
                Language::Markdown => return Self::Markdown,
                Language::Xml | Language::Html => return Self::Markup,
                Language::Json | Language::Yaml | Language::Toml => {
                    return Self::StructuredConfig;
                }
                _ => {}
            }
            if is_test_path(path) {
                return Self::Test;
            }
        }

        if language.is_code() {
            Self::Code
        } else {
            Self::Text
        }
    }

    pub const fn is_code(self) -> bool {
        matches!(self, Self::Code | Self::Test)
    }
}

fn is_test_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/").to_lowercase();
    if normalized
        .split('/')
        .any(|segment| matches!(segment, "tests" | "test" | "__tests__" | "spec"))
    {
        return true;
    }
    let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    file_name.contains(".test.")
        || file_name.contains(".spec.")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || stem.starts_with("test_")
}
