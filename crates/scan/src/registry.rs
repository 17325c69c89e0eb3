//! Language pattern registry.
//!
//! A static table of [`LanguageSpec`] descriptors compiled once into a
//! [`LanguageRegistry`]. Adding a language means adding one table entry.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::error::Result;

/// Documentation marker token.
pub const MARKER: &str = "@codebase-summary:";

/// What a detection rule recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Free function
    Function,
    /// Function declared inside a type body
    Method,
    /// Class, struct, trait or similar type declaration
    Class,
    /// Documentation marker comment
    Marker,
}

/// Lines around a function searched for its marker.
///
/// The window is always clipped at the neighbouring detected functions and
/// always contains the function's own line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerWindow {
    /// Lines above the declaration
    pub above: usize,
    /// Lines below the declaration
    pub below: usize,
}

impl MarkerWindow {
    /// Comment block above the item.
    pub const LEADING: Self = Self { above: 10, below: 0 };

    /// Comment above the item or a docstring in the first lines of the body.
    pub const DOCSTRING: Self = Self { above: 10, below: 4 };
}

/// Uncompiled rule as it appears in the language table.
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    /// Rule kind
    pub kind: RuleKind,
    /// Anchored pattern with exactly one capture group
    pub pattern: &'static str,
    /// Captured names rejected by this rule
    pub reserved: &'static [&'static str],
}

impl RuleSpec {
    /// Rule without reserved names.
    pub const fn new(kind: RuleKind, pattern: &'static str) -> Self {
        Self {
            kind,
            pattern,
            reserved: &[],
        }
    }

    /// Rule rejecting the given names.
    pub const fn reserving(kind: RuleKind, pattern: &'static str, reserved: &'static [&'static str]) -> Self {
        Self { kind, pattern, reserved }
    }
}

/// Static language descriptor.
#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
    /// Display name
    pub name: &'static str,
    /// Lowercase extensions without the dot
    pub extensions: &'static [&'static str],
    /// Function, method and class rules
    pub rules: &'static [RuleSpec],
    /// Marker pattern
    pub marker: &'static str,
    /// Marker search window
    pub window: MarkerWindow,
}

/// A compiled detection rule.
#[derive(Debug, Clone)]
pub struct DetectionRule {
    /// Rule kind
    pub kind: RuleKind,
    /// Compiled pattern
    pub regex: Regex,
    /// Captured names rejected by this rule
    pub reserved: &'static [&'static str],
}

impl DetectionRule {
    fn compile(spec: &RuleSpec) -> Result<Self> {
        Ok(Self {
            kind: spec.kind,
            regex: Regex::new(spec.pattern)?,
            reserved: spec.reserved,
        })
    }

    /// Name declared on `line`, if this rule matches and the name is allowed.
    pub fn capture<'t>(&self, line: &'t str) -> Option<&'t str> {
        let name = self.regex.captures(line)?.get(1)?.as_str();
        if name.is_empty() || name.starts_with('_') || self.reserved.contains(&name) {
            return None;
        }
        Some(name)
    }

    /// True when the rule matches anywhere on `line`.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// A compiled language entry.
#[derive(Debug, Clone)]
pub struct Language {
    /// Display name
    pub name: &'static str,
    /// Function, method and class rules
    pub rules: Vec<DetectionRule>,
    /// Marker rule
    pub marker: DetectionRule,
    /// Marker search window
    pub window: MarkerWindow,
}

/// Extension-indexed set of compiled languages.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
    by_extension: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Registry holding every built-in language.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::default();
        for spec in BUILTIN {
            registry.register(spec)?;
        }
        debug!(
            "Language registry ready: {} languages, {} extensions",
            registry.languages.len(),
            registry.by_extension.len()
        );
        Ok(registry)
    }

    /// Compile and add a language. Later entries win on shared extensions.
    pub fn register(&mut self, spec: &LanguageSpec) -> Result<()> {
        let rules = spec.rules.iter().map(DetectionRule::compile).collect::<Result<Vec<_>>>()?;
        let marker = DetectionRule::compile(&RuleSpec::new(RuleKind::Marker, spec.marker))?;

        let idx = self.languages.len();
        self.languages.push(Language {
            name: spec.name,
            rules,
            marker,
            window: spec.window,
        });
        for ext in spec.extensions {
            self.by_extension.insert(ext.to_ascii_lowercase(), idx);
        }
        Ok(())
    }

    /// Language registered for `ext` (case-insensitive, no dot).
    pub fn language_for(&self, ext: &str) -> Option<&Language> {
        let idx = self.by_extension.get(&ext.to_ascii_lowercase())?;
        self.languages.get(*idx)
    }

    /// Detection rules for `ext`; empty when the extension is unknown.
    pub fn rules_for(&self, ext: &str) -> &[DetectionRule] {
        self.language_for(ext).map(|l| l.rules.as_slice()).unwrap_or(&[])
    }

    /// Marker rule for `ext`.
    pub fn marker_rule_for(&self, ext: &str) -> Option<&DetectionRule> {
        self.language_for(ext).map(|l| &l.marker)
    }

    /// True when files with `ext` are scanned.
    pub fn is_registered(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&ext.to_ascii_lowercase())
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

use RuleKind::{Class, Function, Method};

const SLASH_MARKER: &str = r"(//+!?|/\*+|^\s*\*)\s*@codebase-summary:";
const HASH_MARKER: &str = r"(#+)\s*@codebase-summary:";
const DOCSTRING_MARKER: &str = r#"(#+|"""|'''|^\s*)\s*@codebase-summary:"#;
const DASH_MARKER: &str = r"(--+)\s*@codebase-summary:";

const C_RESERVED: &[&str] = &["if", "for", "while", "switch", "return", "sizeof", "else", "do", "case"];
const CPP_RESERVED: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "else", "do", "new", "delete", "throw", "case",
];
const JAVA_RESERVED: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "else", "do", "synchronized", "throw",
];

/// Built-in language table.
pub static BUILTIN: &[LanguageSpec] = &[
    LanguageSpec {
        name: "ECMAScript",
        extensions: &["js", "jsx", "ts", "tsx", "mjs", "cjs"],
        rules: &[
            RuleSpec::new(
                Function,
                r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s+([A-Za-z_$][\w$]*)",
            ),
            // Arrow functions bound with const/let; plain value bindings never match.
            RuleSpec::new(
                Function,
                r"^\s*(?:export\s+)?(?:const|let)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:<[^>]*>\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::\s*[^=]+?)?\s*=>",
            ),
            RuleSpec::new(
                Function,
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?function\b",
            ),
            RuleSpec::reserving(
                Method,
                r"^\s+(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*\*?([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)\s*(?::\s*[^{]+)?\{",
                &["if", "for", "while", "switch", "catch", "function", "return", "else", "do", "with"],
            ),
            RuleSpec::new(
                Class,
                r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Python",
        extensions: &["py"],
        rules: &[
            RuleSpec::new(Function, r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("),
            RuleSpec::new(Class, r"^\s*class\s+([A-Za-z_]\w*)\s*[:(]"),
        ],
        marker: DOCSTRING_MARKER,
        window: MarkerWindow::DOCSTRING,
    },
    LanguageSpec {
        name: "Rust",
        extensions: &["rs"],
        rules: &[
            RuleSpec::new(
                Function,
                r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+([A-Za-z_]\w*)"#,
            ),
            RuleSpec::new(Class, r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+([A-Za-z_]\w*)"),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Go",
        extensions: &["go"],
        rules: &[
            RuleSpec::new(Function, r"^\s*func\s+([A-Za-z_]\w*)\s*[\(\[]"),
            RuleSpec::new(Method, r"^\s*func\s+\([^)]*\)\s+([A-Za-z_]\w*)\s*[\(\[]"),
            RuleSpec::new(Class, r"^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)\b"),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Java",
        extensions: &["java"],
        rules: &[
            RuleSpec::reserving(
                Method,
                r"^\s*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]+>\s+)?[\w<>\[\],.?]+\s+([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?\{",
                JAVA_RESERVED,
            ),
            RuleSpec::new(
                Class,
                r"^\s*(?:(?:public|private|protected|static|final|abstract|sealed)\s+)*(?:class|interface|enum|record)\s+([A-Za-z_]\w*)",
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Kotlin",
        extensions: &["kt", "kts"],
        rules: &[
            RuleSpec::new(
                Function,
                r"^\s*(?:(?:public|private|protected|internal|override|open|suspend|inline|operator|infix|tailrec|abstract)\s+)*fun\s+(?:<[^>]+>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\(",
            ),
            RuleSpec::new(
                Class,
                r"^\s*(?:(?:public|private|protected|internal|open|abstract|sealed|data|enum|inner|annotation)\s+)*(?:class|interface|object)\s+([A-Za-z_]\w*)",
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "C",
        extensions: &["c", "h"],
        rules: &[
            RuleSpec::reserving(Function, r"^\s*(?:[A-Za-z_]\w*[\s\*]+)+([A-Za-z_]\w*)\s*\([^;]*\)\s*\{", C_RESERVED),
            // Prototypes only at column 0, so indented calls are not counted.
            RuleSpec::reserving(Function, r"^(?:[A-Za-z_]\w*[\s\*]+)+([A-Za-z_]\w*)\s*\([^;{]*\)\s*;", C_RESERVED),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "C++",
        extensions: &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
        rules: &[
            RuleSpec::reserving(
                Function,
                r"^\s*(?:template\s*<[^>]*>\s*)?(?:[A-Za-z_][\w:<>,]*[\s\*&]+)+(?:[A-Za-z_]\w*::)?(~?[A-Za-z_]\w*)\s*\([^;]*\)\s*(?:const\s*)?(?:noexcept\s*)?(?:override\s*)?(?:->\s*[\w:<>]+\s*)?\{",
                CPP_RESERVED,
            ),
            RuleSpec::reserving(Function, r"^(?:[A-Za-z_][\w:<>,]*[\s\*&]+)+([A-Za-z_]\w*)\s*\([^;{]*\)\s*;", CPP_RESERVED),
            RuleSpec::reserving(Method, r"^\s*([A-Z]\w*)\s*\([^;]*\)\s*(?::[^{]*)?\{", CPP_RESERVED),
            RuleSpec::new(Class, r"^\s*(?:template\s*<[^>]*>\s*)?(?:class|struct)\s+([A-Za-z_]\w*)\s*(?:final\s*)?(?::[^{;]*)?\{?\s*$"),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "C#",
        extensions: &["cs"],
        rules: &[
            RuleSpec::reserving(
                Method,
                r"^\s*(?:(?:public|private|protected|internal|static|virtual|override|abstract|sealed|async|extern|unsafe|new|partial)\s+)*[\w<>\[\],.?]+\s+([A-Za-z_]\w*)\s*(?:<[^>]+>)?\s*\([^)]*\)\s*(?:where\s+[^{]+)?(?:\{|=>)",
                JAVA_RESERVED,
            ),
            RuleSpec::new(
                Class,
                r"^\s*(?:(?:public|private|protected|internal|static|abstract|sealed|partial)\s+)*(?:class|interface|struct|enum|record)\s+([A-Za-z_]\w*)",
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Swift",
        extensions: &["swift"],
        rules: &[
            RuleSpec::new(
                Function,
                r"^\s*(?:@\w+\s+)*(?:(?:public|private|fileprivate|internal|open|static|class|override|mutating|final)\s+)*func\s+([A-Za-z_]\w*)\s*(?:<[^>]+>)?\s*\(",
            ),
            RuleSpec::reserving(
                Class,
                r"^\s*(?:(?:public|private|fileprivate|internal|open|final)\s+)*(?:class|struct|enum|protocol|extension|actor)\s+([A-Za-z_]\w*)",
                &["func", "var", "let"],
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "PHP",
        extensions: &["php"],
        rules: &[
            RuleSpec::new(
                Function,
                r"^\s*(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+&?([A-Za-z_]\w*)\s*\(",
            ),
            RuleSpec::new(Class, r"^\s*(?:(?:abstract|final)\s+)?(?:class|interface|trait|enum)\s+([A-Za-z_]\w*)"),
        ],
        marker: r"(//+|/\*+|^\s*\*|#)\s*@codebase-summary:",
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Ruby",
        extensions: &["rb"],
        rules: &[
            RuleSpec::new(Function, r"^\s*def\s+(?:self\.)?([A-Za-z_]\w*[?!=]?)"),
            RuleSpec::new(Class, r"^\s*(?:class|module)\s+([A-Z]\w*)"),
        ],
        marker: DOCSTRING_MARKER,
        window: MarkerWindow::DOCSTRING,
    },
    LanguageSpec {
        name: "Dart",
        extensions: &["dart"],
        rules: &[
            RuleSpec::reserving(
                Function,
                r"^\s*(?:(?:static|external|factory)\s+)*(?:[\w<>?,\s]+\s+)?([A-Za-z_]\w*)\s*(?:<[^>]+>)?\s*\([^)]*\)\s*(?:async\*?\s*|sync\*\s*)?(?:\{|=>)",
                &["if", "for", "while", "switch", "catch", "return", "else", "do"],
            ),
            RuleSpec::new(Class, r"^\s*(?:abstract\s+)?(?:class|mixin|enum|extension)\s+([A-Za-z_]\w*)"),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Scala",
        extensions: &["scala", "sc"],
        rules: &[
            RuleSpec::new(
                Function,
                r"^\s*(?:(?:private|protected|override|final|implicit|inline)(?:\[[^\]]*\])?\s+)*def\s+([A-Za-z_]\w*)",
            ),
            RuleSpec::new(
                Class,
                r"^\s*(?:(?:abstract|final|sealed|case|implicit)\s+)*(?:class|trait|object|enum)\s+([A-Za-z_]\w*)",
            ),
        ],
        marker: SLASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Lua",
        extensions: &["lua"],
        rules: &[
            RuleSpec::new(Function, r"^\s*(?:local\s+)?function\s+(?:[\w]+[.:])*([A-Za-z_]\w*)\s*\("),
            RuleSpec::new(Function, r"^\s*(?:local\s+)?([A-Za-z_]\w*)\s*=\s*function\s*\("),
        ],
        marker: DASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Shell",
        extensions: &["sh", "bash", "zsh"],
        rules: &[
            RuleSpec::new(Function, r"^\s*function\s+([A-Za-z_][\w-]*)"),
            RuleSpec::reserving(Function, r"^\s*([A-Za-z_][\w-]*)\s*\(\)\s*\{?", &["function"]),
        ],
        marker: HASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "PowerShell",
        extensions: &["ps1", "psm1"],
        rules: &[RuleSpec::new(Function, r"(?i)^\s*(?:function|filter)\s+([A-Za-z][\w-]*)")],
        marker: r"(#|<#)\s*@codebase-summary:",
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "SQL",
        extensions: &["sql"],
        rules: &[RuleSpec::new(
            Function,
            r#"(?i)^\s*create\s+(?:or\s+replace\s+)?(?:function|procedure|trigger)\s+(?:[\w"]+\.)?"?([A-Za-z_]\w*)"#,
        )],
        marker: DASH_MARKER,
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "Clojure",
        extensions: &["clj", "cljs", "cljc"],
        rules: &[RuleSpec::new(Function, r"^\s*\((?:defn-?|defmacro|defmulti)\s+([A-Za-z][\w\-\?!*]*)")],
        marker: r"(;+)\s*@codebase-summary:",
        window: MarkerWindow::LEADING,
    },
    LanguageSpec {
        name: "R",
        extensions: &["r"],
        rules: &[RuleSpec::new(Function, r"^\s*([A-Za-z][\w.]*)\s*(?:<-|=)\s*function\s*\(")],
        marker: HASH_MARKER,
        window: MarkerWindow::LEADING,
    },
];
