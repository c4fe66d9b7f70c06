use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources. Nothing else is scanned.
const SOURCE_ROOTS: [&str; 5] = ["density", "simulate", "src", "tests", "benches"];

const FORBIDDEN_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

// One source policy: a line regex plus a filter that decides whether a
// matching line is a real violation.
struct Rule {
    description: &'static str,
    pattern: String,
    advice: &'static str,
    is_violation: fn(&str) -> bool,
}

// Collects the violating lines of one rule in one file.
struct RuleCollector<'a> {
    rule: &'a Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl<'a> RuleCollector<'a> {
    fn new(rule: &'a Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.description,
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.advice));
        Some(error_msg)
    }
}

impl Sink for RuleCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.rule.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_doc_comment(line: &str) -> bool {
    line.trim_start().starts_with("///")
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//") || line.contains("/*")
}

// The text of a comment line without its marker, if the line is a comment.
fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        Some(rest.trim())
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        Some(rest.trim())
    } else if let Some(idx) = line.find("/*") {
        let rest = &line[idx + 2..];
        Some(match rest.find("*/") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        })
    } else {
        None
    }
}

// Underscore-prefixed names count only in code, not in comments or string literals.
fn underscore_in_code(line: &str) -> bool {
    if is_comment(line) {
        return false;
    }
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !in_string
}

fn forbidden_word_in_comment(line: &str) -> bool {
    comment_text(line).is_some_and(|text| {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|word| FORBIDDEN_WORDS.contains(&word))
    })
}

fn stars_outside_doc_comment(line: &str) -> bool {
    !is_doc_comment(line)
}

fn all_caps_comment(line: &str) -> bool {
    comment_text(line).is_some_and(|text| {
        let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
        letters.peek().is_some() && letters.all(char::is_uppercase)
    })
}

fn any_line(line: &str) -> bool {
    !line.is_empty()
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            description: "underscore-prefixed names",
            pattern: r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            advice: "Underscore-prefixed names are not allowed. Use the binding or remove it.",
            is_violation: underscore_in_code,
        },
        Rule {
            description: "change-log style comments",
            pattern: format!(r"(//|/\*).*(?:{})", FORBIDDEN_WORDS.join("|")),
            advice: "Comments must describe the code, not its history. Remove the comment.",
            is_violation: forbidden_word_in_comment,
        },
        Rule {
            description: "'**' in regular comments",
            pattern: r"(//|/\*).*\*\*".to_string(),
            advice: "'**' is only allowed in doc comments.",
            is_violation: stars_outside_doc_comment,
        },
        Rule {
            description: "all-uppercase comments",
            pattern: r"(//|/\*).*".to_string(),
            advice: "Comments whose letters are all uppercase are not allowed.",
            is_violation: all_caps_comment,
        },
        Rule {
            description: "#[allow(dead_code)] attributes",
            pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
            advice: "#[allow(dead_code)] is not allowed. Use the code or remove it.",
            is_violation: any_line,
        },
    ]
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .filter(|root| Path::new(root).is_dir())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn scan_sources() -> Result<(), Box<dyn Error>> {
    let rules = rules();
    let matchers = rules
        .iter()
        .map(|rule| RegexMatcher::new_line_matcher(&rule.pattern))
        .collect::<Result<Vec<_>, _>>()?;
    let mut searcher = Searcher::new();

    for path in source_files() {
        for (rule, matcher) in rules.iter().zip(&matchers) {
            let mut collector = RuleCollector::new(rule, &path);
            searcher.search_path(matcher, &path, &mut collector)?;
            if let Some(error_message) = collector.check_and_get_error_message() {
                return Err(error_message.into());
            }
        }
    }
    Ok(())
}

// Compiles build.rs on its own with the lints the crate denies.
fn check_build_script_lints() {
    let output = std::process::Command::new("rustc")
        .args([
            "--edition",
            "2024",
            "-D",
            "unused_variables",
            "-D",
            "dead_code",
            "-D",
            "unused_imports",
            "--crate-type",
            "bin",
            "--error-format",
            "human",
            "--out-dir",
        ])
        .arg(std::env::var_os("OUT_DIR").unwrap_or_else(|| ".".into()))
        .arg("build.rs")
        .output();

    match output {
        Ok(output) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lint = ["unused variable", "is never used", "unused import"]
                .into_iter()
                .find(|needle| stderr.contains(needle));
            if let Some(lint) = lint {
                eprintln!("\n❌ ERROR: build.rs fails the '{lint}' lint:\n{stderr}");
                std::process::exit(1);
            }
        }
        Ok(_) => {}
        Err(_) => {
            println!("cargo:warning=Could not lint build.rs with rustc");
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    check_build_script_lints();

    if let Err(e) = scan_sources() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
