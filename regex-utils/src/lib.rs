//! Regex utilities for autocommit
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Markdown code fences around collaborator output
pub mod fences {
    use super::*;

    pub static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)\r?\n?```")
            .expect("Invalid regex pattern")
    });

    /// Return the body of the first fenced block, or the trimmed text when unfenced
    pub fn strip(text: &str) -> String {
        match FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
            Some(body) => body.as_str().trim().to_string(),
            None => text.trim().to_string(),
        }
    }

    /// Extract the outermost JSON object from a possibly chatty response
    pub fn extract_json_object(text: &str) -> Option<String> {
        let body = strip(text);
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end < start {
            return None;
        }
        Some(body[start..=end].to_string())
    }
}

/// `git status --porcelain` (v1) parsing
pub mod porcelain {
    use super::*;

    pub static STATUS_LINE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?P<xy>[ MTADRCU?!]{2}) (?P<path>.+)$").expect("Invalid regex pattern")
    });

    /// A single porcelain entry
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StatusEntry {
        pub code: String,
        pub path: String,
    }

    impl StatusEntry {
        pub fn is_untracked(&self) -> bool {
            self.code == "??"
        }

        pub fn is_deleted(&self) -> bool {
            self.code.contains('D')
        }

        pub fn is_added(&self) -> bool {
            self.is_untracked() || self.code.starts_with('A')
        }
    }

    /// Parse one line; renames report their destination path
    pub fn parse_line(line: &str) -> Option<StatusEntry> {
        let caps = STATUS_LINE.captures(line.trim_end_matches(['\r', '\n']))?;
        let code = caps.name("xy")?.as_str().to_string();
        let raw_path = caps.name("path")?.as_str();
        let path = match raw_path.split_once(" -> ") {
            Some((_, to)) => to,
            None => raw_path,
        };
        Some(StatusEntry {
            code,
            path: path.trim_matches('"').to_string(),
        })
    }

    pub fn parse(status: &str) -> Vec<StatusEntry> {
        status.lines().filter_map(parse_line).collect()
    }
}

/// Unified diff summaries
pub mod diffstat {
    use super::*;
    use std::fmt;

    pub static FILE_HEADER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^diff --git a/(?P<a>.+?) b/(?P<b>.+)$").expect("Invalid regex pattern")
    });

    pub static CONFLICT_MARKER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\+(<{7}|={7}|>{7})( |$)").expect("Invalid regex pattern")
    });

    pub static UNFINISHED_MARKER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\+.*\b(TODO|FIXME|XXX)\b").expect("Invalid regex pattern")
    });

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct DiffStat {
        pub files: Vec<String>,
        pub insertions: usize,
        pub deletions: usize,
        pub conflict_markers: usize,
        pub unfinished_markers: usize,
    }

    impl DiffStat {
        pub fn lines_changed(&self) -> usize {
            self.insertions + self.deletions
        }

        pub fn is_empty(&self) -> bool {
            self.files.is_empty() && self.lines_changed() == 0
        }
    }

    impl fmt::Display for DiffStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let files = self.files.len();
            write!(
                f,
                "{} file{} changed, {} insertion{}(+), {} deletion{}(-)",
                files,
                if files == 1 { "" } else { "s" },
                self.insertions,
                if self.insertions == 1 { "" } else { "s" },
                self.deletions,
                if self.deletions == 1 { "" } else { "s" },
            )
        }
    }

    /// Summarize unified diff text
    pub fn summarize(diff: &str) -> DiffStat {
        let mut stat = DiffStat::default();

        for line in diff.lines() {
            if let Some(caps) = FILE_HEADER.captures(line) {
                if let Some(path) = caps.name("b") {
                    let path = path.as_str().to_string();
                    if !stat.files.contains(&path) {
                        stat.files.push(path);
                    }
                }
            } else if line.starts_with("+++") || line.starts_with("---") {
                continue;
            } else if line.starts_with('+') {
                stat.insertions += 1;
                if CONFLICT_MARKER.is_match(line) {
                    stat.conflict_markers += 1;
                } else if UNFINISHED_MARKER.is_match(line) {
                    stat.unfinished_markers += 1;
                }
            } else if line.starts_with('-') {
                stat.deletions += 1;
            }
        }

        stat
    }
}

/// Commit message cleanup
pub mod message {
    use super::*;

    pub static CONVENTIONAL_HEADER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"^(feat|fix|refactor|perf|docs|style|test|build|ci|chore|revert)(\([^)]+\))?!?: \S",
        )
        .expect("Invalid regex pattern")
    });

    pub static LABEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^(suggested\s+)?commit\s+message\s*:\s*").expect("Invalid regex pattern")
    });

    /// Clean a generated message; `None` when nothing usable remains
    pub fn sanitize(raw: &str) -> Option<String> {
        let body = fences::strip(raw);
        let body = LABEL_PREFIX.replace(&body, "");
        let body = body
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim();

        if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        }
    }

    pub fn is_conventional(message: &str) -> bool {
        message
            .lines()
            .next()
            .is_some_and(|header| CONVENTIONAL_HEADER.is_match(header))
    }
}
