//! Unified-diff parsing.
//!
//! Two tiers: a lenient scan that only recovers the list of touched files
//! (enough for file-level retrieval scoring), and a strict hunk parse that
//! recovers per-line old/new numbering (required for entity-level scoring).
//! A patch whose hunks cannot be parsed still yields the file list; the
//! failure is recorded and entity-level analysis is disabled for it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::warn;

use crate::error::{PatchScopeError, Result};

/// Mapping from file path to a set of 1-indexed line numbers
pub type LineMap = BTreeMap<String, BTreeSet<u32>>;

/// Tag of one line inside a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One line of a hunk with its old-file and/or new-file line number
#[derive(Debug, Clone)]
pub struct HunkLine {
    pub kind: LineKind,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub content: String,
}

/// One contiguous block of changes
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<HunkLine>,
}

/// All hunks for one file pair
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

/// A parsed unified diff.
#[derive(Debug, Clone)]
pub struct Patch {
    text: String,
    files: Vec<String>,
    parsed: Option<Vec<FileDiff>>,
}

impl Patch {
    /// Parse diff text. Never fails: the file list is recovered leniently,
    /// and a failed hunk parse only disables line-level analysis.
    pub fn new(text: &str) -> Self {
        let files = scan_files(text);
        let parsed = match parse_file_diffs(text) {
            Ok(diffs) => Some(diffs),
            Err(e) => {
                warn!("could not parse patch hunks, entity retrieval disabled: {e}");
                None
            }
        };
        Self {
            text: text.to_string(),
            files,
            parsed,
        }
    }

    /// The raw diff text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the strict hunk parse succeeded
    pub fn is_fully_parsed(&self) -> bool {
        self.parsed.is_some()
    }

    /// The per-file diffs, if the strict parse succeeded
    pub fn file_diffs(&self) -> Option<&[FileDiff]> {
        self.parsed.as_deref()
    }

    /// Set of files touched by the patch, optionally reduced to basenames
    pub fn modified_files(&self, to_basename: bool) -> BTreeSet<String> {
        self.files
            .iter()
            .map(|f| {
                if to_basename {
                    Path::new(f)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(f)
                        .to_string()
                } else {
                    f.clone()
                }
            })
            .collect()
    }

    /// Modified line numbers split by side.
    ///
    /// Returns `(old_map, new_map, union_map)`: removed lines keyed by their
    /// old-file numbers, added lines by their new-file numbers, and the union
    /// of both. Context lines are ignored. File pairs whose old and new paths
    /// differ (renames) are excluded from line-level analysis.
    pub fn modified_lines_by_status(&self) -> Result<(LineMap, LineMap, LineMap)> {
        let diffs = self
            .parsed
            .as_ref()
            .ok_or_else(|| PatchScopeError::DiffParse {
                message: "patch hunks were not parseable".to_string(),
            })?;

        let mut old_map = LineMap::new();
        let mut new_map = LineMap::new();
        let mut union_map = LineMap::new();

        for diff in diffs {
            if diff.old_path != diff.new_path {
                continue;
            }
            for hunk in &diff.hunks {
                for line in &hunk.lines {
                    match line.kind {
                        LineKind::Removed => {
                            if let Some(n) = line.old_line {
                                old_map.entry(diff.old_path.clone()).or_default().insert(n);
                                union_map
                                    .entry(diff.old_path.clone())
                                    .or_default()
                                    .insert(n);
                            }
                        }
                        LineKind::Added => {
                            if let Some(n) = line.new_line {
                                new_map.entry(diff.new_path.clone()).or_default().insert(n);
                                union_map
                                    .entry(diff.new_path.clone())
                                    .or_default()
                                    .insert(n);
                            }
                        }
                        LineKind::Context => {}
                    }
                }
            }
        }

        Ok((old_map, new_map, union_map))
    }
}

/// Strip the conventional side prefix (`a/` or `b/`) and trailing tab metadata
fn normalize_path(raw: &str, prefix: &str) -> String {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    raw.strip_prefix(prefix).unwrap_or(raw).to_string()
}

/// Lenient pass: collect touched file paths from section headers only
fn scan_files(text: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut pending_from_header: Option<String> = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            // Flush a section that never produced ---/+++ lines
            if let Some(path) = pending_from_header.take() {
                files.push(path);
            }
            pending_from_header = rest
                .split_whitespace()
                .next()
                .map(|p| normalize_path(p, "a/"))
                .filter(|p| p != "/dev/null");
        } else if let Some(rest) = line.strip_prefix("--- ") {
            let path = normalize_path(rest, "a/");
            if path != "/dev/null" {
                pending_from_header = None;
                files.push(path);
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let path = normalize_path(rest, "b/");
            // Added files have /dev/null on the old side; take the new path
            if path != "/dev/null" && pending_from_header.is_some() {
                pending_from_header = None;
                files.push(path);
            }
        }
    }
    if let Some(path) = pending_from_header {
        files.push(path);
    }

    files
}

struct FileDiffBuilder {
    old_path: Option<String>,
    new_path: Option<String>,
    hunks: Vec<Hunk>,
}

impl FileDiffBuilder {
    fn finish(self) -> Result<Option<FileDiff>> {
        match (self.old_path, self.new_path) {
            (Some(old_path), Some(new_path)) => Ok(Some(FileDiff {
                old_path,
                new_path,
                hunks: self.hunks,
            })),
            // Sections without ---/+++ (mode changes, binary files) carry no hunks
            _ if self.hunks.is_empty() => Ok(None),
            _ => Err(PatchScopeError::DiffParse {
                message: "hunks appeared before file paths".to_string(),
            }),
        }
    }
}

/// Strict pass: parse every file section into hunks with line numbering
fn parse_file_diffs(text: &str) -> Result<Vec<FileDiff>> {
    let mut diffs: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiffBuilder> = None;
    let mut hunk: Option<Hunk> = None;
    let mut remaining_old: u32 = 0;
    let mut remaining_new: u32 = 0;
    let mut old_line: u32 = 0;
    let mut new_line: u32 = 0;

    let close_hunk = |current: &mut Option<FileDiffBuilder>, hunk: &mut Option<Hunk>| {
        if let (Some(builder), Some(done)) = (current.as_mut(), hunk.take()) {
            builder.hunks.push(done);
        }
    };

    for line in text.lines() {
        let hunk_open = remaining_old > 0 || remaining_new > 0;

        if hunk_open {
            let (kind, content) = match line.chars().next() {
                Some('+') => (LineKind::Added, &line[1..]),
                Some('-') => (LineKind::Removed, &line[1..]),
                Some(' ') => (LineKind::Context, &line[1..]),
                Some('\\') => continue, // "\ No newline at end of file"
                None => (LineKind::Context, ""),
                Some(_) => {
                    return Err(PatchScopeError::DiffParse {
                        message: format!("unexpected line inside hunk: {line}"),
                    });
                }
            };
            let (old_no, new_no) = match kind {
                LineKind::Added => {
                    remaining_new = remaining_new.saturating_sub(1);
                    let n = new_line;
                    new_line += 1;
                    (None, Some(n))
                }
                LineKind::Removed => {
                    remaining_old = remaining_old.saturating_sub(1);
                    let o = old_line;
                    old_line += 1;
                    (Some(o), None)
                }
                LineKind::Context => {
                    remaining_old = remaining_old.saturating_sub(1);
                    remaining_new = remaining_new.saturating_sub(1);
                    let (o, n) = (old_line, new_line);
                    old_line += 1;
                    new_line += 1;
                    (Some(o), Some(n))
                }
            };
            if let Some(h) = hunk.as_mut() {
                h.lines.push(HunkLine {
                    kind,
                    old_line: old_no,
                    new_line: new_no,
                    content: content.to_string(),
                });
            }
            continue;
        }

        if line.starts_with("diff --git ") {
            close_hunk(&mut current, &mut hunk);
            if let Some(builder) = current.take() {
                if let Some(diff) = builder.finish()? {
                    diffs.push(diff);
                }
            }
            current = Some(FileDiffBuilder {
                old_path: None,
                new_path: None,
                hunks: Vec::new(),
            });
        } else if let Some(rest) = line.strip_prefix("--- ") {
            close_hunk(&mut current, &mut hunk);
            if let Some(builder) = current.as_mut() {
                builder.old_path = Some(normalize_path(rest, "a/"));
            } else {
                // Bare unified diff without a "diff --git" header
                current = Some(FileDiffBuilder {
                    old_path: Some(normalize_path(rest, "a/")),
                    new_path: None,
                    hunks: Vec::new(),
                });
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(builder) = current.as_mut() {
                builder.new_path = Some(normalize_path(rest, "b/"));
            }
        } else if line.starts_with("@@") {
            close_hunk(&mut current, &mut hunk);
            if current.is_none() {
                return Err(PatchScopeError::DiffParse {
                    message: "hunk header before any file header".to_string(),
                });
            }
            let (os, oc, ns, nc) = parse_hunk_header(line).ok_or_else(|| {
                PatchScopeError::DiffParse {
                    message: format!("malformed hunk header: {line}"),
                }
            })?;
            remaining_old = oc;
            remaining_new = nc;
            old_line = os;
            new_line = ns;
            hunk = Some(Hunk {
                old_start: os,
                old_count: oc,
                new_start: ns,
                new_count: nc,
                lines: Vec::new(),
            });
        }
        // Other metadata (index, mode, similarity...) is ignored
    }

    close_hunk(&mut current, &mut hunk);
    if let Some(builder) = current.take() {
        if let Some(diff) = builder.finish()? {
            diffs.push(diff);
        }
    }

    Ok(diffs)
}

/// Parse `@@ -old_start,old_count +new_start,new_count @@ optional context`
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let line = line.trim_start_matches("@@ ");
    let mut parts = line.split(' ');
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    if let Some((start, count)) = range.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        // Single line: "5" means line 5, count 1
        Some((range.parse().ok()?, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
diff --git a/src/main.py b/src/main.py
index 1234567..8901234 100644
--- a/src/main.py
+++ b/src/main.py
@@ -10,3 +10,3 @@ def main():
     print(\"Hello, World!\")
-    print(\"This is a test program.\")
+    print(\"This is an updated test program.\")
-    result = calculate_sum(5, 10)
+    result = calculate_sum(10, 20)
diff --git a/README.md b/README.md
index abcdef0..1234567 100644
--- a/README.md
+++ b/README.md
@@ -1,2 +1,2 @@
 # My Project
-This is a simple test project.
+This is a simple test project with some updates.
";

    #[test]
    fn test_parse_hunk_header() {
        assert_eq!(parse_hunk_header("@@ -1,5 +1,7 @@"), Some((1, 5, 1, 7)));
        assert_eq!(
            parse_hunk_header("@@ -10,3 +12,5 @@ def main():"),
            Some((10, 3, 12, 5))
        );
        assert_eq!(parse_hunk_header("@@ -5 +5 @@"), Some((5, 1, 5, 1)));
        assert_eq!(parse_hunk_header("@@ -1,0 +1,5 @@"), Some((1, 0, 1, 5)));
        assert_eq!(parse_hunk_header("@@ garbage @@"), None);
    }

    #[test]
    fn test_modified_files() {
        let patch = Patch::new(SAMPLE);
        let files = patch.modified_files(false);
        assert_eq!(
            files,
            BTreeSet::from(["src/main.py".to_string(), "README.md".to_string()])
        );
    }

    #[test]
    fn test_modified_files_basename() {
        let patch = Patch::new(SAMPLE);
        let files = patch.modified_files(true);
        assert_eq!(
            files,
            BTreeSet::from(["main.py".to_string(), "README.md".to_string()])
        );
    }

    #[test]
    fn test_modified_lines_by_status() {
        let patch = Patch::new(SAMPLE);
        let (old_map, new_map, union_map) = patch.modified_lines_by_status().unwrap();

        assert_eq!(old_map["src/main.py"], BTreeSet::from([11, 12]));
        assert_eq!(new_map["src/main.py"], BTreeSet::from([11, 12]));
        assert_eq!(old_map["README.md"], BTreeSet::from([2]));
        assert_eq!(new_map["README.md"], BTreeSet::from([2]));
        assert_eq!(union_map["src/main.py"], BTreeSet::from([11, 12]));
    }

    #[test]
    fn test_line_numbering_tracks_hunk_offsets() {
        let diff = "\
diff --git a/foo.py b/foo.py
--- a/foo.py
+++ b/foo.py
@@ -5,3 +5,4 @@
 context
+added
 context2
 context3
";
        let patch = Patch::new(diff);
        let (old_map, new_map, _) = patch.modified_lines_by_status().unwrap();
        assert!(old_map.is_empty());
        assert_eq!(new_map["foo.py"], BTreeSet::from([6]));
    }

    #[test]
    fn test_renamed_files_are_excluded_from_line_analysis() {
        let diff = "\
diff --git a/old_name.py b/new_name.py
--- a/old_name.py
+++ b/new_name.py
@@ -1,1 +1,1 @@
-old
+new
";
        let patch = Patch::new(diff);
        let (old_map, new_map, union_map) = patch.modified_lines_by_status().unwrap();
        assert!(old_map.is_empty());
        assert!(new_map.is_empty());
        assert!(union_map.is_empty());
    }

    #[test]
    fn test_malformed_hunks_still_yield_files() {
        let diff = "\
diff --git a/src/app.py b/src/app.py
--- a/src/app.py
+++ b/src/app.py
@@ broken header @@
-old
+new
";
        let patch = Patch::new(diff);
        assert!(!patch.is_fully_parsed());
        assert!(patch.modified_lines_by_status().is_err());
        assert_eq!(
            patch.modified_files(false),
            BTreeSet::from(["src/app.py".to_string()])
        );
    }

    #[test]
    fn test_no_newline_marker_is_ignored() {
        let diff = "\
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -1,2 +1,2 @@
 keep
-line1
+line2
\\ No newline at end of file
";
        let patch = Patch::new(diff);
        let (old_map, new_map, _) = patch.modified_lines_by_status().unwrap();
        assert_eq!(old_map["a.py"], BTreeSet::from([2]));
        assert_eq!(new_map["a.py"], BTreeSet::from([2]));
    }

    #[test]
    fn test_added_file_uses_new_path() {
        let diff = "\
diff --git a/brand_new.py b/brand_new.py
new file mode 100644
--- /dev/null
+++ b/brand_new.py
@@ -0,0 +1,2 @@
+def fresh():
+    pass
";
        let patch = Patch::new(diff);
        let files = patch.modified_files(false);
        assert_eq!(files, BTreeSet::from(["brand_new.py".to_string()]));
    }
}
