//! Line-level diff used to show what a file mutation changed.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Same(String),
    Removed(String),
    Added(String),
}

impl DiffLine {
    fn prefix(&self) -> char {
        match self {
            DiffLine::Same(_) => ' ',
            DiffLine::Removed(_) => '-',
            DiffLine::Added(_) => '+',
        }
    }

    fn text(&self) -> &str {
        match self {
            DiffLine::Same(s) | DiffLine::Removed(s) | DiffLine::Added(s) => s,
        }
    }
}

/// Above this many LCS cells the changed region is shown as a full replacement.
const MAX_LCS_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, Default)]
pub struct LineDiff {
    lines: Vec<DiffLine>,
}

impl LineDiff {
    pub fn compute(old: &str, new: &str) -> Self {
        let old_lines: Vec<&str> = old.lines().collect();
        let new_lines: Vec<&str> = new.lines().collect();

        let prefix = old_lines
            .iter()
            .zip(&new_lines)
            .take_while(|(a, b)| a == b)
            .count();
        let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
        let suffix = old_lines
            .iter()
            .rev()
            .zip(new_lines.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        let mut lines = Vec::with_capacity(old_lines.len().max(new_lines.len()));
        lines.extend(
            old_lines[..prefix]
                .iter()
                .map(|l| DiffLine::Same(l.to_string())),
        );
        lines.extend(diff_middle(
            &old_lines[prefix..old_lines.len() - suffix],
            &new_lines[prefix..new_lines.len() - suffix],
        ));
        lines.extend(
            old_lines[old_lines.len() - suffix..]
                .iter()
                .map(|l| DiffLine::Same(l.to_string())),
        );

        Self { lines }
    }

    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| !matches!(l, DiffLine::Same(_)))
    }

    pub fn removed_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Removed(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn added_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Added(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(added, removed)` line counts.
    pub fn stats(&self) -> (usize, usize) {
        (self.added_lines().len(), self.removed_lines().len())
    }

    /// Unified-style hunks with `context` unchanged lines around each change.
    pub fn render(&self, context: usize) -> String {
        let mut hunks: Vec<(usize, usize)> = Vec::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if matches!(line, DiffLine::Same(_)) {
                continue;
            }
            let start = idx.saturating_sub(context);
            let end = (idx + context + 1).min(self.lines.len());
            match hunks.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => hunks.push((start, end)),
            }
        }

        // Number of old/new lines before each position
        let mut old_before = Vec::with_capacity(self.lines.len() + 1);
        let mut new_before = Vec::with_capacity(self.lines.len() + 1);
        let (mut old_count, mut new_count) = (0usize, 0usize);
        for line in &self.lines {
            old_before.push(old_count);
            new_before.push(new_count);
            match line {
                DiffLine::Same(_) => {
                    old_count += 1;
                    new_count += 1;
                }
                DiffLine::Removed(_) => old_count += 1,
                DiffLine::Added(_) => new_count += 1,
            }
        }
        old_before.push(old_count);
        new_before.push(new_count);

        let mut out = Vec::new();
        for (start, end) in hunks {
            let old_len = old_before[end] - old_before[start];
            let new_len = new_before[end] - new_before[start];
            let old_start = if old_len == 0 {
                old_before[start]
            } else {
                old_before[start] + 1
            };
            let new_start = if new_len == 0 {
                new_before[start]
            } else {
                new_before[start] + 1
            };
            out.push(format!(
                "@@ -{},{} +{},{} @@",
                old_start, old_len, new_start, new_len
            ));
            for line in &self.lines[start..end] {
                out.push(format!("{}{}", line.prefix(), line.text()));
            }
        }
        out.join("\n")
    }
}

fn diff_middle(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let replace_all = || {
        old.iter()
            .map(|l| DiffLine::Removed(l.to_string()))
            .chain(new.iter().map(|l| DiffLine::Added(l.to_string())))
            .collect()
    };

    if old.is_empty() || new.is_empty() || old.len() * new.len() > MAX_LCS_CELLS {
        return replace_all();
    }

    let (n, m) = (old.len(), new.len());
    let width = m + 1;
    // table[i * width + j] = LCS length of old[i..] and new[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            lines.push(DiffLine::Same(old[i].to_string()));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            lines.push(DiffLine::Removed(old[i].to_string()));
            i += 1;
        } else {
            lines.push(DiffLine::Added(new[j].to_string()));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().map(|l| DiffLine::Removed(l.to_string())));
    lines.extend(new[j..].iter().map(|l| DiffLine::Added(l.to_string())));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_input_has_no_changes() {
        let diff = LineDiff::compute("a\nb\n", "a\nb\n");
        assert!(!diff.has_changes());
        assert_eq!(diff.render(3), "");
    }

    #[test]
    fn test_single_line_replacement() {
        let diff = LineDiff::compute("one\ntwo\nthree\n", "one\n2\nthree\n");
        assert_eq!(diff.removed_lines(), vec!["two"]);
        assert_eq!(diff.added_lines(), vec!["2"]);
        assert_eq!(diff.render(1), "@@ -1,3 +1,3 @@\n one\n-two\n+2\n three");
    }

    #[test]
    fn test_insertion_in_middle_keeps_common_lines() {
        let diff = LineDiff::compute("a\nc\n", "a\nb\nc\n");
        assert_eq!(diff.stats(), (1, 0));
        assert_eq!(
            diff.lines(),
            &[
                DiffLine::Same("a".into()),
                DiffLine::Added("b".into()),
                DiffLine::Same("c".into()),
            ]
        );
    }

    #[test]
    fn test_distant_changes_produce_separate_hunks() {
        let old: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        let new = old
            .replace("line 2\n", "line two\n")
            .replace("line 19\n", "line nineteen\n");
        let rendered = LineDiff::compute(&old, &new).render(2);
        assert_eq!(rendered.matches("@@ -").count(), 2);
        assert!(rendered.contains("@@ -1,4 +1,4 @@"));
    }
}
