/*!
 * User supplied terminology applied to translation output.
 *
 * Matching is case-insensitive and respects word boundaries. Longer source
 * terms win over shorter ones starting at the same position, and text that
 * was produced by a substitution is never scanned again.
 *
 * A source term found inside any entry's target text is left alone wherever
 * that target text appears, which keeps [`Terminology::apply`] idempotent.
 * Entries are therefore not chained: with `A -> B` and `B -> C`, `A` becomes
 * `B` and stays `B`, and a `B` already in the text is kept as well. Such
 * dictionaries are accepted with a warning.
 */

use std::collections::{HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Serialize};

/// One source term and its mandated translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyEntry {
    pub source: String,
    pub target: String,
    /// Restore the casing pattern of the matched occurrence on the target
    #[serde(default = "default_preserve_case")]
    pub preserve_case: bool,
}

fn default_preserve_case() -> bool {
    true
}

impl TerminologyEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            preserve_case: true,
        }
    }

    pub fn verbatim(mut self) -> Self {
        self.preserve_case = false;
        self
    }
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    entry: TerminologyEntry,
    source: Vec<char>,
    target: Vec<char>,
    /// (entry index, offset) of every target text containing this source term
    anchors: Vec<(usize, usize)>,
}

impl CompiledEntry {
    fn compile(entry: TerminologyEntry) -> Self {
        Self {
            source: fold_all(&entry.source),
            target: fold_all(&entry.target),
            entry,
            anchors: Vec::new(),
        }
    }

    fn replacement(&self, matched: &[char]) -> String {
        let original: String = matched.iter().collect();
        if !self.entry.preserve_case || original == self.entry.source {
            return self.entry.target.clone();
        }
        match CasePattern::of(matched) {
            CasePattern::Upper => self.entry.target.to_uppercase(),
            CasePattern::Lower => self.entry.target.to_lowercase(),
            CasePattern::Capitalized => capitalize(&self.entry.target),
            CasePattern::Mixed => self.entry.target.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CasePattern {
    Upper,
    Capitalized,
    Lower,
    Mixed,
}

impl CasePattern {
    fn of(chars: &[char]) -> Self {
        let letters: Vec<char> = chars.iter().copied().filter(|c| c.is_alphabetic()).collect();
        let Some(first) = letters.first() else {
            return CasePattern::Mixed;
        };
        if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
            CasePattern::Upper
        } else if letters.iter().all(|c| c.is_lowercase()) {
            CasePattern::Lower
        } else if first.is_uppercase() {
            CasePattern::Capitalized
        } else {
            CasePattern::Mixed
        }
    }
}

/// Immutable term dictionary for one job
#[derive(Debug, Clone, Default)]
pub struct Terminology {
    entries: Vec<CompiledEntry>,
    /// Case-folded target of every entry, indexed like `entries`
    targets: Vec<Vec<char>>,
}

impl Terminology {
    pub fn new(entries: impl IntoIterator<Item = TerminologyEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut unique: Vec<TerminologyEntry> = Vec::new();
        for entry in entries {
            if entry.source.trim().is_empty() {
                continue;
            }
            let key = entry.source.to_lowercase();
            if seen.insert(key.clone()) {
                unique.push(entry);
            } else {
                warn!("Duplicate terminology source '{}', keeping the last definition", entry.source);
                if let Some(existing) = unique.iter_mut().find(|e| e.source.to_lowercase() == key) {
                    *existing = entry;
                }
            }
        }

        let mut entries: Vec<CompiledEntry> = unique.into_iter().map(CompiledEntry::compile).collect();
        entries.sort_by(|a, b| b.source.len().cmp(&a.source.len()));

        let targets: Vec<Vec<char>> = entries.iter().map(|e| e.target.clone()).collect();
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.anchors = targets
                .iter()
                .enumerate()
                .flat_map(|(t, target)| occurrences(target, &entry.source).into_iter().map(move |k| (t, k)))
                .collect();
            for &(t, _) in entry.anchors.iter().filter(|(t, _)| *t != index) {
                warn!(
                    "Terminology source '{}' appears in the target of another entry ('{}'); it is not replaced there",
                    entry.entry.source,
                    String::from_iter(&targets[t])
                );
            }
        }
        Self { entries, targets }
    }

    /// Case-preserving dictionary from a plain source → target map
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self::new(map.iter().map(|(source, target)| TerminologyEntry::new(source, target)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TerminologyEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    /// Substitute every dictionary term found in `text`
    pub fn apply(&self, text: &str) -> String {
        if self.entries.is_empty() || text.is_empty() {
            return text.to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let folded: Vec<char> = chars.iter().map(|&c| fold(c)).collect();
        let mut output = String::with_capacity(text.len());
        let mut i = 0;

        'scan: while i < chars.len() {
            if i == 0 || !chars[i - 1].is_alphanumeric() {
                for entry in &self.entries {
                    let end = i + entry.source.len();
                    let matched = end <= chars.len()
                        && folded[i..end] == entry.source[..]
                        && (end == chars.len() || !chars[end].is_alphanumeric());
                    if !matched {
                        continue;
                    }
                    if let Some(occupied) = self.occupied_end(entry, &folded, i) {
                        output.extend(&chars[i..occupied.max(end)]);
                        i = occupied.max(end);
                    } else {
                        output.push_str(&entry.replacement(&chars[i..end]));
                        i = end;
                    }
                    continue 'scan;
                }
            }
            output.push(chars[i]);
            i += 1;
        }
        output
    }

    /// End of a target text that already covers the match of `entry` at `start`
    fn occupied_end(&self, entry: &CompiledEntry, folded: &[char], start: usize) -> Option<usize> {
        entry.anchors.iter().find_map(|&(t, k)| {
            let target = &self.targets[t];
            let begin = start.checked_sub(k)?;
            let end = begin + target.len();
            (end <= folded.len() && folded[begin..end] == target[..]).then_some(end)
        })
    }
}

/// Start offsets of `needle` inside `haystack`
fn occurrences(haystack: &[char], needle: &[char]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    (0..=haystack.len() - needle.len())
        .filter(|&k| haystack[k..k + needle.len()] == needle[..])
        .collect()
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn fold_all(text: &str) -> Vec<char> {
    text.chars().map(fold).collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
