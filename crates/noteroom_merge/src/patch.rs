//! Context-carrying hunks and their fuzzy application.

use crate::diff::{diff, DiffOp};

/// Characters of surrounding context captured on each side of a hunk.
const CONTEXT_LEN: usize = 8;

/// Equality runs shorter than this are folded into the enclosing hunk
/// rather than splitting it in two.
const JOIN_MARGIN: usize = 2 * CONTEXT_LEN;

/// One localized edit: text to remove, text to insert, and the base context
/// around it used to find the edit site in a drifted target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Character offset in the base text where `removed` begins.
    pub base_offset: usize,
    /// Base text immediately before the edit site.
    pub context_before: String,
    /// Text the edit removes. Must match the target exactly, even under fuzz.
    pub removed: String,
    /// Text the edit inserts in place of `removed`.
    pub inserted: String,
    /// Base text immediately after the edit site.
    pub context_after: String,
}

/// The outcome of applying a [`PatchSet`] to a target text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// The target with every successfully located hunk spliced in.
    pub merged: String,
    /// Per-hunk success, in patch order.
    pub applied: Vec<bool>,
}

impl ApplyReport {
    /// Returns true if every hunk applied cleanly.
    #[must_use]
    pub fn all_applied(&self) -> bool {
        self.applied.iter().all(|ok| *ok)
    }
}

/// An ordered set of hunks derived from one base-to-proposed edit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatchSet {
    hunks: Vec<Hunk>,
}

impl PatchSet {
    /// Builds a patch set from the base text and the text proposed for it.
    ///
    /// Identical inputs produce an empty set, which trivially applies to
    /// any target.
    #[must_use]
    pub fn from_texts(base: &str, proposed: &str) -> Self {
        Self::from_ops(base, &diff(base, proposed))
    }

    /// Builds a patch set from a precomputed edit script over `base`.
    #[must_use]
    pub fn from_ops(base: &str, ops: &[DiffOp]) -> Self {
        let base_chars: Vec<char> = base.chars().collect();
        let mut hunks = Vec::new();
        let mut pos = 0usize;
        let mut i = 0;

        while i < ops.len() {
            if let DiffOp::Equal(s) = &ops[i] {
                pos += s.chars().count();
                i += 1;
                continue;
            }

            let start = pos;
            let mut removed = String::new();
            let mut inserted = String::new();

            while i < ops.len() {
                match &ops[i] {
                    DiffOp::Delete(s) => {
                        removed.push_str(s);
                        pos += s.chars().count();
                        i += 1;
                    }
                    DiffOp::Insert(s) => {
                        inserted.push_str(s);
                        i += 1;
                    }
                    DiffOp::Equal(s) => {
                        let len = s.chars().count();
                        // A short equality between two edits stays inside
                        // the hunk; a long one ends it and becomes context.
                        if len < JOIN_MARGIN && i + 1 < ops.len() {
                            removed.push_str(s);
                            inserted.push_str(s);
                            pos += len;
                            i += 1;
                        } else {
                            break;
                        }
                    }
                }
            }

            let context_before: String = base_chars[start.saturating_sub(CONTEXT_LEN)..start]
                .iter()
                .collect();
            let context_after: String = base_chars[pos..(pos + CONTEXT_LEN).min(base_chars.len())]
                .iter()
                .collect();

            hunks.push(Hunk {
                base_offset: start,
                context_before,
                removed,
                inserted,
                context_after,
            });
        }

        Self { hunks }
    }

    /// Returns the hunks in order.
    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Returns true if the set contains no hunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Applies the set to `target`, locating each hunk by context.
    ///
    /// Each hunk is first searched for with its full context at the
    /// occurrence nearest its expected position, then with progressively
    /// trimmed context. Hunks that cannot be located are skipped and
    /// reported; the rest still apply.
    #[must_use]
    pub fn apply(&self, target: &str) -> ApplyReport {
        let mut result: Vec<char> = target.chars().collect();
        let mut applied = Vec::with_capacity(self.hunks.len());
        let mut delta = 0isize;

        for hunk in &self.hunks {
            let expected = hunk.base_offset as isize + delta;
            match apply_hunk(&mut result, hunk, expected) {
                Some(new_delta) => {
                    applied.push(true);
                    delta = new_delta;
                }
                None => applied.push(false),
            }
        }

        ApplyReport {
            merged: result.into_iter().collect(),
            applied,
        }
    }
}

/// Tries to locate and splice one hunk; returns the updated offset delta.
fn apply_hunk(result: &mut Vec<char>, hunk: &Hunk, expected: isize) -> Option<isize> {
    let ctx_before: Vec<char> = hunk.context_before.chars().collect();
    let ctx_after: Vec<char> = hunk.context_after.chars().collect();
    let removed: Vec<char> = hunk.removed.chars().collect();
    let inserted: Vec<char> = hunk.inserted.chars().collect();

    let mut keep = CONTEXT_LEN;
    loop {
        let keep_b = keep.min(ctx_before.len());
        let keep_a = keep.min(ctx_after.len());

        // The removed text must always match exactly; only context may be
        // trimmed away. A hunk with neither context nor removed text can
        // only come from an empty base, where position is meaningless.
        let mut pattern: Vec<char> = Vec::with_capacity(keep_b + removed.len() + keep_a);
        pattern.extend(&ctx_before[ctx_before.len() - keep_b..]);
        pattern.extend(&removed);
        pattern.extend(&ctx_after[..keep_a]);

        if pattern.is_empty() {
            let at = clamp_index(expected, result.len());
            result.splice(at..at, inserted.iter().copied());
            return Some(at as isize - hunk.base_offset as isize + inserted.len() as isize);
        }

        let desired = expected - keep_b as isize;
        if let Some(found) = find_nearest(result, &pattern, desired) {
            let splice_at = found + keep_b;
            result.splice(splice_at..splice_at + removed.len(), inserted.iter().copied());
            return Some(
                splice_at as isize - hunk.base_offset as isize + inserted.len() as isize
                    - removed.len() as isize,
            );
        }

        // Keep at least one context character unless the hunk removes text,
        // in which case the removed text alone is still an anchor.
        let min_keep = usize::from(removed.is_empty() && (keep_b > 0 || keep_a > 0));
        if keep <= min_keep {
            return None;
        }
        keep /= 2;
    }
}

/// Finds the occurrence of `pattern` nearest to `desired`.
fn find_nearest(haystack: &[char], pattern: &[char], desired: isize) -> Option<usize> {
    if pattern.len() > haystack.len() {
        return None;
    }
    let mut best: Option<usize> = None;
    for start in 0..=haystack.len() - pattern.len() {
        if haystack[start..start + pattern.len()] == *pattern {
            match best {
                Some(prev) if (prev as isize - desired).abs() <= (start as isize - desired).abs() => {}
                _ => best = Some(start),
            }
        }
    }
    best
}

fn clamp_index(at: isize, len: usize) -> usize {
    at.clamp(0, len as isize) as usize
}
