//! Character-level edit scripts.

/// Edit-distance ceiling for the Myers search.
///
/// Beyond this the middle of the diff degrades to a single replace, which
/// keeps worst-case time and memory bounded on large pasted bodies. The
/// surrounding common prefix and suffix are always trimmed first, so typical
/// interactive edits stay far below the cap.
const MAX_EDIT_DISTANCE: usize = 512;

/// One run of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    /// Text present in both sides.
    Equal(String),
    /// Text present only in the base side.
    Delete(String),
    /// Text present only in the proposed side.
    Insert(String),
}

impl DiffOp {
    /// Returns the run's text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(s) | DiffOp::Delete(s) | DiffOp::Insert(s) => s,
        }
    }

    fn is_equal(&self) -> bool {
        matches!(self, DiffOp::Equal(_))
    }
}

/// Computes a character-level edit script from `base` to `proposed`.
///
/// The script is minimal for inputs whose edit distance stays within the
/// internal ceiling; larger rewrites collapse into a delete-insert pair.
/// Adjacent runs of the same kind are always coalesced, and identical
/// inputs produce a script with no insertions or deletions.
#[must_use]
pub fn diff(base: &str, proposed: &str) -> Vec<DiffOp> {
    let a: Vec<char> = base.chars().collect();
    let b: Vec<char> = proposed.chars().collect();

    let prefix = common_prefix(&a, &b);
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(DiffOp::Equal(a[..prefix].iter().collect()));
    }
    ops.extend(diff_middle(a_mid, b_mid));
    if suffix > 0 {
        ops.push(DiffOp::Equal(a[a.len() - suffix..].iter().collect()));
    }

    coalesce(ops)
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn diff_middle(a: &[char], b: &[char]) -> Vec<DiffOp> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) => vec![DiffOp::Insert(b.iter().collect())],
        (false, true) => vec![DiffOp::Delete(a.iter().collect())],
        (false, false) => myers(a, b).unwrap_or_else(|| {
            vec![
                DiffOp::Delete(a.iter().collect()),
                DiffOp::Insert(b.iter().collect()),
            ]
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Equal(char),
    Delete(char),
    Insert(char),
}

/// Greedy Myers O(ND) search with backtracking.
///
/// Returns `None` when the edit distance exceeds [`MAX_EDIT_DISTANCE`].
fn myers(a: &[char], b: &[char]) -> Option<Vec<DiffOp>> {
    let n = a.len();
    let m = b.len();
    let bound = (n + m).min(MAX_EDIT_DISTANCE);
    let offset = bound as isize;
    let width = 2 * bound + 1;

    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    let mut found = None;
    'search: for d in 0..=bound as isize {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let ki = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[ki - 1] < v[ki + 1]) {
                v[ki + 1]
            } else {
                v[ki - 1] + 1
            };
            let mut y = x - k;
            while (x as usize) < n && (y as usize) < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[ki] = x;
            if x as usize >= n && y as usize >= m {
                found = Some(d);
                break 'search;
            }
            k += 2;
        }
    }

    let d_final = found?;
    Some(runs(backtrack(a, b, &trace, d_final, offset)))
}

fn backtrack(a: &[char], b: &[char], trace: &[Vec<isize>], d_final: isize, offset: isize) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut x = a.len() as isize;
    let mut y = b.len() as isize;

    for d in (0..=d_final).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let ki = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[ki - 1] < v[ki + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            steps.push(Step::Equal(a[x as usize]));
        }
        if d > 0 {
            if x == prev_x {
                steps.push(Step::Insert(b[prev_y as usize]));
            } else {
                steps.push(Step::Delete(a[prev_x as usize]));
            }
        }
        x = prev_x;
        y = prev_y;
    }

    steps.reverse();
    steps
}

fn runs(steps: Vec<Step>) -> Vec<DiffOp> {
    let mut ops: Vec<DiffOp> = Vec::new();
    for step in steps {
        match (ops.last_mut(), step) {
            (Some(DiffOp::Equal(s)), Step::Equal(c)) => s.push(c),
            (Some(DiffOp::Delete(s)), Step::Delete(c)) => s.push(c),
            (Some(DiffOp::Insert(s)), Step::Insert(c)) => s.push(c),
            (_, Step::Equal(c)) => ops.push(DiffOp::Equal(c.to_string())),
            (_, Step::Delete(c)) => ops.push(DiffOp::Delete(c.to_string())),
            (_, Step::Insert(c)) => ops.push(DiffOp::Insert(c.to_string())),
        }
    }
    ops
}

fn coalesce(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut out: Vec<DiffOp> = Vec::new();
    for op in ops {
        if op.text().is_empty() {
            continue;
        }
        match (out.last_mut(), &op) {
            (Some(DiffOp::Equal(s)), DiffOp::Equal(t))
            | (Some(DiffOp::Delete(s)), DiffOp::Delete(t))
            | (Some(DiffOp::Insert(s)), DiffOp::Insert(t)) => s.push_str(t),
            _ => out.push(op),
        }
    }
    out
}

/// Reconstructs the proposed text from an edit script, for verification.
#[cfg(test)]
pub(crate) fn apply_to_base(ops: &[DiffOp]) -> String {
    let mut out = String::new();
    for op in ops {
        match op {
            DiffOp::Equal(s) | DiffOp::Insert(s) => out.push_str(s),
            DiffOp::Delete(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_side(ops: &[DiffOp]) -> String {
        let mut out = String::new();
        for op in ops {
            match op {
                DiffOp::Equal(s) | DiffOp::Delete(s) => out.push_str(s),
                DiffOp::Insert(_) => {}
            }
        }
        out
    }

    #[test]
    fn identical_inputs_have_no_edits() {
        let ops = diff("hello", "hello");
        assert_eq!(ops, vec![DiffOp::Equal("hello".into())]);
    }

    #[test]
    fn pure_insert_and_delete() {
        assert_eq!(diff("", "abc"), vec![DiffOp::Insert("abc".into())]);
        assert_eq!(diff("abc", ""), vec![DiffOp::Delete("abc".into())]);
        assert_eq!(diff("", ""), Vec::<DiffOp>::new());
    }

    #[test]
    fn append_is_a_trailing_insert() {
        let ops = diff("ab", "aby");
        assert_eq!(
            ops,
            vec![DiffOp::Equal("ab".into()), DiffOp::Insert("y".into())]
        );
    }

    #[test]
    fn replacement_in_the_middle() {
        let ops = diff("the cat sat", "the dog sat");
        assert_eq!(base_side(&ops), "the cat sat");
        assert_eq!(apply_to_base(&ops), "the dog sat");
        // Prefix and suffix survive as equality runs.
        assert!(matches!(ops.first(), Some(DiffOp::Equal(s)) if s.starts_with("the ")));
        assert!(matches!(ops.last(), Some(DiffOp::Equal(s)) if s.ends_with(" sat")));
    }

    #[test]
    fn multibyte_text_diffs_by_character() {
        let ops = diff("こんにちは", "こんばんは");
        assert_eq!(base_side(&ops), "こんにちは");
        assert_eq!(apply_to_base(&ops), "こんばんは");
    }

    #[test]
    fn large_rewrite_degrades_to_replace() {
        let base: String = (0..2000).map(|i| char::from(b'a' + (i % 7) as u8)).collect();
        let proposed: String = (0..2000)
            .map(|i| char::from(b'p' + ((i * 5 + 3) % 7) as u8))
            .collect();

        let ops = diff(&base, &proposed);
        assert_eq!(base_side(&ops), base);
        assert_eq!(apply_to_base(&ops), proposed);
    }

    #[test]
    fn script_reconstructs_both_sides() {
        let cases = [
            ("ab", "axb"),
            ("abcabba", "cbabac"),
            ("one\ntwo\nthree\n", "one\ntwo and a half\nthree\nfour\n"),
            ("same", "same"),
        ];
        for (base, proposed) in cases {
            let ops = diff(base, proposed);
            assert_eq!(base_side(&ops), base, "base side for {base:?} -> {proposed:?}");
            assert_eq!(
                apply_to_base(&ops),
                proposed,
                "proposed side for {base:?} -> {proposed:?}"
            );
        }
    }
}
