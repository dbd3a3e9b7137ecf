use similar::{Algorithm, DiffTag, capture_diff_slices};

/// Line indices in `new_text` that are inserted or modified relative to
/// `old_text`.
///
/// Texts are compared as logical lines: terminators are discarded before
/// diffing, so a pure line-ending change (or a newly terminated final line)
/// never registers. Deleted lines are not reported; a replaced line shows up
/// only as an insertion of its new form. Indices come back in ascending
/// order, and diffing any text against the empty string marks every line.
pub fn compute_changelist(old_text: &str, new_text: &str) -> Vec<usize> {
    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();

    let mut changed = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        match op.tag() {
            DiffTag::Insert | DiffTag::Replace => changed.extend(op.new_range()),
            DiffTag::Equal | DiffTag::Delete => {}
        }
    }
    changed
}
