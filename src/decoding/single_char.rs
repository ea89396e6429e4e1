use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::{log_add_exp, LOG_ZERO};

/// Scores at or below this are treated as unreachable.
const VACUOUS_SCORE: f32 = LOG_ZERO * 0.5;

/// For every non-blank id `c`, the log-mass of paths that use only the blank
/// and `c`.
///
/// Uses a two-state forward pass per id (ends in blank / ends in `c`). Both
/// states feed both states, so the score also covers the empty label and
/// repeats such as "cc". Only the ordering between ids is meaningful. The
/// blank's own slot is [`LOG_ZERO`].
pub fn score_all_single_chars(log_probs: &LogProbMatrix, blank_id: usize) -> Vec<f32> {
    let first = log_probs.row(0);
    (0..log_probs.num_classes())
        .map(|c| {
            if c == blank_id {
                return LOG_ZERO;
            }
            let mut ends_blank = first.get(blank_id).copied().unwrap_or(LOG_ZERO);
            let mut ends_char = first[c];
            for row in log_probs.rows().skip(1) {
                let reach = log_add_exp(ends_blank, ends_char);
                ends_blank = reach + row.get(blank_id).copied().unwrap_or(LOG_ZERO);
                ends_char = reach + row[c];
            }
            log_add_exp(ends_blank, ends_char)
        })
        .collect()
}

/// Top `k` `(id, score)` pairs by score, skipping the blank and unreachable ids.
pub fn top_k_from_scores(scores: &[f32], k: usize, blank_id: usize) -> Vec<(usize, f32)> {
    let mut ranked = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|&(id, score)| id != blank_id && score.is_finite() && score > VACUOUS_SCORE)
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}
