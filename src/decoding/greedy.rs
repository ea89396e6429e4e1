use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::vocab::Vocabulary;
use crate::types::Hypothesis;

/// Collapse a per-timestep id sequence with the CTC rule.
///
/// Repeats are judged against the previous raw id, blanks included, so a
/// blank between two equal ids lets both through.
pub fn greedy_decode(ids: &[usize], vocab: &Vocabulary) -> String {
    let mut text = String::new();
    let mut prev: Option<usize> = None;
    for &id in ids {
        if id != Vocabulary::BLANK_ID && prev != Some(id) {
            text.push_str(vocab.char_of(id));
        }
        prev = Some(id);
    }
    text
}

/// Best-path decoding: argmax per row, then [`greedy_decode`].
///
/// Column [`Vocabulary::BLANK_ID`] is the blank. The score is the summed
/// log-probability of the argmax path, not of the collapsed label.
pub fn greedy_decode_matrix(log_probs: &LogProbMatrix, vocab: &Vocabulary) -> Hypothesis {
    let mut score = 0.0f32;
    let ids = log_probs
        .rows()
        .map(|row| {
            let (id, lp) = argmax(row);
            score += lp;
            id
        })
        .collect::<Vec<_>>();
    Hypothesis::new(greedy_decode(&ids, vocab), score)
}

fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (id, lp)| {
            if lp > best.1 {
                (id, lp)
            } else {
                best
            }
        })
}
