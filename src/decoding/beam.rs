//! CTC prefix beam search in log space.
//!
//! Each prefix carries two accumulators: paths ending in blank and paths
//! ending in its last character. Prefixes are merged by their text, so every
//! path that collapses to the same string contributes to a single entry.

use std::collections::HashMap;

use crate::config::BeamSearchConfig;
use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::vocab::Vocabulary;
use crate::decoding::{log_add_exp, LOG_ZERO};
use crate::error::RecognitionError;
use crate::types::Hypothesis;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BeamState {
    log_p_blank: f32,
    log_p_non_blank: f32,
}

impl BeamState {
    const ZERO: Self = Self {
        log_p_blank: LOG_ZERO,
        log_p_non_blank: LOG_ZERO,
    };

    fn total(&self) -> f32 {
        log_add_exp(self.log_p_blank, self.log_p_non_blank)
    }

    fn add_blank(&mut self, log_p: f32) {
        self.log_p_blank = log_add_exp(self.log_p_blank, log_p);
    }

    fn add_non_blank(&mut self, log_p: f32) {
        self.log_p_non_blank = log_add_exp(self.log_p_non_blank, log_p);
    }
}

/// Top `config.top_k` label strings with their log-scores, best first.
///
/// Prefixes are tracked as id sequences, so the repeat rule compares ids the
/// same way [`greedy_decode`](crate::decoding::greedy::greedy_decode) does.
/// Distinct id sequences that render to the same text are merged at the end.
pub fn beam_search_top_k(
    log_probs: &LogProbMatrix,
    vocab: &Vocabulary,
    config: &BeamSearchConfig,
) -> Result<Vec<Hypothesis>, RecognitionError> {
    config.validate()?;

    let per_step_top = config.per_step_top.min(log_probs.num_classes());
    let mut beams: HashMap<Vec<usize>, BeamState> = HashMap::from([(
        Vec::new(),
        BeamState {
            log_p_blank: 0.0,
            log_p_non_blank: LOG_ZERO,
        },
    )]);

    for row in log_probs.rows() {
        let candidates = top_ids(row, per_step_top);
        let mut next: HashMap<Vec<usize>, BeamState> =
            HashMap::with_capacity(beams.len() * per_step_top);

        for (prefix, state) in &beams {
            let total = state.total();
            for &id in &candidates {
                let log_p = row[id];
                if id == config.blank_id {
                    next.entry(prefix.clone())
                        .or_insert(BeamState::ZERO)
                        .add_blank(total + log_p);
                    continue;
                }
                if vocab.char_of(id).is_empty() {
                    continue;
                }

                let mut extended = Vec::with_capacity(prefix.len() + 1);
                extended.extend_from_slice(prefix);
                extended.push(id);

                if prefix.last() == Some(&id) {
                    // A repeat only starts a new character after a blank.
                    next.entry(extended)
                        .or_insert(BeamState::ZERO)
                        .add_non_blank(state.log_p_blank + log_p);
                    next.entry(prefix.clone())
                        .or_insert(BeamState::ZERO)
                        .add_non_blank(state.log_p_non_blank + log_p);
                } else {
                    next.entry(extended)
                        .or_insert(BeamState::ZERO)
                        .add_non_blank(total + log_p);
                }
            }
        }

        beams = prune(next, config.beam_width).into_iter().collect();
    }

    if beams.is_empty() {
        return Err(RecognitionError::DegenerateBeam);
    }

    let ranked = rank_by_text(beams, vocab, config.top_k);
    tracing::debug!(
        frames = log_probs.num_frames(),
        survivors = ranked.len(),
        best = ranked.first().map(|h| h.text.as_str()).unwrap_or(""),
        "beam: search finished"
    );
    Ok(ranked)
}

/// Best `width` live prefixes, ordered by total score then ids.
fn prune(beams: HashMap<Vec<usize>, BeamState>, width: usize) -> Vec<(Vec<usize>, BeamState)> {
    let mut scored = beams
        .into_iter()
        .filter(|(_, state)| state.total() > LOG_ZERO)
        .collect::<Vec<_>>();
    scored.sort_by(|(a_ids, a), (b_ids, b)| {
        b.total()
            .total_cmp(&a.total())
            .then_with(|| a_ids.cmp(b_ids))
    });
    scored.truncate(width);
    scored
}

/// Render surviving prefixes, sum those sharing a text and keep the best `top_k`.
fn rank_by_text(
    beams: HashMap<Vec<usize>, BeamState>,
    vocab: &Vocabulary,
    top_k: usize,
) -> Vec<Hypothesis> {
    let mut by_text: HashMap<String, f32> = HashMap::with_capacity(beams.len());
    for (ids, state) in beams {
        let text = ids.iter().map(|&id| vocab.char_of(id)).collect::<String>();
        let score = by_text.entry(text).or_insert(LOG_ZERO);
        *score = log_add_exp(*score, state.total());
    }
    let mut ranked = by_text
        .into_iter()
        .map(|(text, score)| Hypothesis::new(text, score))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        b.log_score
            .total_cmp(&a.log_score)
            .then_with(|| a.text.cmp(&b.text))
    });
    ranked.truncate(top_k);
    ranked
}

/// Ids of the `k` largest entries of `row`, best first.
fn top_ids(row: &[f32], k: usize) -> Vec<usize> {
    let by_score = |a: &usize, b: &usize| row[*b].total_cmp(&row[*a]).then(a.cmp(b));
    let mut ids = (0..row.len()).collect::<Vec<_>>();
    if k < ids.len() {
        ids.select_nth_unstable_by(k, by_score);
        ids.truncate(k);
    }
    ids.sort_unstable_by(by_score);
    ids
}
