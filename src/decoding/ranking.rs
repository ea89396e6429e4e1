use crate::types::{Candidate, Hypothesis};

const MIN_PARTITION: f64 = 1e-12;

/// Softmax over the set's log-scores, as percentages summing to 100.
///
/// Input order is kept. The result is relative to this set only. NaN scores
/// get no share; if no score is finite the best-scored entries split 100
/// evenly.
pub fn to_percents(hypotheses: &[Hypothesis]) -> Vec<Candidate> {
    if hypotheses.is_empty() {
        return Vec::new();
    }
    let max_score = hypotheses
        .iter()
        .map(|h| h.log_score as f64)
        .filter(|s| !s.is_nan())
        .reduce(f64::max);

    let weights = hypotheses
        .iter()
        .map(|h| {
            let score = h.log_score as f64;
            match max_score {
                Some(max) if max.is_finite() => {
                    if score.is_nan() {
                        0.0
                    } else {
                        (score - max).exp()
                    }
                }
                Some(max) if score == max => 1.0,
                Some(_) => 0.0,
                None => 1.0,
            }
        })
        .collect::<Vec<_>>();
    let partition = weights.iter().sum::<f64>().max(MIN_PARTITION);

    hypotheses
        .iter()
        .zip(weights)
        .map(|(h, w)| Candidate {
            text: h.text.clone(),
            percent: 100.0 * w / partition,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(to_percents(&[]).is_empty());
    }

    #[test]
    fn single_candidate_takes_everything() {
        let out = to_percents(&[Hypothesis::new("字", -42.0)]);
        assert_eq!(out.len(), 1);
        assert!((out[0].percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn percents_sum_to_hundred_and_keep_order() {
        let hyps = vec![
            Hypothesis::new("a", -0.1),
            Hypothesis::new("b", -2.3),
            Hypothesis::new("c", -0.7),
            Hypothesis::new("d", -150.0),
        ];
        let out = to_percents(&hyps);
        let total: f64 = out.iter().map(|c| c.percent).sum();
        assert!((total - 100.0).abs() < 1e-6);
        assert_eq!(
            out.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            ["a", "b", "c", "d"]
        );
        assert!(out[0].percent > out[2].percent && out[2].percent > out[1].percent);
    }

    #[test]
    fn unreachable_scores_still_sum_to_hundred() {
        let out = to_percents(&[Hypothesis::new("x", f32::NEG_INFINITY)]);
        assert!((out[0].percent - 100.0).abs() < 1e-9);

        let out = to_percents(&[
            Hypothesis::new("x", f32::NEG_INFINITY),
            Hypothesis::new("y", f32::NEG_INFINITY),
        ]);
        assert!(out.iter().all(|c| (c.percent - 50.0).abs() < 1e-9));

        let out = to_percents(&[
            Hypothesis::new("x", -1.0),
            Hypothesis::new("y", f32::NEG_INFINITY),
            Hypothesis::new("z", f32::NAN),
        ]);
        assert!((out[0].percent - 100.0).abs() < 1e-9);
        assert_eq!(out[1].percent, 0.0);
        assert_eq!(out[2].percent, 0.0);
    }

    #[test]
    fn infinite_scores_share_evenly() {
        let out = to_percents(&[
            Hypothesis::new("x", f32::INFINITY),
            Hypothesis::new("y", 0.0),
            Hypothesis::new("z", f32::INFINITY),
        ]);
        assert!((out[0].percent - 50.0).abs() < 1e-9);
        assert_eq!(out[1].percent, 0.0);
        assert!((out[2].percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn huge_scores_do_not_overflow() {
        let hyps = vec![Hypothesis::new("x", 1.0e6), Hypothesis::new("y", 1.0e6)];
        let out = to_percents(&hyps);
        assert!((out[0].percent - 50.0).abs() < 1e-9);
        assert!((out[1].percent - 50.0).abs() < 1e-9);
    }
}
