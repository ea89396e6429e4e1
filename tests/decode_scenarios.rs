use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ink_ctc_rs::pipeline::defaults::decoder_for;
use ink_ctc_rs::{
    beam_search_top_k, greedy_decode, greedy_decode_matrix, score_all_single_chars, to_percents,
    BeamSearchConfig, DecodeMethod, LogProbMatrix, RecognitionError, Vocabulary,
};
use libtest_mimic::{Arguments, Failed, Trial};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

const SUITE_NAME: &str = "decode_scenarios";
const DEFAULT_RANDOM_SEED: u64 = 42;
const DEFAULT_RANDOM_CASES: usize = 24;

#[derive(Debug, Clone, Deserialize)]
struct Scenario {
    name: String,
    vocab: Vec<String>,
    #[serde(default)]
    method: Option<DecodeMethod>,
    #[serde(default)]
    beam: Option<BeamSearchConfig>,
    /// Per-frame probabilities; converted to natural-log space before decoding.
    #[serde(default)]
    probs: Option<Vec<Vec<f32>>>,
    /// Raw id stream for the collapse rule alone.
    #[serde(default)]
    ids: Option<Vec<usize>>,
    #[serde(default)]
    expect_top: Option<String>,
    #[serde(default)]
    expect_count: Option<usize>,
    #[serde(default)]
    expect_min_percent: Option<f64>,
    #[serde(default)]
    expect_degenerate: bool,
}

fn main() {
    let args = Arguments::from_args();
    let repo_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let seed = env_u64("INK_IT_SEED", DEFAULT_RANDOM_SEED);
    let random_cases = env_u64("INK_IT_RANDOM_CASES", DEFAULT_RANDOM_CASES as u64) as usize;

    let scenarios = match load_scenarios(&repo_root.join("test-data/decode_scenarios.json")) {
        Ok(scenarios) => scenarios,
        Err(err) => {
            let test = Trial::test(format!("{SUITE_NAME}::setup"), move || {
                Err(Failed::from(err))
            });
            libtest_mimic::run(&args, vec![test]).exit();
        }
    };

    let mut tests = Vec::with_capacity(scenarios.len() + random_cases);
    for scenario in scenarios {
        let kind = match (&scenario.ids, scenario.method) {
            (Some(_), _) => "ids",
            (None, Some(DecodeMethod::Greedy)) => "greedy",
            (None, Some(DecodeMethod::SingleChar)) => "single_char",
            (None, _) => "beam",
        };
        let test_name = format!("{SUITE_NAME}::{kind}::{}", scenario.name);
        tests.push(Trial::test(test_name, move || {
            run_scenario(&scenario).map_err(Failed::from)
        }));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for index in 0..random_cases {
        let frames = rng.gen_range(1..=5);
        let rows = random_rows(&mut rng, frames, 3);
        tests.push(Trial::test(
            format!("{SUITE_NAME}::random::seed_{seed}_{index}"),
            move || check_exact_search_invariants(&rows).map_err(Failed::from),
        ));
    }

    libtest_mimic::run(&args, tests).exit();
}

fn run_scenario(scenario: &Scenario) -> Result<(), String> {
    let vocab = Vocabulary::from_itos(scenario.vocab.clone());

    if let Some(ids) = scenario.ids.as_ref() {
        let text = greedy_decode(ids, &vocab);
        return expect_eq("collapsed text", scenario.expect_top.as_deref(), &text);
    }

    let probs = scenario
        .probs
        .as_ref()
        .ok_or_else(|| format!("scenario '{}' has neither ids nor probs", scenario.name))?;
    let log_probs = to_log_matrix(probs)?;
    let beam = scenario.beam.clone().unwrap_or_default();
    let decoder = decoder_for(scenario.method.unwrap_or_default(), &beam);

    let hypotheses = match decoder.decode(&log_probs, &vocab) {
        Err(RecognitionError::DegenerateBeam) if scenario.expect_degenerate => return Ok(()),
        Err(err) => return Err(format!("decode failed: {err}")),
        Ok(_) if scenario.expect_degenerate => {
            return Err("expected a degenerate beam, got hypotheses".to_string())
        }
        Ok(hypotheses) => hypotheses,
    };

    let candidates = to_percents(&hypotheses);
    let top = candidates
        .first()
        .ok_or_else(|| "decoder returned no candidates".to_string())?;
    expect_eq("top candidate", scenario.expect_top.as_deref(), &top.text)?;

    if let Some(count) = scenario.expect_count {
        if candidates.len() != count {
            return Err(format!(
                "expected {count} candidates, got {}: {candidates:?}",
                candidates.len()
            ));
        }
    }
    if let Some(min_percent) = scenario.expect_min_percent {
        if top.percent <= min_percent {
            return Err(format!(
                "top candidate '{}' has {:.3}%, expected more than {min_percent}%",
                top.text, top.percent
            ));
        }
    }
    let total: f64 = candidates.iter().map(|c| c.percent).sum();
    if (total - 100.0).abs() > 1e-6 {
        return Err(format!("percentages sum to {total}, expected 100"));
    }
    Ok(())
}

/// With every class considered and no pruning, the search enumerates every
/// label. Its scores must then agree with the closed-form quantities.
fn check_exact_search_invariants(rows: &[Vec<f32>]) -> Result<(), String> {
    let vocab = Vocabulary::from_itos(vec!["A".to_string(), "B".to_string()]);
    let log_probs = to_log_matrix(rows)?;
    let config = BeamSearchConfig {
        beam_width: 1000,
        per_step_top: 3,
        top_k: 1000,
        blank_id: 0,
    };
    let hypotheses =
        beam_search_top_k(&log_probs, &vocab, &config).map_err(|err| err.to_string())?;

    let mass: f64 = hypotheses
        .iter()
        .map(|h| (h.log_score as f64).exp())
        .sum();
    if (mass - 1.0).abs() > 1e-3 {
        return Err(format!("label probabilities sum to {mass}, expected 1"));
    }

    let best = hypotheses
        .first()
        .ok_or_else(|| "exact search returned nothing".to_string())?;
    let greedy = greedy_decode_matrix(&log_probs, &vocab);
    if best.log_score < greedy.log_score - 1e-4 {
        return Err(format!(
            "best label '{}' ({}) scores below the best single path '{}' ({})",
            best.text, best.log_score, greedy.text, greedy.log_score
        ));
    }

    let single = score_all_single_chars(&log_probs, 0);
    for (id, label) in vocab.itos().iter().enumerate().map(|(i, s)| (i + 1, s)) {
        // The two-state recurrence never leaves {blank, label}, so it carries
        // every label made of that character alone: "", "A", "AA", ...
        let expected: f64 = hypotheses
            .iter()
            .filter(|h| h.text.replace(label.as_str(), "").is_empty())
            .map(|h| (h.log_score as f64).exp())
            .sum();
        let actual = (single[id] as f64).exp();
        if (actual - expected).abs() > 1e-4 {
            return Err(format!(
                "single-char score for '{label}' is {actual}, search says {expected}"
            ));
        }
    }
    Ok(())
}

fn random_rows(rng: &mut StdRng, frames: usize, classes: usize) -> Vec<Vec<f32>> {
    (0..frames)
        .map(|_| {
            let raw = (0..classes)
                .map(|_| rng.gen_range(0.05f32..1.0))
                .collect::<Vec<_>>();
            let sum: f32 = raw.iter().sum();
            raw.into_iter().map(|p| p / sum).collect()
        })
        .collect()
}

fn to_log_matrix(probs: &[Vec<f32>]) -> Result<LogProbMatrix, String> {
    let rows = probs
        .iter()
        .map(|row| row.iter().map(|p| p.ln()).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    LogProbMatrix::from_rows(&rows).map_err(|err| err.to_string())
}

fn expect_eq(what: &str, expected: Option<&str>, actual: &str) -> Result<(), String> {
    match expected {
        Some(expected) if expected != actual => Err(format!(
            "{what}: expected '{expected}', got '{actual}'"
        )),
        _ => Ok(()),
    }
}

fn load_scenarios(path: &Path) -> Result<Vec<Scenario>, String> {
    let file = File::open(path)
        .map_err(|err| format!("Failed to open fixture '{}': {err}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| format!("Failed to parse fixture '{}': {err}", path.display()))
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
