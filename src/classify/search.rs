//! Exhaustive search over break-position combinations.
//!
//! Candidates are sorted and unique, combinations are visited in
//! lexicographic index order, and a combination only replaces the incumbent
//! when it scores strictly higher. Parallel mode reduces with the same
//! rule (higher score, then lower rank), so both modes agree.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use super::control::{SearchMode, SearchOptions};
use super::interval::{candidate_positions, extract_intervals};
use super::pocc::{BreakScorer, PoccScorer};
use super::ClassifyParams;
use crate::data::model::Dataset;
use crate::error::{Error, Result};

/// Best break set found by the search.
///
/// `thresholds` are the `num_classes - 1` internal breaks, sorted ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoccClassification {
    pub thresholds: Vec<f64>,
    pub score: f64,
    /// Number of combinations scored.
    pub evaluated: u64,
}

/// `C(n, k)`, or `None` if it does not fit in a `u128`.
pub fn binomial(n: usize, k: usize) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k) as u128;
    let n = n as u128;
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by (i + 1) at every step
        acc = acc.checked_mul(n - i)? / (i + 1);
    }
    Some(acc)
}

// ---------------------------------------------------------------------------
// Combination enumeration
// ---------------------------------------------------------------------------

/// Step `indices` to the next k-combination of `0..n` in lexicographic order.
/// Returns false after the last one.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if indices[i] < n - k + i {
            indices[i] += 1;
            for j in i + 1..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Lexicographic k-combinations of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    indices: Vec<usize>,
    n: usize,
    pending: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            indices: (0..k).collect(),
            n,
            pending: k <= n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.pending {
            return None;
        }
        let current = self.indices.clone();
        self.pending = next_combination(&mut self.indices, self.n);
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Ranked {
    rank: usize,
    score: f64,
    thresholds: Vec<f64>,
}

impl Ranked {
    fn better(a: Ranked, b: Ranked) -> Ranked {
        if b.score > a.score || (b.score == a.score && b.rank < a.rank) {
            b
        } else {
            a
        }
    }
}

/// Score every `num_breaks`-subset of `candidates` and keep the best.
///
/// `candidates` must be sorted and free of duplicates; see
/// [`candidate_positions`].
pub fn search_breaks<S: BreakScorer>(
    candidates: &[f64],
    num_breaks: usize,
    scorer: &S,
    opts: &SearchOptions,
) -> Result<PoccClassification> {
    if num_breaks == 0 {
        return Err(Error::invalid("num_breaks", num_breaks, "at least one break required"));
    }
    if candidates.len() < num_breaks {
        return Err(Error::NotEnoughCandidates {
            available: candidates.len(),
            required: num_breaks,
        });
    }

    let total = binomial(candidates.len(), num_breaks);
    log::info!(
        "searching {} combinations of {num_breaks} breaks over {} candidate positions ({:?})",
        total.map_or_else(|| "more than 2^128".to_string(), |t| t.to_string()),
        candidates.len(),
        opts.mode
    );
    opts.report_start(total);

    let started = Instant::now();
    let result = match opts.mode {
        SearchMode::Sequential => search_sequential(candidates, num_breaks, scorer, opts, started),
        SearchMode::Parallel => search_parallel(candidates, num_breaks, scorer, opts, started),
    };
    opts.report_finish();

    let (best, evaluated) = result?;
    log::info!(
        "best POCC {:.6} with breaks {:?} after {evaluated} evaluations in {:.2?}",
        best.score,
        best.thresholds,
        started.elapsed()
    );
    Ok(PoccClassification {
        thresholds: best.thresholds,
        score: best.score,
        evaluated,
    })
}

fn search_sequential<S: BreakScorer>(
    candidates: &[f64],
    k: usize,
    scorer: &S,
    opts: &SearchOptions,
    started: Instant,
) -> Result<(Ranked, u64)> {
    let every = opts.check_every();
    let mut indices: Vec<usize> = (0..k).collect();
    let mut thresholds: Vec<f64> = indices.iter().map(|&i| candidates[i]).collect();
    let mut best: Option<Ranked> = None;
    let mut evaluated: u64 = 0;

    loop {
        let score = scorer.score(&thresholds);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Ranked {
                rank: evaluated as usize,
                score,
                thresholds: thresholds.clone(),
            });
        }
        evaluated += 1;

        if evaluated % every == 0 {
            opts.check(started)?;
            opts.report_advance(every);
        }
        if !next_combination(&mut indices, candidates.len()) {
            break;
        }
        for (t, &i) in thresholds.iter_mut().zip(&indices) {
            *t = candidates[i];
        }
    }
    opts.report_advance(evaluated % every);

    // At least one combination exists since candidates.len() >= k >= 1
    best.map(|b| (b, evaluated)).ok_or(Error::EmptyDataset)
}

fn search_parallel<S: BreakScorer>(
    candidates: &[f64],
    k: usize,
    scorer: &S,
    opts: &SearchOptions,
    started: Instant,
) -> Result<(Ranked, u64)> {
    let every = opts.check_every();
    let evaluated = AtomicU64::new(0);
    let halted = AtomicBool::new(false);
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    // Stop pulling combinations once a worker has hit cancellation or the time limit
    let best = Combinations::new(candidates.len(), k)
        .take_while(|_| !halted.load(Ordering::Relaxed))
        .enumerate()
        .par_bridge()
        .filter_map(|(rank, indices)| {
            if halted.load(Ordering::Relaxed) {
                return None;
            }
            let thresholds: Vec<f64> = indices.iter().map(|&i| candidates[i]).collect();
            let score = scorer.score(&thresholds);

            let done = evaluated.fetch_add(1, Ordering::Relaxed) + 1;
            if done % every == 0 {
                if let Err(e) = opts.check(started) {
                    halted.store(true, Ordering::Relaxed);
                    failure
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .get_or_insert(e);
                    return None;
                }
                opts.report_advance(every);
            }
            Some(Ranked {
                rank,
                score,
                thresholds,
            })
        })
        .reduce_with(Ranked::better);

    let failure = failure
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(e) = failure {
        return Err(e);
    }

    let evaluated = evaluated.into_inner();
    opts.report_advance(evaluated % every);
    best.map(|b| (b, evaluated)).ok_or(Error::EmptyDataset)
}

// ---------------------------------------------------------------------------
// Dataset-level entry point
// ---------------------------------------------------------------------------

/// A prepared POCC search: intervals scored, candidates collected, size known.
///
/// Building the plan runs every check that can fail before enumeration, so
/// callers can report [`SearchPlan::combinations`] and then [`SearchPlan::run`].
#[derive(Debug, Clone)]
pub struct SearchPlan {
    scorer: PoccScorer,
    candidates: Vec<f64>,
    num_breaks: usize,
}

impl SearchPlan {
    pub fn new(dataset: &Dataset, params: &ClassifyParams) -> Result<Self> {
        params.validate()?;

        let intervals = extract_intervals(dataset);
        let scorer = PoccScorer::new(&intervals, params.num_classes, params.p)?;
        let candidates = candidate_positions(dataset);
        let num_breaks = params.num_classes - 1;

        if candidates.len() < num_breaks {
            return Err(Error::NotEnoughCandidates {
                available: candidates.len(),
                required: num_breaks,
            });
        }

        log::info!(
            "{} intervals, {} candidate positions",
            scorer.len(),
            candidates.len()
        );
        Ok(Self {
            scorer,
            candidates,
            num_breaks,
        })
    }

    pub fn num_intervals(&self) -> usize {
        self.scorer.len()
    }

    pub fn candidates(&self) -> &[f64] {
        &self.candidates
    }

    /// Number of break sets the search will score.
    pub fn combinations(&self) -> Option<u128> {
        binomial(self.candidates.len(), self.num_breaks)
    }

    pub fn run(&self, opts: &SearchOptions) -> Result<PoccClassification> {
        search_breaks(&self.candidates, self.num_breaks, &self.scorer, opts)
    }
}

/// Find the break set maximizing POCC for `dataset`.
pub fn pocc_classify(
    dataset: &Dataset,
    params: &ClassifyParams,
    opts: &SearchOptions,
) -> Result<PoccClassification> {
    SearchPlan::new(dataset, params)?.run(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::control::CancelToken;
    use crate::classify::control::ProgressSink;
    use crate::data::model::Epoch;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Counts calls and returns a fixed score.
    struct CountingScorer {
        calls: AtomicUsize,
        score: f64,
    }

    impl CountingScorer {
        fn new(score: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                score,
            }
        }
    }

    impl BreakScorer for CountingScorer {
        fn score(&self, _thresholds: &[f64]) -> f64 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.score
        }
    }

    /// Sleeps on every call so a short time limit always expires.
    struct SlowScorer;

    impl BreakScorer for SlowScorer {
        fn score(&self, _thresholds: &[f64]) -> f64 {
            std::thread::sleep(Duration::from_millis(2));
            0.0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        total: Mutex<Option<Option<u128>>>,
        advanced: AtomicU64,
        finished: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn on_start(&self, total: Option<u128>) {
            *self.total.lock().unwrap() = Some(total);
        }

        fn on_advance(&self, evaluated: u64) {
            self.advanced.fetch_add(evaluated, Ordering::Relaxed);
        }

        fn on_finish(&self) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Prefers break sets whose sum is closest to a target.
    struct TargetSum(f64);

    impl BreakScorer for TargetSum {
        fn score(&self, thresholds: &[f64]) -> f64 {
            -(thresholds.iter().sum::<f64>() - self.0).abs()
        }
    }

    fn reference_dataset() -> Dataset {
        Dataset::new(
            vec![
                Epoch::new("epoch1", vec![0.0, 0.0, 0.0, 0.0]),
                Epoch::new("epoch2", vec![1.0, 50.0, 0.0, 100.0]),
            ],
            -9999.0,
        )
        .unwrap()
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(4, 1), Some(4));
        assert_eq!(binomial(10, 3), Some(120));
        assert_eq!(binomial(5, 0), Some(1));
        assert_eq!(binomial(3, 5), Some(0));
        assert_eq!(binomial(60, 30), Some(118_264_581_564_861_424));
        assert_eq!(binomial(1000, 500), None);
    }

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(3, 3).count(), 1);
    }

    #[test]
    fn reference_scenario_selects_break_at_one() {
        let params = ClassifyParams {
            num_classes: 2,
            p: 0.05,
        };
        let plan = SearchPlan::new(&reference_dataset(), &params).unwrap();
        assert_eq!(plan.num_intervals(), 4);
        assert_eq!(plan.candidates(), &[0.0, 1.0, 50.0, 100.0]);
        assert_eq!(plan.combinations(), Some(4));

        let result = plan.run(&SearchOptions::default()).unwrap();
        assert_eq!(result.thresholds, vec![1.0]);
        assert!((result.score - 7.0 / 29.0).abs() < 1e-12);
        assert_eq!(result.evaluated, 4);
    }

    #[test]
    fn evaluates_every_combination_exactly_once() {
        let candidates: Vec<f64> = (0..9).map(f64::from).collect();
        for k in 1..=4 {
            for mode in [SearchMode::Sequential, SearchMode::Parallel] {
                let scorer = CountingScorer::new(0.5);
                let opts = SearchOptions::default().with_mode(mode);
                let result = search_breaks(&candidates, k, &scorer, &opts).unwrap();
                let expected = binomial(9, k).unwrap() as usize;
                assert_eq!(scorer.calls.load(Ordering::Relaxed), expected);
                assert_eq!(result.evaluated as usize, expected);
            }
        }
    }

    #[test]
    fn ties_keep_first_combination() {
        let candidates = [2.0, 3.0, 5.0, 7.0, 11.0];
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let opts = SearchOptions::default().with_mode(mode);
            let result = search_breaks(&candidates, 2, &CountingScorer::new(1.0), &opts).unwrap();
            assert_eq!(result.thresholds, vec![2.0, 3.0]);
        }
        let result =
            search_breaks(&candidates, 2, &TargetSum(9.0), &SearchOptions::default()).unwrap();
        assert_eq!(result.thresholds, vec![2.0, 7.0]);

        // {3, 7} and {5, 7} are both one away from 11; {3, 7} comes first
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let opts = SearchOptions::default().with_mode(mode);
            let result = search_breaks(&candidates, 2, &TargetSum(11.0), &opts).unwrap();
            assert_eq!(result.thresholds, vec![3.0, 7.0]);
            assert_eq!(result.score, -1.0);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let ds = Dataset::new(
            vec![
                Epoch::new("a", vec![0.0, 10.0, 35.0, 80.0, 41.0, 5.0]),
                Epoch::new("b", vec![22.0, 12.0, 70.0, 79.0, 2.0, 60.0]),
                Epoch::new("c", vec![40.0, 31.0, 71.0, 20.0, 3.0, 61.0]),
            ],
            -9999.0,
        )
        .unwrap();
        let params = ClassifyParams {
            num_classes: 4,
            p: 0.05,
        };
        let seq = pocc_classify(&ds, &params, &SearchOptions::default()).unwrap();
        let par = pocc_classify(
            &ds,
            &params,
            &SearchOptions::default().with_mode(SearchMode::Parallel),
        )
        .unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.thresholds.len(), 3);
        assert!(seq.thresholds.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn cancelled_search_returns_no_result() {
        let token = CancelToken::new();
        token.cancel();
        let candidates: Vec<f64> = (0..20).map(f64::from).collect();
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let opts = SearchOptions {
                check_every: 1,
                ..SearchOptions::default()
            }
            .with_mode(mode)
            .with_cancel(token.clone());
            let err = search_breaks(&candidates, 3, &CountingScorer::new(0.0), &opts).unwrap_err();
            assert_eq!(err, Error::Cancelled);
        }
    }

    #[test]
    fn parallel_cancel_stops_enumeration() {
        let token = CancelToken::new();
        token.cancel();
        // C(200, 5) is about 2.5e9 combinations
        let candidates: Vec<f64> = (0..200).map(f64::from).collect();
        let scorer = CountingScorer::new(0.0);
        let opts = SearchOptions {
            check_every: 1,
            ..SearchOptions::default()
        }
        .with_mode(SearchMode::Parallel)
        .with_cancel(token);

        let started = Instant::now();
        let err = search_breaks(&candidates, 5, &scorer, &opts).unwrap_err();
        assert_eq!(err, Error::Cancelled);
        assert!(scorer.calls.load(Ordering::Relaxed) < 10_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn time_limit_expires_in_both_modes() {
        let candidates: Vec<f64> = (0..30).map(f64::from).collect();
        let limit = Duration::from_millis(1);
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let opts = SearchOptions {
                check_every: 1,
                ..SearchOptions::default()
            }
            .with_mode(mode)
            .with_time_limit(limit);
            let err = search_breaks(&candidates, 3, &SlowScorer, &opts).unwrap_err();
            assert_eq!(err, Error::TimedOut { limit });
        }
    }

    #[test]
    fn progress_sink_sees_start_every_evaluation_and_one_finish() {
        let candidates: Vec<f64> = (0..10).map(f64::from).collect();
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let sink = Arc::new(RecordingSink::default());
            // 120 combinations leave a remainder of 1 after steps of 7
            let opts = SearchOptions {
                check_every: 7,
                ..SearchOptions::default()
            }
            .with_mode(mode)
            .with_progress(sink.clone());

            let result = search_breaks(&candidates, 3, &CountingScorer::new(0.0), &opts).unwrap();
            assert_eq!(result.evaluated, 120);
            assert_eq!(*sink.total.lock().unwrap(), Some(Some(120)));
            assert_eq!(sink.advanced.load(Ordering::Relaxed), result.evaluated);
            assert_eq!(sink.finished.load(Ordering::Relaxed), 1);
        }
    }

    #[test]
    fn progress_finishes_even_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let candidates: Vec<f64> = (0..10).map(f64::from).collect();
        for mode in [SearchMode::Sequential, SearchMode::Parallel] {
            let sink = Arc::new(RecordingSink::default());
            let opts = SearchOptions {
                check_every: 1,
                ..SearchOptions::default()
            }
            .with_mode(mode)
            .with_cancel(token.clone())
            .with_progress(sink.clone());
            assert!(search_breaks(&candidates, 3, &CountingScorer::new(0.0), &opts).is_err());
            assert_eq!(sink.finished.load(Ordering::Relaxed), 1);
        }
    }

    #[test]
    fn too_few_candidates() {
        let ds = Dataset::new(
            vec![Epoch::new("a", vec![0.0, 0.0]), Epoch::new("b", vec![100.0, 100.0])],
            -9999.0,
        )
        .unwrap();
        let params = ClassifyParams {
            num_classes: 4,
            p: 0.05,
        };
        assert_eq!(
            SearchPlan::new(&ds, &params).unwrap_err(),
            Error::NotEnoughCandidates {
                available: 2,
                required: 3
            }
        );
    }

    #[test]
    fn single_epoch_has_no_intervals() {
        let ds = Dataset::new(vec![Epoch::new("a", vec![0.0, 100.0])], -9999.0).unwrap();
        assert_eq!(
            pocc_classify(&ds, &ClassifyParams::default(), &SearchOptions::default()).unwrap_err(),
            Error::NoIntervals
        );
    }

    #[test]
    fn no_significant_change_is_reported_before_search() {
        let ds = Dataset::new(
            vec![Epoch::new("a", vec![0.0, 10.0]), Epoch::new("b", vec![1.0, 12.0])],
            -9999.0,
        )
        .unwrap();
        let params = ClassifyParams {
            num_classes: 2,
            p: 0.05,
        };
        assert_eq!(
            SearchPlan::new(&ds, &params).unwrap_err(),
            Error::NoSignificantChange { p: 0.05 }
        );
    }
}
