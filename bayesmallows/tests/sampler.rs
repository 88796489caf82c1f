use std::sync::Arc;

use bayesmallows::cardinality::summation_distances;
use bayesmallows::importance::fit_from_importance_sampling;
use bayesmallows::mcmc::augment::FnImputer;
use bayesmallows::ranking::{identity, validate_permutation};
use bayesmallows::{
    AlphaProposal, Error, ImportanceSamplingConfig, MallowsSampler, Metric,
    PartitionFunctionSource, RankingMatrix, SamplerConfig, StopFlag, run_sampler,
};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rv::misc::linspace;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn exact(n: usize, metric: Metric) -> Arc<PartitionFunctionSource> {
    Arc::new(PartitionFunctionSource::Exact(
        summation_distances(n, None, metric).unwrap(),
    ))
}

fn noisy_rankings(n_assessors: usize, n: usize, rng: &mut SmallRng) -> Vec<Vec<usize>> {
    // Identity with two random adjacent swaps per assessor.
    (0..n_assessors)
        .map(|_| {
            let mut ranking = identity(n);
            for _ in 0..2 {
                let i = rng.random_range(0..n - 1);
                let (a, b) = (ranking[i], ranking[i + 1]);
                ranking[i] = b;
                ranking[i + 1] = a;
            }
            ranking
        })
        .collect()
}

#[test]
fn chain_has_one_entry_per_iteration() {
    init_tracing();
    let mut rng = SmallRng::seed_from_u64(0xC4A1);
    let data = RankingMatrix::from_complete(noisy_rankings(10, 6, &mut rng)).unwrap();
    let config = SamplerConfig {
        n_iterations: 500,
        ..SamplerConfig::default()
    };
    let chain = MallowsSampler::new(data, exact(6, Metric::Footrule), config)
        .unwrap()
        .run(&mut rng)
        .unwrap();

    assert_eq!(chain.rho_chain.len(), 500);
    assert_eq!(chain.alpha_chain.len(), 500);
    assert!(!chain.cancelled);
    for rho in &chain.rho_chain {
        validate_permutation(rho).unwrap();
    }
    assert!(chain.alpha_chain.iter().all(|a| a.is_finite() && *a >= 0.0));
}

#[test]
fn single_assessor_is_the_modal_consensus() {
    init_tracing();
    let data = RankingMatrix::from_complete(vec![vec![1, 2, 3, 4, 5]]).unwrap();
    let table = summation_distances(5, None, Metric::Footrule).unwrap();
    let chain = run_sampler(
        data,
        200,
        Some(table),
        None,
        "footrule",
        2,
        0.5,
        1.0,
        1,
        0.1,
        &mut SmallRng::seed_from_u64(0x5111),
    )
    .unwrap();

    assert_eq!(chain.len(), 200);
    assert_eq!(chain.modal_rho(0), Some(vec![1, 2, 3, 4, 5]));
    let means = chain.posterior_mean_rank(50).unwrap();
    assert!(
        means.windows(2).all(|pair| pair[0] < pair[1]),
        "posterior mean ranks {means:?}"
    );
}

#[test]
fn stopping_returns_a_partial_chain() {
    let data = RankingMatrix::from_complete(vec![vec![2, 1, 3, 4], vec![1, 2, 4, 3]]).unwrap();
    let stop = StopFlag::new();
    let mut sampler = MallowsSampler::new(data, exact(4, Metric::Spearman), SamplerConfig {
        metric: Metric::Spearman,
        ..SamplerConfig::default()
    })
    .unwrap()
    .with_stop_flag(stop.clone());

    let chain = sampler
        .run_with_progress(&mut SmallRng::seed_from_u64(9), |info| {
            if info.iteration == 50 {
                stop.stop();
            }
        })
        .unwrap();

    assert!(chain.cancelled);
    assert_eq!(chain.len(), 50);
    assert_eq!(chain.alpha_chain.len(), 50);
}

#[test]
fn partial_rankings_are_completed_each_iteration() {
    init_tracing();
    let rows = vec![
        vec![Some(1), None, Some(3), None, Some(5)],
        vec![Some(2), Some(1), None, None, None],
        vec![Some(1), Some(2), Some(3), Some(4), Some(5)],
    ];
    let data = RankingMatrix::from_partial(rows).unwrap();
    let mut calls = 0;
    let imputer = FnImputer(
        |partial: &[Option<usize>], current: &[usize], _rho: &[usize], _alpha: f64, rng: &mut dyn RngCore| {
            calls += 1;
            let mut free: Vec<usize> = partial
                .iter()
                .zip(current)
                .filter_map(|(p, &c)| p.is_none().then_some(c))
                .collect();
            free.shuffle(rng);
            let mut free = free.into_iter();
            partial
                .iter()
                .map(|p| p.unwrap_or_else(|| free.next().unwrap()))
                .collect()
        },
    );

    let config = SamplerConfig {
        n_iterations: 120,
        metric: Metric::Kendall,
        ..SamplerConfig::default()
    };
    let source = Arc::new(PartitionFunctionSource::closed_form(5, Metric::Kendall).unwrap());
    let chain = MallowsSampler::new(data, source, config)
        .unwrap()
        .with_imputer(imputer)
        .run(&mut SmallRng::seed_from_u64(0xAB))
        .unwrap();

    assert_eq!(chain.len(), 120);
    // Two partial rows imputed per iteration.
    assert_eq!(calls, 240);
}

#[test]
fn invalid_completions_are_ignored() {
    let data = RankingMatrix::from_partial(vec![vec![Some(1), None, None]]).unwrap();
    let config = SamplerConfig {
        n_iterations: 30,
        ..SamplerConfig::default()
    };
    let chain = MallowsSampler::new(data, exact(3, Metric::Footrule), config)
        .unwrap()
        .with_imputer(FnImputer(
            |_: &[Option<usize>], _: &[usize], _: &[usize], _: f64, _: &mut dyn RngCore| vec![2, 2, 2],
        ))
        .run(&mut SmallRng::seed_from_u64(1))
        .unwrap();
    assert_eq!(chain.len(), 30);
}

#[test]
fn fitted_partition_function_drives_the_sampler() {
    let mut rng = SmallRng::seed_from_u64(0xF17);
    let fit = fit_from_importance_sampling(
        5,
        Metric::Footrule,
        &ImportanceSamplingConfig {
            alpha_grid: linspace(0.0, 10.0, 21),
            mc_samples: 2_000,
            degree: 6,
        },
        &mut rng,
    )
    .unwrap();
    let data = RankingMatrix::from_complete(noisy_rankings(8, 5, &mut rng)).unwrap();

    let chain = run_sampler(
        data, 300, None, Some(fit), "footrule", 1, 0.2, 1.0, 2, 0.1, &mut rng,
    )
    .unwrap();
    assert_eq!(chain.len(), 300);
    assert_eq!(chain.alpha_acceptance.proposed, 150);
    let rate = chain.rho_acceptance_rate();
    assert!(rate > 0.0 && rate < 1.0, "rho acceptance {rate}");
}

#[test]
fn log_normal_proposal_keeps_alpha_positive() {
    let mut rng = SmallRng::seed_from_u64(0x1065);
    let data = RankingMatrix::from_complete(noisy_rankings(5, 6, &mut rng)).unwrap();
    let config = SamplerConfig {
        n_iterations: 400,
        metric: Metric::Cayley,
        alpha_proposal: AlphaProposal::LogNormal,
        alpha_proposal_sd: 0.3,
        ..SamplerConfig::default()
    };
    let source = Arc::new(PartitionFunctionSource::closed_form(6, Metric::Cayley).unwrap());
    let chain = MallowsSampler::new(data, source, config)
        .unwrap()
        .run(&mut rng)
        .unwrap();
    assert!(chain.alpha_chain.iter().all(|a| *a > 0.0));
    assert!(chain.posterior_mean_alpha(100).is_some());
}

#[test]
fn setup_errors_precede_sampling() {
    let data = RankingMatrix::from_complete(vec![vec![1, 2, 3]]).unwrap();
    let mut rng = SmallRng::seed_from_u64(0);
    let table = summation_distances(4, None, Metric::Footrule).unwrap();

    assert!(matches!(
        run_sampler(data.clone(), 10, Some(table), None, "footrule", 1, 0.1, 1.0, 1, 0.1, &mut rng),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        run_sampler(data.clone(), 10, None, None, "kendall", 1, 0.1, 1.0, 1, 0.1, &mut rng),
        Err(Error::MissingConfiguration(_))
    ));
    let table = summation_distances(3, None, Metric::Footrule).unwrap();
    assert!(matches!(
        run_sampler(data, 10, Some(table), None, "footrule", 0, 0.1, 1.0, 1, 0.1, &mut rng),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn chains_are_reproducible() {
    let run = || {
        let data = RankingMatrix::from_complete(vec![vec![3, 1, 2, 4], vec![1, 3, 2, 4]]).unwrap();
        let config = SamplerConfig {
            n_iterations: 100,
            metric: Metric::Kendall,
            ..SamplerConfig::default()
        };
        MallowsSampler::new(data, exact(4, Metric::Kendall), config)
            .unwrap()
            .run(&mut SmallRng::seed_from_u64(0x2E9))
            .unwrap()
    };
    assert_eq!(run(), run());
}
