
use phylorder::distance::oracle_for;
use phylorder::median::{solver_for, total_cost, validate_labeling};
use phylorder::{ChromosomeMode, EngineConfig, Genome, MedianStrategy, Metric, PenaltyPolicy};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use synthetic_genomes::*;

fn configs() -> Vec<EngineConfig> {
    let uni = ChromosomeMode::Unichromosomal;
    let multi = ChromosomeMode::Multichromosomal;
    vec![
        EngineConfig::new(Metric::Reversal, uni),
        EngineConfig::new(Metric::Reversal, uni).with_strategy(MedianStrategy::Consensus),
        EngineConfig::new(Metric::Reversal, uni).with_strategy(MedianStrategy::Alternative),
        EngineConfig::new(Metric::Dcj, uni),
        EngineConfig::new(Metric::Dcj, multi).with_penalty(PenaltyPolicy::MultipleCircular),
        EngineConfig::new(Metric::Dcj, multi).with_strategy(MedianStrategy::Consensus),
        EngineConfig::new(Metric::Dcj, multi)
            .with_strategy(MedianStrategy::Alternative)
            .with_penalty(PenaltyPolicy::MixedLinearCircular),
    ]
}

fn inputs_for(config: &EngineConfig, n: usize, rng: &mut StdRng) -> [Genome; 3] {
    let ancestor = match config.mode {
        ChromosomeMode::Unichromosomal => random_linear(n, rng),
        ChromosomeMode::Multichromosomal => random_multichromosomal(n, 3, rng),
    };
    [0; 3].map(|_| match config.mode {
        ChromosomeMode::Unichromosomal => invert(&ancestor, 2, rng),
        ChromosomeMode::Multichromosomal => dcj_shuffle(&ancestor, 2, rng),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: the median costs no more than the best input
    #[test]
    fn prop_median_not_worse_than_inputs(seed in any::<u64>(), n in 3usize..8) {
        for config in configs() {
            let mut rng = StdRng::seed_from_u64(seed);
            let [a, b, c] = inputs_for(&config, n, &mut rng);
            let inputs = [&a, &b, &c];
            let oracle = oracle_for(&config);
            let outcome = solver_for(&config).median(inputs, &mut rng).unwrap();
            validate_labeling(&outcome.genome, n, config.mode).unwrap();

            let got = total_cost(&outcome.genome, &inputs, oracle.as_ref()).unwrap();
            let best = inputs
                .iter()
                .map(|g| total_cost(g, &inputs, oracle.as_ref()).unwrap())
                .min()
                .unwrap();
            prop_assert!(got <= best, "{} median {} > best input {}", config.strategy, got, best);
        }
    }

    /// Property: the same seed gives the same median
    #[test]
    fn prop_median_is_deterministic(seed in any::<u64>(), n in 3usize..8) {
        for config in configs() {
            let mut rng = StdRng::seed_from_u64(seed);
            let [a, b, c] = inputs_for(&config, n, &mut rng);
            let solver = solver_for(&config);
            let first = solver.median([&a, &b, &c], &mut StdRng::seed_from_u64(seed)).unwrap();
            let second = solver.median([&a, &b, &c], &mut StdRng::seed_from_u64(seed)).unwrap();
            prop_assert_eq!(first.genome, second.genome);
        }
    }
}
