use anyhow::Result;
use apex_core::{
    aggregator::{AggregatorConfig, TransitionAggregator},
    error::ApexError,
    replay_buffer::{PerConfig, ReplayBuffer, ReplayBufferConfig},
    Rollout, Transition,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_log::test;

const CAPACITY: usize = 1000;
const BATCH_SIZE: usize = 32;
const EPISODE_LEN: usize = 25;

fn unit_reward_transitions(stream: usize, n: usize) -> Vec<Transition<Vec<f32>, usize>> {
    (0..n)
        .map(|t| {
            let pos = t % EPISODE_LEN;
            Transition::new(
                vec![stream as f32, pos as f32],
                t % 2,
                1.0,
                vec![stream as f32, (pos + 1) as f32],
                pos + 1 == EPISODE_LEN,
            )
        })
        .collect()
}

#[test]
fn windows_flow_from_actors_into_prioritized_batches() -> Result<()> {
    let mut aggregator = TransitionAggregator::build(&AggregatorConfig::default().n_step(4))?;
    let mut buffer = ReplayBuffer::build(
        &ReplayBufferConfig::default().capacity(CAPACITY).per_config(Some(
            PerConfig::default()
                .alpha(0.6)
                .beta_0(0.4)
                .explore_step(2000),
        )),
    )?;
    let mut rng = StdRng::seed_from_u64(0);

    // Two actors, 1000 transitions each, delivered in rounds of 50 steps.
    let streams: Vec<_> = (0..2).map(|s| unit_reward_transitions(s, 1000)).collect();
    let mut env_step = 0;
    for round in 0..20 {
        let rollouts = streams
            .iter()
            .enumerate()
            .map(|(s, trs)| Rollout::new(s, trs[round * 50..(round + 1) * 50].to_vec()))
            .collect::<Vec<_>>();
        env_step += rollouts.iter().map(|r| r.env_steps()).sum::<usize>();

        for window in aggregator.process(rollouts) {
            assert!(window.len() <= 4);
            assert_eq!(window.state[0], window.next_state[0]);
            buffer.store(window);

            if buffer.len() < BATCH_SIZE {
                continue;
            }
            let beta = buffer.beta(env_step);
            let batch = match buffer.batch(BATCH_SIZE, beta) {
                Ok(batch) => batch,
                Err(ApexError::InsufficientData { .. }) => {
                    panic!("batch failed with {} live windows", buffer.len())
                }
                Err(e) => return Err(e.into()),
            };
            assert_eq!(batch.len(), BATCH_SIZE);
            assert_eq!(batch.weights.len(), BATCH_SIZE);
            assert!(batch.weights.iter().all(|w| w.is_finite() && *w <= 1.0));

            for ix in batch.ixs.iter() {
                let td: f32 = rng.gen_range(0.0..3.0);
                let p = buffer.priority_from_td_error(td);
                buffer.update_priority(ix, p)?;
            }
        }
    }

    assert_eq!(env_step, 2000);
    assert_eq!(buffer.len(), CAPACITY);
    assert!((buffer.beta(env_step) - 1.0).abs() < 1e-6);
    Ok(())
}
