use std::time::Duration;

/// Stats of [`ApexTrainer`](crate::ApexTrainer)`::train()`.
#[derive(Clone, Debug)]
pub struct ApexTrainStat {
    /// Environment steps taken over all actors.
    pub env_steps: usize,

    /// Rounds of the actor pool.
    pub rounds: usize,

    /// Weight broadcasts to actors.
    pub syncs: usize,

    /// Number of actors excluded during training.
    pub excluded_actors: usize,

    /// Duration of training.
    pub duration: Duration,
}

impl ApexTrainStat {
    /// The number of environment steps per second.
    pub fn samples_per_sec(&self) -> f32 {
        let d = self.duration.as_secs_f32();
        if d > 0.0 {
            self.env_steps as f32 / d
        } else {
            0.0
        }
    }

    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "samples, rounds, syncs, excluded actors, samples/sec, duration\n".to_string();
        s += format!(
            "{}, {}, {}, {}, {}, {}\n",
            self.env_steps,
            self.rounds,
            self.syncs,
            self.excluded_actors,
            self.samples_per_sec(),
            self.duration.as_secs_f32()
        )
        .as_str();
        s
    }
}
