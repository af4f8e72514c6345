use std::time::Duration;

/// Stats of the loop in an [`Actor`](crate::Actor).
#[derive(Clone, Debug, Default)]
pub struct ActorStat {
    /// Actor index.
    pub id: usize,

    /// The number of steps for interaction between agent and env.
    pub env_steps: usize,

    /// The number of finished episodes.
    pub episodes: usize,

    /// Mean score of the finished episodes.
    pub mean_score: f32,

    /// Duration of the loop in [`Actor`](crate::Actor).
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`ActorStat`] for reporting.
pub fn actor_stats_fmt(stats: &[ActorStat]) -> String {
    let mut s = "actor id, samples, episodes, mean score, duration [sec], samples per sec\n".to_string();
    for stat in stats.iter() {
        let n = stat.env_steps;
        let d = stat.duration.as_secs_f32();
        let p = if d > 0.0 { n as f32 / d } else { 0.0 };
        s += format!(
            "{}, {}, {}, {}, {}, {}\n",
            stat.id, n, stat.episodes, stat.mean_score, d, p
        )
        .as_str();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_a_row_per_actor() {
        let stats = vec![
            ActorStat {
                id: 0,
                env_steps: 10,
                episodes: 2,
                mean_score: 5.0,
                duration: Duration::from_secs(2),
            },
            ActorStat {
                id: 3,
                ..Default::default()
            },
        ];
        let s = actor_stats_fmt(&stats);
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "0, 10, 2, 5, 2, 5");
        assert!(lines[2].starts_with("3, 0, 0"));
    }
}
