//! Built-in run presets

use crate::domains::phases::PhaseConfig;
use crate::domains::scenario::{RemovalMode, UsageConfig, WorkloadMode};
use crate::domains::StampedeConfig;
use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A named, ready-to-run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Queue-entry throughput at 5000 arrivals/s
    EntryScale,
    /// Full enter/poll/use/remove circulation
    #[default]
    Circulation,
    /// Queue admission followed by seat booking and payment
    EndToEnd,
    /// Token validation latency across stepped load levels
    ValidationBenchmark,
    /// A few seconds of circulation against localhost
    Smoke,
}

impl Preset {
    pub fn all() -> &'static [Preset] {
        &[
            Preset::EntryScale,
            Preset::Circulation,
            Preset::EndToEnd,
            Preset::ValidationBenchmark,
            Preset::Smoke,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::EntryScale => "entry-scale",
            Preset::Circulation => "circulation",
            Preset::EndToEnd => "e2e-circulation",
            Preset::ValidationBenchmark => "validation-benchmark",
            Preset::Smoke => "smoke",
        }
    }

    /// Build the full configuration for this preset
    pub fn config(&self) -> StampedeConfig {
        match self {
            Preset::EntryScale => entry_scale(),
            Preset::Circulation => circulation(),
            Preset::EndToEnd => end_to_end(),
            Preset::ValidationBenchmark => validation_benchmark(),
            Preset::Smoke => smoke(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Preset::all()
            .iter()
            .copied()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| {
                let known = Preset::all()
                    .iter()
                    .map(|preset| preset.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                ConfigError::UnknownPreset(s.to_string(), known)
            })
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn thresholds(rules: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    rules
        .iter()
        .map(|(metric, exprs)| {
            (
                metric.to_string(),
                exprs.iter().map(|expr| expr.to_string()).collect(),
            )
        })
        .collect()
}

fn entry_scale() -> StampedeConfig {
    let mut config = StampedeConfig::default();
    config.target.concert_id = "concert-1".to_string();
    config.scenario.mode = WorkloadMode::EntryOnly;
    config.scenario.usage = None;
    config.scenario.think_time = Duration::from_millis(100);
    config.phases = vec![
        PhaseConfig::new("warmup", 1000, secs(10), 500, 1000),
        PhaseConfig::new("peak_load", 5000, secs(60), 2000, 3000).starting_at(secs(10)),
    ];
    config.thresholds = thresholds(&[
        ("http_req_duration", &["p(95)<200", "p(99)<500"]),
        ("http_req_failed", &["rate<0.05"]),
        ("queue_entry_success_rate", &["rate>0.95"]),
    ]);
    config
}

fn circulation() -> StampedeConfig {
    let mut config = StampedeConfig::default();
    config.scenario.mode = WorkloadMode::Circulation;
    config.scenario.polling.max_polls = 300;
    config.scenario.polling.interval = secs(1);
    config.scenario.usage = Some(UsageConfig {
        min: secs(5),
        max: secs(30),
    });
    config.scenario.removal = RemovalMode::Explicit;
    config.phases = vec![
        PhaseConfig::new("warmup", 1000, secs(10), 5000, 15000).with_graceful_stop(secs(15 * 60)),
        PhaseConfig::new("peak_load", 5000, secs(60), 15000, 50000)
            .starting_at(secs(10))
            .with_graceful_stop(secs(15 * 60)),
    ];
    config.thresholds = thresholds(&[
        ("http_req_duration{step:enter}", &["p(95)<200"]),
        ("http_req_duration{step:poll}", &["p(95)<100"]),
        ("http_req_duration{step:remove}", &["p(95)<100"]),
        ("activation_wait_time", &["p(95)<360000"]),
        ("active_usage_time", &["avg>5000", "avg<30000"]),
        ("queue_removal_success", &["rate>0.99"]),
    ]);
    config
}

fn end_to_end() -> StampedeConfig {
    let mut config = StampedeConfig::default();
    config.scenario.mode = WorkloadMode::EndToEnd;
    config.scenario.polling.max_polls = 120;
    config.scenario.usage = None;
    config.scenario.removal = RemovalMode::OutOfBand;
    config.phases = vec![
        PhaseConfig::new("warmup", 100, secs(10), 500, 1000).with_graceful_stop(secs(5 * 60)),
        PhaseConfig::new("peak_load", 100, secs(60), 500, 1000)
            .starting_at(secs(10))
            .with_graceful_stop(secs(5 * 60)),
    ];
    config.thresholds = thresholds(&[
        ("http_req_duration{step:enter}", &["p(95)<200"]),
        ("http_req_duration{step:poll}", &["p(95)<100"]),
        ("http_req_duration{step:seats}", &["p(95)<500"]),
        ("http_req_duration{step:reserve}", &["p(95)<1000"]),
        ("http_req_duration{step:payment}", &["p(95)<2000"]),
        ("activation_wait_time", &["p(95)<120000"]),
        ("e2e_total_duration", &["p(95)<180000"]),
        ("booking_success_rate", &["rate>0.95"]),
    ]);
    config
}

fn validation_benchmark() -> StampedeConfig {
    let mut config = StampedeConfig::default();
    config.scenario.mode = WorkloadMode::Validation;
    config.scenario.usage = None;
    config.scenario.validation.token_pool_size = 1000;
    config.phases = vec![
        PhaseConfig::new("warmup", 100, secs(10), 50, 200),
        PhaseConfig::new("low_load", 100, secs(30), 50, 200).starting_at(secs(10)),
        PhaseConfig::new("medium_load", 500, secs(30), 200, 1000).starting_at(secs(40)),
        PhaseConfig::new("high_load", 1000, secs(30), 400, 2000).starting_at(secs(70)),
        PhaseConfig::new("peak_load", 2000, secs(30), 800, 3000).starting_at(secs(100)),
    ];
    config.thresholds = thresholds(&[
        ("http_req_duration", &["p(50)<50", "p(95)<100", "p(99)<200"]),
        ("http_req_failed", &["rate<0.01"]),
        ("http_req_duration{scenario:low_load}", &["p(95)<50"]),
        ("http_req_duration{scenario:medium_load}", &["p(95)<100"]),
        ("http_req_duration{scenario:high_load}", &["p(95)<200"]),
        ("http_req_duration{scenario:peak_load}", &["p(95)<500"]),
    ]);
    config
}

fn smoke() -> StampedeConfig {
    let mut config = StampedeConfig::default();
    config.target.queue_url = "http://localhost:8081".to_string();
    config.target.core_url = "http://localhost:8080".to_string();
    config.scenario.mode = WorkloadMode::Circulation;
    config.scenario.polling.max_polls = 30;
    config.scenario.usage = Some(UsageConfig {
        min: secs(1),
        max: secs(2),
    });
    config.phases = vec![PhaseConfig::new("smoke", 2, secs(5), 2, 10)];
    config.thresholds = thresholds(&[
        ("queue_entry_success_rate", &["rate>0.99"]),
        ("queue_removal_success", &["rate>0.99"]),
    ]);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_validates() {
        for preset in Preset::all() {
            let config = preset.config();
            assert!(
                config.validate_all().is_ok(),
                "preset {} failed validation: {:?}",
                preset,
                config.validate_all()
            );
        }
    }

    #[test]
    fn test_preset_round_trips_through_name() {
        for preset in Preset::all() {
            assert_eq!(preset.name().parse::<Preset>().unwrap(), *preset);
        }
        assert!(matches!(
            "nope".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(_, _))
        ));
    }

    #[test]
    fn test_circulation_preset_shape() {
        let config = Preset::Circulation.config();
        assert_eq!(config.phases.len(), 2);
        assert_eq!(config.phases[1].start_time, secs(10));
        assert_eq!(config.phases[1].max_vus, 50000);
        assert_eq!(
            config.thresholds.get("active_usage_time").unwrap(),
            &vec!["avg>5000".to_string(), "avg<30000".to_string()]
        );
    }

    #[test]
    fn test_end_to_end_preset_removes_out_of_band() {
        let config = Preset::EndToEnd.config();
        assert_eq!(config.scenario.mode, WorkloadMode::EndToEnd);
        assert_eq!(config.scenario.removal, RemovalMode::OutOfBand);
        assert_eq!(config.scenario.polling.max_polls, 120);
    }
}
