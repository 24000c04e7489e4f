// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin call instruments.
//!
//! Recorded through the metrics-rs facade, so they reach whichever recorder
//! is installed (or nowhere, when none is).

use std::time::Instant;

use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const PLUGIN_CALLS: &str = "plugin_calls";
pub const PLUGIN_RESULTS: &str = "plugin_results";
pub const PLUGIN_DURATION: &str = "plugin_duration_seconds";

/// Registers the descriptions of the plugin instruments.
pub fn register_metrics() {
    describe_counter!(PLUGIN_CALLS, "Number of calls to a plugin action");
    describe_gauge!(PLUGIN_RESULTS, "Rows returned by the last call to a plugin action");
    describe_histogram!(PLUGIN_DURATION, "Duration of plugin calls in seconds");
}

/// Measures one plugin call.
///
/// `start` counts the call; `finish` records the result size and the elapsed
/// time, all labeled by plugin name and action.
pub struct CallTimer {
    plugin: String,
    action: String,
    started: Instant,
}

impl CallTimer {
    pub fn start(plugin: &str, action: &str) -> Self {
        metrics::counter!(
            PLUGIN_CALLS,
            "plugin_name" => plugin.to_string(),
            "plugin_action" => action.to_string()
        )
        .increment(1);
        Self {
            plugin: plugin.to_string(),
            action: action.to_string(),
            started: Instant::now(),
        }
    }

    pub fn finish(self, rows: usize) {
        let CallTimer {
            plugin,
            action,
            started,
        } = self;
        metrics::gauge!(
            PLUGIN_RESULTS,
            "plugin_name" => plugin.clone(),
            "plugin_action" => action.clone()
        )
        .set(rows as f64);
        metrics::histogram!(
            PLUGIN_DURATION,
            "plugin_name" => plugin,
            "plugin_action" => action
        )
        .record(started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn sample(rendered: &str, metric: &str, action: &str) -> Option<f64> {
        let prefix = format!("{metric}{{");
        let action = format!(r#"plugin_action="{action}""#);
        rendered
            .lines()
            .find(|line| line.starts_with(&prefix) && line.contains(&action))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }

    #[test]
    fn timer_records_all_three_instruments() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            CallTimer::start("mutable_table", "insert").finish(1);
            CallTimer::start("mutable_table", "generate").finish(7);
            CallTimer::start("mutable_table", "generate").finish(5);
        });

        let rendered = handle.render();
        assert_eq!(sample(&rendered, PLUGIN_CALLS, "generate"), Some(2.0));
        assert_eq!(sample(&rendered, PLUGIN_CALLS, "insert"), Some(1.0));
        assert_eq!(sample(&rendered, PLUGIN_RESULTS, "generate"), Some(5.0));
        assert!(rendered.contains(PLUGIN_DURATION));
        assert!(rendered.contains("# HELP plugin_calls"));
    }
}
