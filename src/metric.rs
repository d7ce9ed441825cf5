use std::collections::BTreeMap;

use serde::Serialize;

use crate::token::StrVal;

pub const DEFAULT_PERIOD_SECS: u32 = 300;

/// A CloudWatch metric that alarms or dashboards can be built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, StrVal>,
    pub statistic: String,
    pub period_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricOptions {
    /// defaults to whatever the metric's owner picks, usually Average.
    pub statistic: Option<String>,
    /// defaults to 5 minutes.
    pub period_secs: Option<u32>,
    pub region: Option<String>,
    pub account: Option<String>,
    pub label: Option<String>,
}

impl MetricOptions {
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_default_statistic(mut self, statistic: &str) -> Self {
        if self.statistic.is_none() {
            self.statistic = Some(statistic.to_string());
        }
        self
    }
}

impl Metric {
    pub fn new(namespace: &str, metric_name: &str, dimensions: BTreeMap<String, StrVal>, options: MetricOptions) -> Self {
        Self {
            namespace: namespace.to_string(),
            metric_name: metric_name.to_string(),
            dimensions,
            statistic: options.statistic.unwrap_or_else(|| "Average".to_string()),
            period_secs: options.period_secs.unwrap_or(DEFAULT_PERIOD_SECS),
            region: options.region,
            account: options.account,
            label: options.label,
        }
    }
}
