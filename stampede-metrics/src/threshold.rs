//! Threshold expressions and their evaluation against a snapshot
//!
//! Rules are declared as `"<metric>[{tag:value,...}]": ["<stat><op><bound>", ...]`,
//! e.g. `"http_req_duration{step:enter}": ["p(95)<200"]`.

use crate::error::ThresholdParseError;
use crate::kind::MetricKind;
use crate::snapshot::{MetricsSnapshot, SeriesStats};
use crate::tags::Tags;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

static SELECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(?:\{([^{}]*)\})?\s*$")
        .expect("selector pattern compiles")
});

static EXPRESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(p\(\s*[^)]*\)|[a-z]+)\s*(<=|>=|==|!=|<|>)\s*(\S+)\s*$")
        .expect("expression pattern compiles")
});

/// Metric name plus an optional tag filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricSelector {
    pub name: String,
    pub filter: Tags,
}

impl MetricSelector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key, value);
        self
    }
}

impl FromStr for MetricSelector {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = SELECTOR_RE
            .captures(s)
            .ok_or_else(|| ThresholdParseError::InvalidSelector(s.to_string()))?;

        let mut selector = MetricSelector::new(&captures[1]);
        if let Some(filters) = captures.get(2) {
            for filter in filters.as_str().split(',').map(str::trim).filter(|f| !f.is_empty()) {
                let (key, value) = filter
                    .split_once(':')
                    .map(|(k, v)| (k.trim(), v.trim()))
                    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                    .ok_or_else(|| ThresholdParseError::InvalidTagFilter {
                        selector: s.to_string(),
                        filter: filter.to_string(),
                    })?;
                selector.filter.insert(key, value);
            }
        }
        Ok(selector)
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.filter)
    }
}

/// Aggregate a rule compares against its bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    /// `p(N)` with N in 0..=100
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
}

impl FromStr for Statistic {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("p(").and_then(|rest| rest.strip_suffix(')')) {
            let p: f64 = inner
                .trim()
                .parse()
                .map_err(|_| ThresholdParseError::InvalidPercentile(inner.to_string()))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(ThresholdParseError::InvalidPercentile(inner.to_string()));
            }
            return Ok(Statistic::Percentile(p));
        }
        match s {
            "avg" => Ok(Statistic::Avg),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "med" => Ok(Statistic::Med),
            "count" => Ok(Statistic::Count),
            "rate" => Ok(Statistic::Rate),
            other => Err(ThresholdParseError::UnknownStatistic(other.to_string())),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Percentile(p) => write!(f, "p({})", p),
            Statistic::Avg => f.write_str("avg"),
            Statistic::Min => f.write_str("min"),
            Statistic::Max => f.write_str("max"),
            Statistic::Med => f.write_str("med"),
            Statistic::Count => f.write_str("count"),
            Statistic::Rate => f.write_str("rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

impl FromStr for Comparison {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparison::Lt),
            "<=" => Ok(Comparison::Le),
            ">" => Ok(Comparison::Gt),
            ">=" => Ok(Comparison::Ge),
            "==" => Ok(Comparison::Eq),
            "!=" => Ok(Comparison::Ne),
            other => Err(ThresholdParseError::InvalidExpression(other.to_string())),
        }
    }
}

/// One parsed `<stat><op><bound>` check bound to a selector
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub selector: MetricSelector,
    pub statistic: Statistic,
    pub comparison: Comparison,
    pub bound: f64,
    /// Expression as declared
    pub expression: String,
}

impl ThresholdRule {
    pub fn parse(selector: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let selector: MetricSelector = selector.parse()?;
        let captures = EXPRESSION_RE
            .captures(expression)
            .ok_or_else(|| ThresholdParseError::InvalidExpression(expression.to_string()))?;

        let statistic: Statistic = captures[1].parse()?;
        let comparison: Comparison = captures[2].parse()?;
        let bound: f64 = captures[3]
            .parse()
            .ok()
            .filter(|b: &f64| b.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidBound(captures[3].to_string()))?;

        Ok(Self {
            selector,
            statistic,
            comparison,
            bound,
            expression: expression.trim().to_string(),
        })
    }

    /// Evaluate against a snapshot; never mutates anything
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let observed = match snapshot.select(&self.selector) {
            Some(stats) => observe(&stats, self.statistic),
            None => match snapshot.kind_of(&self.selector.name) {
                Some(MetricKind::Counter) => observe(&SeriesStats::Counter { value: 0.0 }, self.statistic),
                _ => Err("no samples".to_string()),
            },
        };

        match observed {
            Ok(value) => {
                let passed = self.comparison.holds(value, self.bound);
                ThresholdOutcome {
                    metric: self.selector.to_string(),
                    expression: self.expression.clone(),
                    observed: Some(value),
                    passed,
                    failure: (!passed).then(|| {
                        format!("observed {} {} {} does not hold", value, self.comparison.as_str(), self.bound)
                    }),
                }
            }
            Err(reason) => ThresholdOutcome {
                metric: self.selector.to_string(),
                expression: self.expression.clone(),
                observed: None,
                passed: false,
                failure: Some(reason),
            },
        }
    }
}

fn observe(stats: &SeriesStats, statistic: Statistic) -> Result<f64, String> {
    let incompatible = || format!("statistic '{}' does not apply to a {} metric", statistic, stats.kind());
    let no_samples = || "no samples".to_string();

    match stats {
        SeriesStats::Counter { value } => match statistic {
            Statistic::Count => Ok(*value),
            _ => Err(incompatible()),
        },
        SeriesStats::Rate(rate) => match statistic {
            Statistic::Rate => rate.rate().ok_or_else(no_samples),
            Statistic::Count if rate.total > 0 => Ok(rate.total as f64),
            Statistic::Count => Err(no_samples()),
            _ => Err(incompatible()),
        },
        SeriesStats::Distribution(dist) => {
            let value = match statistic {
                Statistic::Percentile(p) => dist.percentile(p),
                Statistic::Avg => dist.mean(),
                Statistic::Min => dist.min,
                Statistic::Max => dist.max,
                Statistic::Med => dist.median(),
                Statistic::Count => (dist.count > 0).then_some(dist.count as f64),
                Statistic::Rate => return Err(incompatible()),
            };
            value.ok_or_else(no_samples)
        }
    }
}

/// Result of one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
    pub failure: Option<String>,
}

/// All rules of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    rules: Vec<ThresholdRule>,
}

impl ThresholdSet {
    /// Parse a `selector -> [expressions]` map as found in configuration
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Result<Self, ThresholdParseError> {
        let mut rules = Vec::new();
        for (selector, expressions) in map {
            for expression in expressions {
                rules.push(ThresholdRule::parse(selector, expression)?);
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<ThresholdOutcome> {
        evaluate(&self.rules, snapshot)
    }
}

pub fn evaluate(rules: &[ThresholdRule], snapshot: &MetricsSnapshot) -> Vec<ThresholdOutcome> {
    rules.iter().map(|rule| rule.evaluate(snapshot)).collect()
}
