//! Response delays: per-pair delays declared on a response and global
//! delays keyed by URL pattern.

use super::SimulationError;
use crate::model::{GlobalActionsView, LogNormalParams, RequestDetails, ResponseView};
use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use regex::Regex;
use std::time::Duration;

impl LogNormalParams {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.max > 0 && self.min > self.max {
            return Err(SimulationError::InvalidDelay(format!(
                "Invalid log normal delay: min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        if self.median > self.mean {
            return Err(SimulationError::InvalidDelay(format!(
                "Invalid log normal delay: median ({}) is greater than mean ({})",
                self.median, self.mean
            )));
        }
        Ok(())
    }

    /// Draw a delay from the log-normal distribution described by the
    /// median and mean, clamped to `[min, max]` (`max = 0` is unbounded).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let median = self.median.max(1) as f64;
        let mean = (self.mean as f64).max(median);
        let mu = median.ln();
        let sigma = (2.0 * (mean.ln() - mu)).max(0.0).sqrt();

        let mut millis = match LogNormal::new(mu, sigma) {
            Ok(distribution) => distribution.sample(rng).round() as u64,
            Err(_) => median as u64,
        };
        millis = millis.max(self.min);
        if self.max > 0 {
            millis = millis.min(self.max);
        }
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone)]
enum DelayKind {
    Fixed(u64),
    LogNormal(LogNormalParams),
}

#[derive(Debug, Clone)]
struct GlobalDelay {
    pattern: Regex,
    http_method: String,
    kind: DelayKind,
}

impl GlobalDelay {
    fn applies_to(&self, request: &RequestDetails) -> bool {
        (self.http_method.is_empty() || self.http_method.eq_ignore_ascii_case(&request.method))
            && self
                .pattern
                .is_match(&format!("{}{}", request.destination, request.path))
    }
}

/// Compiled `globalActions` delays.
#[derive(Debug, Clone, Default)]
pub struct ResponseDelays {
    delays: Vec<GlobalDelay>,
}

impl ResponseDelays {
    pub fn compile(view: &GlobalActionsView) -> Result<Self, SimulationError> {
        let pattern = |raw: &str| {
            Regex::new(raw).map_err(|e| {
                SimulationError::InvalidDelay(format!("Invalid delay url pattern '{raw}': {e}"))
            })
        };

        let mut delays = Vec::new();
        for delay in &view.delays {
            delays.push(GlobalDelay {
                pattern: pattern(&delay.url_pattern)?,
                http_method: delay.http_method.clone(),
                kind: DelayKind::Fixed(delay.delay),
            });
        }
        for delay in &view.delays_log_normal {
            delay.params.validate()?;
            delays.push(GlobalDelay {
                pattern: pattern(&delay.url_pattern)?,
                http_method: delay.http_method.clone(),
                kind: DelayKind::LogNormal(delay.params),
            });
        }
        Ok(Self { delays })
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Delay to apply before serving `response` for `request`.
    ///
    /// A delay declared on the response wins over global delays; among
    /// global delays the first matching declaration applies.
    pub fn delay_for(&self, request: &RequestDetails, response: &ResponseView) -> Option<Duration> {
        if response.fixed_delay > 0 {
            return Some(Duration::from_millis(response.fixed_delay));
        }
        if let Some(params) = &response.log_normal_delay {
            return Some(params.sample(&mut rand::thread_rng()));
        }
        self.delays
            .iter()
            .find(|delay| delay.applies_to(request))
            .map(|delay| match &delay.kind {
                DelayKind::Fixed(millis) => Duration::from_millis(*millis),
                DelayKind::LogNormal(params) => params.sample(&mut rand::thread_rng()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DelayView, LogNormalDelayView};

    fn request(path: &str, method: &str) -> RequestDetails {
        RequestDetails {
            path: path.to_string(),
            method: method.to_string(),
            destination: "api.test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_log_normal_validation() {
        let ok = LogNormalParams { min: 10, max: 100, mean: 50, median: 40 };
        assert!(ok.validate().is_ok());
        let inverted = LogNormalParams { min: 100, max: 10, mean: 50, median: 40 };
        assert!(inverted.validate().is_err());
        let skewed = LogNormalParams { min: 0, max: 0, mean: 10, median: 40 };
        assert!(skewed.validate().is_err());
    }

    #[test]
    fn test_log_normal_sample_is_clamped() {
        let params = LogNormalParams { min: 20, max: 30, mean: 1000, median: 500 };
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let millis = params.sample(&mut rng).as_millis() as u64;
            assert!((20..=30).contains(&millis), "{millis}");
        }
    }

    #[test]
    fn test_log_normal_without_spread_returns_median() {
        let params = LogNormalParams { min: 0, max: 0, mean: 250, median: 250 };
        let mut rng = rand::thread_rng();
        assert_eq!(params.sample(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn test_response_delay_wins_over_global() {
        let delays = ResponseDelays::compile(&GlobalActionsView {
            delays: vec![DelayView {
                url_pattern: ".*".to_string(),
                delay: 500,
                http_method: String::new(),
            }],
            delays_log_normal: vec![],
        })
        .unwrap();
        let response = ResponseView { fixed_delay: 10, ..Default::default() };
        assert_eq!(
            delays.delay_for(&request("/", "GET"), &response),
            Some(Duration::from_millis(10))
        );
        assert_eq!(
            delays.delay_for(&request("/", "GET"), &ResponseView::default()),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_global_delay_filters_by_pattern_and_method() {
        let delays = ResponseDelays::compile(&GlobalActionsView {
            delays: vec![DelayView {
                url_pattern: "api\\.test/slow".to_string(),
                delay: 100,
                http_method: "POST".to_string(),
            }],
            delays_log_normal: vec![],
        })
        .unwrap();
        let none = ResponseView::default();
        assert!(delays.delay_for(&request("/slow", "POST"), &none).is_some());
        assert!(delays.delay_for(&request("/slow", "GET"), &none).is_none());
        assert!(delays.delay_for(&request("/fast", "POST"), &none).is_none());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = ResponseDelays::compile(&GlobalActionsView {
            delays: vec![],
            delays_log_normal: vec![LogNormalDelayView {
                url_pattern: "(".to_string(),
                http_method: String::new(),
                params: LogNormalParams { min: 1, max: 2, mean: 2, median: 1 },
            }],
        });
        assert!(matches!(result, Err(SimulationError::InvalidDelay(_))));
    }
}
