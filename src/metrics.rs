//! In-process metrics: latency histograms (p50/p95/p99) and event counters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// A span measuring elapsed time from creation to `finish`.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Record elapsed milliseconds and return them.
    pub fn finish(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.registry.record(self.name, elapsed_ms);
        elapsed_ms
    }
}

/// Fixed-capacity ring buffer of samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        let cap = self.samples.len();
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % cap;
        self.count = (self.count + 1).min(cap);
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_ring_capacity(1024)
    }

    pub fn with_ring_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// Record a latency sample (milliseconds).
    pub fn record(&self, name: &'static str, value_ms: f64) {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_ms);
        tracing::trace!(metric = name, value_ms, "metric_recorded");
    }

    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        self.histograms
            .lock()
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    pub fn summary(&self) -> MetricsSummary {
        let latencies = self
            .histograms
            .lock()
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    LatencySummary {
                        p50_ms: ring.percentile(50.0),
                        p95_ms: ring.percentile(95.0),
                        p99_ms: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect();
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(&name, &v)| (name.to_string(), v))
            .collect();
        MetricsSummary {
            latencies,
            counters,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub latencies: HashMap<String, LatencySummary>,
    pub counters: HashMap<String, u64>,
}

pub mod metric_names {
    pub const CACHE_HIT: &str = "cache_hit";
    pub const CACHE_MISS: &str = "cache_miss";
    pub const BACKEND_FAILURE: &str = "backend_failure";
    pub const TRANSLATE_DONE: &str = "t_translate_done";
}
