// Metrics collection and tracking

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latency samples kept for percentiles
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    total_latency_ms: Arc<AtomicU64>,
    min_latency_ms: Arc<AtomicU64>,
    max_latency_ms: Arc<AtomicU64>,
    latency_samples: Arc<Mutex<VecDeque<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES))),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            if samples.len() == MAX_LATENCY_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(latency_ms);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count();
        if count == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn percentile(&self, p: u8) -> u64 {
        let Ok(samples) = self.latency_samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn snapshot(&self) -> EndpointStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: self.request_count(),
            error_count: self.error_count(),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Which path produced a synthesis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisPath {
    Realtime,
    NonStreaming,
}

/// Synthesis-specific metrics
#[derive(Debug, Clone, Default)]
pub struct SynthesisMetrics {
    realtime_count: Arc<AtomicU64>,
    non_streaming_count: Arc<AtomicU64>,
    total_synthesis_time_ms: Arc<AtomicU64>,
    total_audio_bytes: Arc<AtomicU64>,
}

impl SynthesisMetrics {
    pub fn record(&self, path: SynthesisPath, time_ms: u64, audio_bytes: usize) {
        let counter = match path {
            SynthesisPath::Realtime => &self.realtime_count,
            SynthesisPath::NonStreaming => &self.non_streaming_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_synthesis_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        self.total_audio_bytes.fetch_add(audio_bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SynthesisStats {
        let realtime_count = self.realtime_count.load(Ordering::Relaxed);
        let non_streaming_count = self.non_streaming_count.load(Ordering::Relaxed);
        let total = realtime_count + non_streaming_count;
        let total_time = self.total_synthesis_time_ms.load(Ordering::Relaxed);
        SynthesisStats {
            realtime_count,
            non_streaming_count,
            avg_synthesis_time_ms: if total == 0 { 0.0 } else { total_time as f64 / total as f64 },
            total_audio_bytes: self.total_audio_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Comprehensive metrics structure
#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub started_at: Instant,
    pub request_count: Arc<AtomicU64>,
    pub synthesize: EndpointMetrics,
    pub voice: EndpointMetrics,
    pub synthesis: SynthesisMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            request_count: Arc::new(AtomicU64::new(0)),
            synthesize: EndpointMetrics::new(),
            voice: EndpointMetrics::new(),
            synthesis: SynthesisMetrics::default(),
        }
    }

    pub fn count_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsResponse {
        MetricsResponse {
            timestamp: Utc::now(),
            system: self.system_metrics(),
            endpoints: EndpointMetricsResponse {
                synthesize: self.synthesize.snapshot(),
                voice: self.voice.snapshot(),
            },
            synthesis: self.synthesis.snapshot(),
        }
    }

    fn system_metrics(&self) -> SystemMetrics {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let memory_used = system.used_memory();
        let memory_total = system.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f64 / memory_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        // 1-minute load average
        let load = sysinfo::System::load_average().one;

        SystemMetrics {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count: self.request_count.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            system_load: (load > 0.0).then_some(load),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub synthesis: SynthesisStats,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub synthesize: EndpointStats,
    pub voice: EndpointStats,
}

#[derive(Debug, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SynthesisStats {
    pub realtime_count: u64,
    pub non_streaming_count: u64,
    pub avg_synthesis_time_ms: f64,
    pub total_audio_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_latency_stats() {
        let metrics = EndpointMetrics::new();
        for ms in [30, 10, 20] {
            metrics.record_request(ms);
        }
        metrics.record_error();

        let stats = metrics.snapshot();
        assert_eq!(stats.request_count, 3);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.min_latency_ms, 10);
        assert_eq!(stats.max_latency_ms, 30);
        assert_eq!(stats.avg_latency_ms, 20.0);
        assert_eq!(stats.p50_latency_ms, 20);
        assert_eq!(stats.p99_latency_ms, 30);
    }

    #[test]
    fn test_empty_endpoint_reports_zero() {
        let stats = EndpointMetrics::new().snapshot();
        assert_eq!(stats.min_latency_ms, 0);
        assert_eq!(stats.p95_latency_ms, 0);
        assert_eq!(stats.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let metrics = EndpointMetrics::new();
        for ms in 0..(MAX_LATENCY_SAMPLES as u64 + 500) {
            metrics.record_request(ms);
        }
        assert_eq!(metrics.latency_samples.lock().unwrap().len(), MAX_LATENCY_SAMPLES);
        // The oldest 500 samples were evicted.
        assert_eq!(metrics.percentile(0), 500);
    }

    #[test]
    fn test_synthesis_metrics_by_path() {
        let metrics = SynthesisMetrics::default();
        metrics.record(SynthesisPath::Realtime, 100, 4844);
        metrics.record(SynthesisPath::Realtime, 300, 1000);
        metrics.record(SynthesisPath::NonStreaming, 200, 156);

        let stats = metrics.snapshot();
        assert_eq!(stats.realtime_count, 2);
        assert_eq!(stats.non_streaming_count, 1);
        assert_eq!(stats.total_audio_bytes, 6000);
        assert_eq!(stats.avg_synthesis_time_ms, 200.0);
    }
}
