// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Latency and throughput summaries for benchmark samples.

/// Latency metrics with percentile distribution.
#[derive(Debug, Clone)]
pub struct LatencyMetrics {
    /// Minimum observed latency in nanoseconds
    pub min_ns: u64,
    /// Maximum observed latency in nanoseconds
    pub max_ns: u64,
    /// Arithmetic mean latency in nanoseconds
    pub mean_ns: f64,
    /// Median (p50) latency in nanoseconds
    pub median_ns: u64,
    /// 99th percentile latency in nanoseconds
    pub p99_ns: u64,
    /// 99.9th percentile latency in nanoseconds
    pub p999_ns: u64,
    /// Standard deviation in nanoseconds
    pub std_dev_ns: f64,
}

impl LatencyMetrics {
    /// Calculate metrics from a vector of latency samples (in nanoseconds).
    pub fn from_samples(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self {
                min_ns: 0,
                max_ns: 0,
                mean_ns: 0.0,
                median_ns: 0,
                p99_ns: 0,
                p999_ns: 0,
                std_dev_ns: 0.0,
            };
        }

        samples.sort_unstable();
        let len = samples.len();
        let percentile = |p: f64| samples[((len as f64 * p) as usize).min(len - 1)];

        let sum: u64 = samples.iter().sum();
        let mean_ns = sum as f64 / len as f64;
        let variance: f64 = samples
            .iter()
            .map(|&x| {
                let diff = x as f64 - mean_ns;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;

        Self {
            min_ns: samples[0],
            max_ns: samples[len - 1],
            mean_ns,
            median_ns: percentile(0.5),
            p99_ns: percentile(0.99),
            p999_ns: percentile(0.999),
            std_dev_ns: variance.sqrt(),
        }
    }

    /// Format latency in human-readable form (auto-selects ns/μs/ms).
    pub fn format_latency(ns: u64) -> String {
        if ns < 1_000 {
            format!("{}ns", ns)
        } else if ns < 1_000_000 {
            format!("{:.2}μs", ns as f64 / 1_000.0)
        } else if ns < 1_000_000_000 {
            format!("{:.2}ms", ns as f64 / 1_000_000.0)
        } else {
            format!("{:.2}s", ns as f64 / 1_000_000_000.0)
        }
    }

    /// One-line summary: `p50 / p99 / p99.9 / max`.
    pub fn summary(&self) -> String {
        format!(
            "p50 {} / p99 {} / p99.9 {} / max {}",
            Self::format_latency(self.median_ns),
            Self::format_latency(self.p99_ns),
            Self::format_latency(self.p999_ns),
            Self::format_latency(self.max_ns)
        )
    }
}

/// Throughput metrics for streaming benchmarks.
#[derive(Debug, Clone)]
pub struct ThroughputMetrics {
    /// Messages processed per second
    pub messages_per_sec: f64,
    /// Bytes processed per second
    pub bytes_per_sec: f64,
    /// Total messages processed
    pub total_messages: u64,
    /// Total bytes processed
    pub total_bytes: u64,
    /// Duration of the benchmark in nanoseconds
    pub duration_ns: u64,
}

impl ThroughputMetrics {
    /// Calculate throughput from message count, byte count, and duration.
    pub fn calculate(messages: u64, bytes: u64, duration_ns: u64) -> Self {
        let duration_secs = duration_ns.max(1) as f64 / 1_000_000_000.0;
        Self {
            messages_per_sec: messages as f64 / duration_secs,
            bytes_per_sec: bytes as f64 / duration_secs,
            total_messages: messages,
            total_bytes: bytes,
            duration_ns,
        }
    }

    /// Format throughput in human-readable form.
    pub fn format_bytes_per_sec(bps: f64) -> String {
        if bps < 1_000.0 {
            format!("{:.2} B/s", bps)
        } else if bps < 1_000_000.0 {
            format!("{:.2} KB/s", bps / 1_000.0)
        } else if bps < 1_000_000_000.0 {
            format!("{:.2} MB/s", bps / 1_000_000.0)
        } else {
            format!("{:.2} GB/s", bps / 1_000_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_metrics_from_samples() {
        let samples = vec![100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];
        let metrics = LatencyMetrics::from_samples(samples);

        assert_eq!(metrics.min_ns, 100);
        assert_eq!(metrics.max_ns, 1000);
        assert_eq!(metrics.median_ns, 600);
        assert_eq!(metrics.p999_ns, 1000);
        assert!((metrics.mean_ns - 550.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_samples() {
        let metrics = LatencyMetrics::from_samples(Vec::new());
        assert_eq!(metrics.max_ns, 0);
    }

    #[test]
    fn test_latency_format() {
        assert_eq!(LatencyMetrics::format_latency(500), "500ns");
        assert_eq!(LatencyMetrics::format_latency(1500), "1.50μs");
        assert_eq!(LatencyMetrics::format_latency(1_500_000), "1.50ms");
        assert_eq!(LatencyMetrics::format_latency(1_500_000_000), "1.50s");
    }

    #[test]
    fn test_throughput_calculation() {
        let metrics = ThroughputMetrics::calculate(1000, 1_000_000, 1_000_000_000);
        assert!((metrics.messages_per_sec - 1000.0).abs() < 0.01);
        assert!((metrics.bytes_per_sec - 1_000_000.0).abs() < 0.01);
        assert_eq!(
            ThroughputMetrics::format_bytes_per_sec(metrics.bytes_per_sec),
            "1.00 MB/s"
        );
    }
}
