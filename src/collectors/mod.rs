pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;
pub mod process;

use crate::platform::ProbePlan;
use crate::types::{Analysis, PerformanceTier, SystemOverview};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

use cpu::CpuCollector;
use disk::DiskCollector;
use gpu::GpuCollector;
use memory::MemoryCollector;
use network::NetworkCollector;
use process::{ProcessCollector, SortKey};

/// Hard failure of a basic collection pass. Detailed enrichment never
/// produces this: a broken detail path degrades to the basic record.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{domain} baseline collection failed: {reason}")]
    Basic { domain: &'static str, reason: String },
}

impl CollectError {
    pub fn basic(domain: &'static str, reason: impl Into<String>) -> Self {
        Self::Basic {
            domain,
            reason: reason.into(),
        }
    }
}

/// Window between two counter refreshes when a rate needs to be derived
/// from a pair of samples (cpu usage, interface throughput).
pub(crate) const SAMPLE_WINDOW: Duration = Duration::from_millis(200);

pub(crate) const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
pub(crate) const MIB: f64 = 1024.0 * 1024.0;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / GIB)
}

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern"));

/// First numeric token in a piece of probe output, if any. Callers decide
/// whether a miss means zero (required field) or absent (optional field).
pub(crate) fn first_number(text: &str) -> Option<f64> {
    NUMBER.find(text).and_then(|m| m.as_str().parse().ok())
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// One collector per telemetry domain, all sharing the host's probe plan.
pub struct SystemMonitor {
    cpu: CpuCollector,
    memory: MemoryCollector,
    gpu: GpuCollector,
    network: NetworkCollector,
    disk: DiskCollector,
    process: ProcessCollector,
}

impl SystemMonitor {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self {
            cpu: CpuCollector::new(plan.clone()),
            memory: MemoryCollector::new(plan.clone()),
            gpu: GpuCollector::new(plan.clone()),
            network: NetworkCollector::new(plan.clone()),
            disk: DiskCollector::new(),
            process: ProcessCollector::new(plan),
        }
    }

    pub fn cpu(&self) -> &CpuCollector {
        &self.cpu
    }

    pub fn memory(&self) -> &MemoryCollector {
        &self.memory
    }

    pub fn gpu(&self) -> &GpuCollector {
        &self.gpu
    }

    pub fn network(&self) -> &NetworkCollector {
        &self.network
    }

    pub fn disk(&self) -> &DiskCollector {
        &self.disk
    }

    pub fn process(&self) -> &ProcessCollector {
        &self.process
    }

    /// Collects every basic record concurrently. A single failing domain
    /// fails the whole overview, since a partial overview would silently
    /// misrepresent the host.
    pub async fn overview(&self, include_analysis: bool) -> Result<SystemOverview, CollectError> {
        let started = Instant::now();
        let (cpu, memory, gpu, network, disk, processes) = tokio::try_join!(
            self.cpu.status(),
            self.memory.status(),
            self.gpu.status(),
            self.network.status(),
            self.disk.status(),
            self.process.list(SortKey::Cpu, 10),
        )?;

        let mut overview = SystemOverview {
            timestamp: now_millis(),
            cpu,
            memory,
            gpu,
            network,
            disk,
            processes,
            analysis: None,
        };
        if include_analysis {
            overview.analysis = Some(analyze_performance(&overview));
        }

        debug!(
            cpu_usage = overview.cpu.usage,
            memory_usage = overview.memory.usage_percent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "system overview collected"
        );
        Ok(overview)
    }
}

/// Pure reduction of an overview into a health score. The score starts at
/// 100 and each overloaded resource deducts a fixed amount.
pub fn analyze_performance(overview: &SystemOverview) -> Analysis {
    let mut bottlenecks = Vec::new();
    let mut recommendations = Vec::new();
    let mut score: i64 = 100;

    if overview.cpu.usage > 80.0 {
        bottlenecks.push("High CPU usage detected".to_string());
        recommendations.push("CPU usage is high. Check background processes.".to_string());
        score -= 20;
    } else if overview.cpu.usage > 60.0 {
        recommendations.push("Keep an eye on CPU usage.".to_string());
        score -= 10;
    }

    if overview.memory.usage_percent > 90.0 {
        bottlenecks.push("Critical memory usage".to_string());
        recommendations.push("Memory usage is critical. Close unused applications.".to_string());
        score -= 25;
    } else if overview.memory.usage_percent > 75.0 {
        bottlenecks.push("High memory usage".to_string());
        recommendations.push("Memory usage is high. Consider freeing memory.".to_string());
        score -= 15;
    }

    if let Some(gpu) = overview.gpu.controllers.first() {
        if gpu.utilization_gpu.is_some_and(|u| u > 90.0) {
            bottlenecks.push("High GPU usage".to_string());
            recommendations
                .push("GPU usage is high. Check graphics-intensive workloads.".to_string());
            score -= 15;
        }
    }

    for disk in &overview.disk.disks {
        if disk.usage_percent > 95.0 {
            bottlenecks.push(format!("Disk {} almost full", disk.device));
            recommendations.push(format!(
                "Disk {} is low on space. Clean up files.",
                disk.device
            ));
            score -= 20;
        } else if disk.usage_percent > 85.0 {
            recommendations.push(format!("Check free space on disk {}.", disk.device));
            score -= 10;
        }
    }

    let high_cpu: Vec<&str> = overview
        .processes
        .iter()
        .filter(|p| p.cpu > 20.0)
        .map(|p| p.name.as_str())
        .collect();
    if !high_cpu.is_empty() {
        recommendations.push(format!("High CPU processes: {}", high_cpu.join(", ")));
    }

    let performance = if score >= 90 {
        PerformanceTier::Excellent
    } else if score >= 75 {
        PerformanceTier::Good
    } else if score >= 60 {
        PerformanceTier::Moderate
    } else if score >= 40 {
        PerformanceTier::Poor
    } else {
        PerformanceTier::Critical
    };

    Analysis {
        performance,
        score,
        bottlenecks,
        recommendations,
        timestamp: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CpuStatus, DiskEntry, DiskStatus, GpuController, GpuStatus, MemoryStatus, NetworkStatus,
        ProcessInfo,
    };

    fn overview_with(cpu_usage: f64, memory_percent: f64, disk_percent: f64) -> SystemOverview {
        SystemOverview {
            timestamp: 0,
            cpu: CpuStatus {
                usage: cpu_usage,
                ..CpuStatus::default()
            },
            memory: MemoryStatus {
                usage_percent: memory_percent,
                ..MemoryStatus::default()
            },
            gpu: GpuStatus::default(),
            network: NetworkStatus::default(),
            disk: DiskStatus {
                disks: vec![DiskEntry {
                    device: "/dev/disk1".to_string(),
                    usage_percent: disk_percent,
                    ..DiskEntry::default()
                }],
                ..DiskStatus::default()
            },
            processes: Vec::new(),
            analysis: None,
        }
    }

    #[test]
    fn idle_host_scores_excellent() {
        let analysis = analyze_performance(&overview_with(5.0, 30.0, 40.0));
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.performance, PerformanceTier::Excellent);
        assert!(analysis.bottlenecks.is_empty());
    }

    #[test]
    fn overloaded_host_scores_critical() {
        // cpu 85 (-20), memory 92 (-25), disk 97 (-20) => 35
        let analysis = analyze_performance(&overview_with(85.0, 92.0, 97.0));
        assert_eq!(analysis.score, 35);
        assert_eq!(analysis.performance, PerformanceTier::Critical);
        assert_eq!(analysis.bottlenecks.len(), 3);
    }

    #[test]
    fn moderate_pressure_deducts_without_bottlenecks() {
        // cpu 65 (-10), disk 87 (-10) => 80, good
        let analysis = analyze_performance(&overview_with(65.0, 30.0, 87.0));
        assert_eq!(analysis.score, 80);
        assert_eq!(analysis.performance, PerformanceTier::Good);
        assert!(analysis.bottlenecks.is_empty());
        assert_eq!(analysis.recommendations.len(), 2);
    }

    #[test]
    fn busy_gpu_counts_against_the_score() {
        let mut overview = overview_with(5.0, 30.0, 40.0);
        overview.gpu = GpuStatus {
            controllers: vec![GpuController {
                model: "RTX 4090".to_string(),
                utilization_gpu: Some(95.0),
                ..GpuController::default()
            }],
        };
        let analysis = analyze_performance(&overview);
        assert_eq!(analysis.score, 85);
        assert!(analysis
            .bottlenecks
            .iter()
            .any(|b| b.contains("High GPU usage")));
    }

    #[test]
    fn hot_processes_are_named_in_recommendations() {
        let mut overview = overview_with(5.0, 30.0, 40.0);
        overview.processes = vec![
            ProcessInfo {
                pid: 1,
                name: "ffmpeg".to_string(),
                cpu: 85.0,
                ..ProcessInfo::default()
            },
            ProcessInfo {
                pid: 2,
                name: "idle_helper".to_string(),
                cpu: 0.2,
                ..ProcessInfo::default()
            },
        ];
        let analysis = analyze_performance(&overview);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("ffmpeg") && !r.contains("idle_helper")));
    }

    #[test]
    fn first_number_handles_garbage_and_decimals() {
        assert_eq!(first_number("Pages free: 31854."), Some(31854.0));
        assert_eq!(first_number("GPU die temperature: 48.2 C"), Some(48.2));
        assert_eq!(first_number("no digits here"), None);
        assert_eq!(first_number(""), None);
    }

    #[test]
    fn rounding_is_two_decimals_for_sizes_one_for_temps() {
        assert_eq!(round2(8.74444), 8.74);
        assert_eq!(round2(3.456), 3.46);
        assert_eq!(round1(48.26), 48.3);
        assert_eq!(bytes_to_gb(1_073_741_824), 1.0);
    }
}
