use crate::collectors::{first_number, round1, round2, CollectError, SAMPLE_WINDOW};
use crate::platform::ProbePlan;
use crate::probe::run_probe_set;
use crate::types::{CpuFrequencies, CpuPower, CpuStatus, CpuTemperatures, DetailedCpuStatus, SchedulerStats};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{ComponentExt, CpuExt, System, SystemExt};
use tokio::time;
use tracing::{debug, warn};

/// Layout of the detailed probe set: six sysctl reads, two sensor reads,
/// one powermetrics sample, one iostat sample.
const SYSCTL_PROBES: usize = 6;
const CPU_DETAIL_PROBES: usize = 10;

pub struct CpuCollector {
    plan: Arc<dyn ProbePlan>,
}

impl CpuCollector {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self { plan }
    }

    /// Baseline CPU view. Usage needs two samples separated by a short
    /// window; temperature comes from whatever sensor looks like a CPU.
    pub async fn status(&self) -> Result<CpuStatus, CollectError> {
        let started = Instant::now();
        let mut system = System::new();
        system.refresh_cpu();
        time::sleep(SAMPLE_WINDOW).await;
        system.refresh_cpu();
        system.refresh_components_list();
        system.refresh_components();

        let cpus = system.cpus();
        if cpus.is_empty() {
            return Err(CollectError::basic("cpu", "host reported no cpus"));
        }

        let usage = round2(
            cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64,
        );
        let load = system.load_average();
        let status = CpuStatus {
            usage,
            cores: cpus.len() as u32,
            speed: round2(cpus[0].frequency() as f64 / 1000.0),
            temperature: cpu_temperature(&system),
            load_average: vec![load.one, load.five, load.fifteen],
            model: cpus[0].brand().trim().to_string(),
        };

        debug!(
            usage = status.usage,
            cores = status.cores,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cpu status collected"
        );
        Ok(status)
    }

    /// Enriched CPU view. Every probe outcome is absorbed: a timed-out or
    /// failing probe leaves its fields at their defaults, and a platform
    /// without the probe set gets exactly the basic view.
    pub async fn detailed_status(&self) -> Result<DetailedCpuStatus, CollectError> {
        let basic = self.status().await?;
        let probes = self.plan.cpu_detail();
        if probes.len() < CPU_DETAIL_PROBES {
            if !probes.is_empty() {
                warn!(probes = probes.len(), "incomplete cpu probe plan, degrading to basic");
            }
            return Ok(basic.into());
        }

        let results = run_probe_set(&probes).await;
        let sysctl: Vec<&str> = results[..SYSCTL_PROBES]
            .iter()
            .map(|r| r.output.trim())
            .collect();
        let topology = parse_core_topology(&sysctl);
        let temperatures =
            parse_sensor_temperatures(results[6].output.trim(), results[7].output.trim());
        let power = parse_powermetrics(&results[8].output);
        let scheduler = parse_scheduler_stats(&results[9].output);

        Ok(DetailedCpuStatus {
            basic,
            physical_cores: Some(topology.physical),
            logical_cores: Some(topology.logical),
            performance_cores: Some(topology.performance),
            efficiency_cores: Some(topology.efficiency),
            temperatures: Some(temperatures),
            power: Some(power),
            frequencies: Some(topology.frequencies),
            scheduler: Some(scheduler),
        })
    }
}

fn cpu_temperature(system: &System) -> Option<f64> {
    let markers = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp"];
    system
        .components()
        .iter()
        .filter(|c| {
            let t = c.temperature() as f64;
            t > 0.0 && t < 150.0
        })
        .filter(|c| {
            let label = c.label().to_lowercase();
            markers.iter().any(|m| label.contains(m))
                && !label.contains("gpu")
                && !label.contains("nvidia")
                && !label.contains("amdgpu")
        })
        .map(|c| c.temperature() as f64)
        .max_by(f64::total_cmp)
        .map(round1)
}

struct CoreTopology {
    physical: u32,
    logical: u32,
    performance: u32,
    efficiency: u32,
    frequencies: CpuFrequencies,
}

/// Positional sysctl values: physicalcpu, logicalcpu, perflevel0,
/// perflevel1, cpufrequency_max, cpufrequency_min. Missing or garbled
/// values become zero.
fn parse_core_topology(values: &[&str]) -> CoreTopology {
    let int = |idx: usize| -> u32 {
        values
            .get(idx)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    };
    let hz = |idx: usize| -> f64 {
        values
            .get(idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    let max_ghz = hz(4) / 1_000_000_000.0;
    let min_ghz = hz(5) / 1_000_000_000.0;
    CoreTopology {
        physical: int(0),
        logical: int(1),
        performance: int(2),
        efficiency: int(3),
        frequencies: CpuFrequencies {
            base: round2(min_ghz),
            boost: round2(max_ghz),
            avg: round2((max_ghz + min_ghz) / 2.0),
        },
    }
}

/// smctemp prints one bare number per invocation. Readings outside the
/// plausible sensor window (0..150) are discarded.
fn parse_sensor_temperatures(cpu_text: &str, gpu_text: &str) -> CpuTemperatures {
    let plausible = |t: f64| t > 0.0 && t < 150.0;
    let mut sensors = BTreeMap::new();
    if let Some(t) = first_number(cpu_text).filter(|t| plausible(*t)) {
        sensors.insert("CPU".to_string(), round1(t));
    }
    if let Some(t) = first_number(gpu_text).filter(|t| plausible(*t)) {
        sensors.insert("GPU".to_string(), round1(t));
    }

    let cpu = sensors
        .get("CPU")
        .or_else(|| sensors.values().next())
        .copied()
        .unwrap_or(0.0);
    let max = sensors.values().copied().fold(0.0, f64::max);
    let cores = if cpu > 0.0 { vec![cpu] } else { Vec::new() };

    CpuTemperatures {
        cpu,
        cores,
        max,
        sensors,
    }
}

/// Free-text scan over a powermetrics sample. Zero readings are treated
/// as absent, matching the sampler's own "no data" convention.
fn parse_powermetrics(text: &str) -> CpuPower {
    let mut power = CpuPower::default();
    for line in text.lines() {
        if line.contains("Package Power") {
            power.package_power = first_number(line).filter(|v| *v > 0.0);
        } else if line.contains("CPU Power") {
            power.cpu_power = first_number(line).filter(|v| *v > 0.0);
        } else if line.contains("GPU Power") {
            power.gpu_power = first_number(line).filter(|v| *v > 0.0);
        } else if line.contains("ANE Power") {
            power.ane_power = first_number(line).filter(|v| *v > 0.0);
        }
    }
    power
}

/// iostat system columns: context switches in field 4, interrupts in
/// field 5. The last line with enough fields wins; short lines are skipped.
fn parse_scheduler_stats(text: &str) -> SchedulerStats {
    let mut stats = SchedulerStats::default();
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 6 {
            stats.context_switches = parts[4].parse().unwrap_or(0);
            stats.interrupts = parts[5].parse().unwrap_or(0);
        }
    }
    stats
}
