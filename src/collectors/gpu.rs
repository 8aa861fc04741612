use crate::collectors::{first_number, round1, round2, CollectError};
use crate::platform::ProbePlan;
use crate::probe::run_probe_set;
use crate::types::{
    DetailedGpuStatus, GpuController, GpuDetails, GpuMemory, GpuPowerInfo, GpuProcess, GpuStatus,
    GpuThermal, GpuThrottling, GpuUtilization,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{ComponentExt, System, SystemExt};
use tracing::{debug, warn};

const GPU_DETAIL_PROBES: usize = 7;

/// Fallback geometry for hosts where the VRAM probes come back empty.
const FALLBACK_TOTAL_VRAM_MB: f64 = 16384.0;
const FALLBACK_FREE_VRAM_MB: f64 = 15.0;
const FALLBACK_BANDWIDTH_GBS: f64 = 200.0;
const FALLBACK_FREQUENCY_MHZ: f64 = 1000.0;

pub struct GpuCollector {
    plan: Arc<dyn ProbePlan>,
}

impl GpuCollector {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self { plan }
    }

    /// Baseline GPU view. Probe precedence: nvidia-smi (structured),
    /// then system_profiler where the plan carries it, then thermal
    /// sensor labels as a last resort. No GPU at all is a valid answer.
    pub async fn status(&self) -> Result<GpuStatus, CollectError> {
        let started = Instant::now();
        let probes = self.plan.gpu_basic();
        let results = run_probe_set(&probes).await;

        let mut controllers = results
            .first()
            .filter(|r| r.ok)
            .map(|r| parse_nvidia_smi(&r.output))
            .unwrap_or_default();
        if controllers.is_empty() {
            if let Some(profiler) = results.get(1).filter(|r| r.ok) {
                controllers = parse_profiler_controllers(&profiler.output);
            }
        }
        if controllers.is_empty() {
            controllers = controllers_from_components();
        }

        debug!(
            controllers = controllers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gpu status collected"
        );
        Ok(GpuStatus { controllers })
    }

    /// Enriched GPU view from the IORegistry and power samplers. Any
    /// failure in the probe fan-out degrades to the basic view; the basic
    /// controllers are carried into the detailed record unchanged.
    pub async fn detailed_status(&self) -> Result<DetailedGpuStatus, CollectError> {
        let basic = self.status().await?;
        let probes = self.plan.gpu_detail();
        if probes.len() < GPU_DETAIL_PROBES {
            if !probes.is_empty() {
                warn!(probes = probes.len(), "incomplete gpu probe plan, degrading to basic");
            }
            return Ok(basic.into());
        }

        let results = run_probe_set(&probes).await;
        let profiler = results[0].output.as_str();
        let ioreg = format!(
            "{}\n{}\n{}",
            results[1].output, results[2].output, results[3].output
        );

        let identity = parse_gpu_identity(profiler);
        let total_vram_mb = TOTAL_VRAM
            .captures(&ioreg)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(FALLBACK_TOTAL_VRAM_MB);
        let free_vram_mb = VRAM_FREE_BYTES
            .captures(&ioreg)
            .and_then(|c| c[1].parse::<f64>().ok())
            .map(|bytes| bytes / 1024.0 / 1024.0);
        let memory = gpu_memory(total_vram_mb, free_vram_mb);

        let overall = DEVICE_UTILIZATION
            .captures(&ioreg)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);
        let temperature = results
            .get(4)
            .filter(|r| r.ok)
            .and_then(|r| first_number(&r.output))
            .filter(|t| *t > 0.0 && *t < 150.0)
            .map(round1)
            .unwrap_or(0.0);
        let power_usage = parse_gpu_power(&results[5].output);
        let active = parse_gpu_processes(&results[6].output);
        let throttling = parse_throttling(&ioreg);

        let max_power = if total_vram_mb >= FALLBACK_TOTAL_VRAM_MB {
            20.0
        } else {
            15.0
        };
        let efficiency = if power_usage > 0.0 {
            Some(round2(overall / power_usage))
        } else {
            None
        };

        let details = GpuDetails {
            chipset: identity.chipset,
            total_cores: identity.total_cores,
            metal_support: identity.metal_support,
            utilization: GpuUtilization {
                overall,
                performance_state: 0,
                frequency_mhz: Some(FALLBACK_FREQUENCY_MHZ),
            },
            memory,
            thermal: GpuThermal {
                temperature,
                thermal_state: Some(thermal_state(temperature).to_string()),
                fan_speed: None,
            },
            power: GpuPowerInfo {
                usage: power_usage,
                max_power: Some(max_power),
                efficiency,
            },
            active_processes: if active.is_empty() { None } else { Some(active) },
            throttling,
        };

        Ok(DetailedGpuStatus {
            basic,
            details: Some(details),
        })
    }
}

/// One GPU per CSV line:
/// `index, name, utilization.gpu, memory.used, memory.total, temperature.gpu`.
/// Short or garbled lines are skipped.
fn parse_nvidia_smi(text: &str) -> Vec<GpuController> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 6 {
                return None;
            }
            let memory_total: Option<f64> = parts[4].parse().ok();
            Some(GpuController {
                model: parts[1].to_string(),
                vendor: "NVIDIA".to_string(),
                vram: memory_total.map(|mb| round2(mb / 1024.0)),
                memory_used: parts[3].parse().ok(),
                memory_total,
                utilization_gpu: parts[2].parse().ok(),
                temperature_gpu: parts[5].parse().ok(),
            })
        })
        .collect()
}

fn parse_profiler_controllers(text: &str) -> Vec<GpuController> {
    profiler_displays(text)
        .iter()
        .map(|gpu| {
            let model = str_field(gpu, "sppci_model")
                .or_else(|| str_field(gpu, "_name"))
                .unwrap_or_else(|| "Unknown GPU".to_string());
            let vendor = str_field(gpu, "spdisplays_vendor")
                .map(|v| v.trim_start_matches("sppci_vendor_").to_string())
                .unwrap_or_else(|| "Apple".to_string());
            let vram = str_field(gpu, "spdisplays_vram")
                .or_else(|| str_field(gpu, "sppci_vram"))
                .and_then(|s| {
                    let value = first_number(&s)?;
                    // profiler reports either "N GB" or "N MB"
                    Some(if s.contains("MB") {
                        round2(value / 1024.0)
                    } else {
                        value
                    })
                });
            GpuController {
                model,
                vendor,
                vram,
                memory_used: None,
                memory_total: None,
                utilization_gpu: None,
                temperature_gpu: None,
            }
        })
        .collect()
}

/// Last resort: a GPU-looking thermal sensor proves a controller exists
/// even when every structured probe failed.
fn controllers_from_components() -> Vec<GpuController> {
    let mut system = System::new();
    system.refresh_components_list();
    system.refresh_components();
    system
        .components()
        .iter()
        .filter(|c| {
            let label = c.label().to_lowercase();
            label.contains("gpu") || label.contains("nvidia") || label.contains("amdgpu")
        })
        .map(|c| GpuController {
            model: c.label().to_string(),
            vendor: "Unknown".to_string(),
            vram: None,
            memory_used: None,
            memory_total: None,
            utilization_gpu: None,
            temperature_gpu: Some(round1(c.temperature() as f64)),
        })
        .collect()
}

struct GpuIdentity {
    chipset: String,
    total_cores: u32,
    metal_support: String,
}

fn parse_gpu_identity(profiler_text: &str) -> GpuIdentity {
    let displays = profiler_displays(profiler_text);
    let Some(gpu) = displays.first() else {
        return GpuIdentity {
            chipset: "Unknown".to_string(),
            total_cores: 0,
            metal_support: "Unknown".to_string(),
        };
    };

    let chipset = str_field(gpu, "sppci_model")
        .or_else(|| str_field(gpu, "_name"))
        .unwrap_or_else(|| "Apple GPU".to_string());
    let total_cores = str_field(gpu, "sppci_cores")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(10);
    let metal_support = match str_field(gpu, "spdisplays_mtlgpufamilysupport").as_deref() {
        Some("spdisplays_metal2") => "Metal 2".to_string(),
        Some(other) if !other.is_empty() => "Metal 3".to_string(),
        _ => "Metal 3".to_string(),
    };

    GpuIdentity {
        chipset,
        total_cores,
        metal_support,
    }
}

fn profiler_displays(text: &str) -> Vec<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("SPDisplaysDataType").cloned())
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Splits consumed VRAM into active and cached portions based on how
/// little headroom remains: the tighter the free pool, the smaller the
/// share counted as actively used.
fn vram_split(total_mb: f64, free_mb: f64) -> (f64, f64) {
    let consumed = (total_mb - free_mb).max(0.0);
    let used_share = if free_mb < 50.0 {
        0.05
    } else if free_mb < 500.0 {
        0.2
    } else {
        0.5
    };
    let used = round2(consumed * used_share);
    (used, round2(consumed - used))
}

fn gpu_memory(total_mb: f64, free_mb: Option<f64>) -> GpuMemory {
    match free_mb {
        Some(free) => {
            let free = round2(free);
            let (used, cached) = vram_split(total_mb, free);
            GpuMemory {
                total_mb,
                used_mb: used,
                free_mb: free,
                cached_mb: Some(cached),
                utilization_percent: (used / total_mb * 100.0).round(),
                total_utilization_percent: Some(((used + cached) / total_mb * 100.0).round()),
                bandwidth: Some(FALLBACK_BANDWIDTH_GBS),
            }
        }
        None => GpuMemory {
            total_mb,
            used_mb: 500.0,
            free_mb: FALLBACK_FREE_VRAM_MB,
            cached_mb: Some(0.0),
            utilization_percent: (500.0 / total_mb * 100.0).round(),
            total_utilization_percent: Some((500.0 / total_mb * 100.0).round()),
            bandwidth: Some(FALLBACK_BANDWIDTH_GBS),
        },
    }
}

fn thermal_state(temperature: f64) -> &'static str {
    if temperature < 60.0 {
        "Normal"
    } else if temperature < 80.0 {
        "Warm"
    } else {
        "Hot"
    }
}

fn parse_gpu_power(powermetrics_text: &str) -> f64 {
    powermetrics_text
        .lines()
        .find(|line| line.contains("GPU Power"))
        .and_then(first_number)
        .unwrap_or(0.0)
}

fn parse_throttling(ioreg_text: &str) -> Option<GpuThrottling> {
    let percent = THROTTLE.captures(ioreg_text).and_then(|c| c[1].parse::<f64>().ok())?;
    if percent <= 0.0 {
        return None;
    }
    Some(GpuThrottling {
        is_throttling: true,
        reason: Some("Thermal".to_string()),
        throttle_percent: Some(percent),
    })
}

/// The accelerator user-client table interleaves one creator line per
/// client with its counters. Entries are keyed off the creator line;
/// counters that never appear stay zero.
fn parse_gpu_processes(text: &str) -> Vec<GpuProcess> {
    let mut processes: Vec<GpuProcess> = Vec::new();
    let mut current: Option<GpuProcess> = None;

    for line in text.lines() {
        if let Some(caps) = CLIENT_CREATOR.captures(line) {
            if let Some(entry) = current.take() {
                processes.push(entry);
            }
            current = Some(GpuProcess {
                pid: caps[1].parse().unwrap_or(0),
                name: caps[2].to_string(),
                command_queue_count: 0,
                accumulated_gpu_time: 0,
                api: "Metal".to_string(),
            });
        } else if let Some(entry) = current.as_mut() {
            if line.contains("CommandQueueCount") {
                entry.command_queue_count = first_number(line).map(|v| v as u64).unwrap_or(0);
            } else if line.contains("accumulatedGPUTime") {
                entry.accumulated_gpu_time = first_number(line).map(|v| v as u64).unwrap_or(0);
            } else if let Some(caps) = API_NAME.captures(line) {
                entry.api = caps[1].to_string();
            }
        }
    }
    if let Some(entry) = current.take() {
        processes.push(entry);
    }

    processes.sort_by(|a, b| b.command_queue_count.cmp(&a.command_queue_count));
    processes.truncate(10);
    processes
}

static TOTAL_VRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""VRAM,totalMB"\s*=\s*(\d+)"#).expect("vram total pattern"));
static VRAM_FREE_BYTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""vramFreeBytes"\s*=\s*(\d+)"#).expect("vram free pattern"));
static DEVICE_UTILIZATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""Device Utilization %"\s*=\s*(\d+)"#).expect("utilization pattern"));
static THROTTLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[Tt]hrottle[^=\n]*=\s*(\d+(?:\.\d+)?)"#).expect("throttle pattern"));
static CLIENT_CREATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"IOUserClientCreator"\s*=\s*"pid (\d+), ([^"]+)""#).expect("creator pattern"));
static API_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""API"\s*=\s*"([^"]+)""#).expect("api pattern"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvidia_smi_csv_maps_to_controllers() {
        let text = "0, NVIDIA GeForce RTX 3080, 45, 4096, 10240, 65\n1, NVIDIA GeForce GTX 1660, 12, 512, 6144, 41\n";
        let controllers = parse_nvidia_smi(text);
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[0].model, "NVIDIA GeForce RTX 3080");
        assert_eq!(controllers[0].vendor, "NVIDIA");
        assert_eq!(controllers[0].memory_used, Some(4096.0));
        assert_eq!(controllers[0].memory_total, Some(10240.0));
        assert_eq!(controllers[0].vram, Some(10.0));
        assert_eq!(controllers[0].utilization_gpu, Some(45.0));
        assert_eq!(controllers[1].temperature_gpu, Some(41.0));
    }

    #[test]
    fn nvidia_smi_garbage_yields_no_controllers() {
        assert!(parse_nvidia_smi("nvidia-smi: command not found").is_empty());
        assert!(parse_nvidia_smi("").is_empty());
    }

    const PROFILER_FIXTURE: &str = r#"{
        "SPDisplaysDataType": [
            {
                "_name": "kHW_AppleM2Item",
                "sppci_model": "Apple M2",
                "spdisplays_vendor": "sppci_vendor_Apple",
                "sppci_cores": "10",
                "spdisplays_mtlgpufamilysupport": "spdisplays_metal3"
            }
        ]
    }"#;

    #[test]
    fn profiler_json_maps_to_a_controller() {
        let controllers = parse_profiler_controllers(PROFILER_FIXTURE);
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].model, "Apple M2");
        assert_eq!(controllers[0].vendor, "Apple");
        assert!(controllers[0].vram.is_none());
    }

    #[test]
    fn profiler_identity_reads_cores_and_metal() {
        let identity = parse_gpu_identity(PROFILER_FIXTURE);
        assert_eq!(identity.chipset, "Apple M2");
        assert_eq!(identity.total_cores, 10);
        assert_eq!(identity.metal_support, "Metal 3");
    }

    #[test]
    fn broken_profiler_json_means_unknown_identity() {
        let identity = parse_gpu_identity("not json at all");
        assert_eq!(identity.chipset, "Unknown");
        assert_eq!(identity.total_cores, 0);
    }

    #[test]
    fn vram_split_share_depends_on_free_headroom() {
        // almost no headroom: 5% of consumed counted as active
        let (used, cached) = vram_split(16384.0, 40.0);
        assert_eq!(used, round2((16384.0 - 40.0) * 0.05));
        assert!((used + cached - 16344.0).abs() < 1e-6);

        // some headroom: 20%
        let (used, _) = vram_split(16384.0, 400.0);
        assert_eq!(used, round2((16384.0 - 400.0) * 0.2));

        // plenty: 50%
        let (used, cached) = vram_split(16384.0, 2000.0);
        assert_eq!(used, 7192.0);
        assert_eq!(cached, 7192.0);
    }

    #[test]
    fn missing_free_bytes_falls_back_to_fixed_usage() {
        let memory = gpu_memory(16384.0, None);
        assert_eq!(memory.used_mb, 500.0);
        assert_eq!(memory.free_mb, FALLBACK_FREE_VRAM_MB);
        assert_eq!(memory.cached_mb, Some(0.0));
        // 500 / 16384 = 3.05%, reported as a whole percent
        assert_eq!(memory.utilization_percent, 3.0);
        assert_eq!(memory.total_utilization_percent, Some(3.0));
    }

    #[test]
    fn memory_utilization_percents_round_to_whole_numbers() {
        let memory = gpu_memory(16384.0, Some(2000.0));
        assert_eq!(memory.used_mb, 7192.0);
        // 7192 / 16384 = 43.9%, (7192 + 7192) / 16384 = 87.8%
        assert_eq!(memory.utilization_percent, 44.0);
        assert_eq!(memory.total_utilization_percent, Some(88.0));
    }

    #[test]
    fn thermal_state_band_boundaries() {
        assert_eq!(thermal_state(59.9), "Normal");
        assert_eq!(thermal_state(60.0), "Warm");
        assert_eq!(thermal_state(79.9), "Warm");
        assert_eq!(thermal_state(80.0), "Hot");
    }

    #[test]
    fn accelerator_clients_parse_into_processes() {
        let text = r#"
    | |   "IOUserClientCreator" = "pid 502, WindowServer"
    | |   "CommandQueueCount" = 12
    | |   "accumulatedGPUTime" = 987654
    | |   "API" = "Metal"
    | |   "IOUserClientCreator" = "pid 912, Safari"
    | |   "CommandQueueCount" = 30
"#;
        let processes = parse_gpu_processes(text);
        assert_eq!(processes.len(), 2);
        // sorted by command queue count, busiest first
        assert_eq!(processes[0].pid, 912);
        assert_eq!(processes[0].name, "Safari");
        assert_eq!(processes[0].command_queue_count, 30);
        assert_eq!(processes[1].accumulated_gpu_time, 987654);
        assert_eq!(processes[1].api, "Metal");
    }

    #[test]
    fn throttling_requires_a_positive_reading() {
        assert!(parse_throttling(r#""gpuThrottleLevel" = 0"#).is_none());
        let throttling = parse_throttling(r#""gpuThrottleLevel" = 25"#).expect("throttling");
        assert!(throttling.is_throttling);
        assert_eq!(throttling.throttle_percent, Some(25.0));
    }
}
