//! Per-platform probe plans.
//!
//! Which shell utilities exist (and what their output looks like) depends on
//! the host OS. Each collector asks its `ProbePlan` for the probes of one
//! telemetry domain; an empty plan means the domain has no extra probes on
//! this platform and the detailed view equals the basic one.

use crate::probe::Probe;
use std::sync::Arc;
use std::time::Duration;

/// Short probes with a tight latency profile (sensor reads, ioreg dumps).
const FAST_TIMEOUT: Duration = Duration::from_secs(3);
/// netstat enumerating sockets can stall on busy hosts.
const NETSTAT_TIMEOUT: Duration = Duration::from_secs(5);
/// A full ps/lsof sweep is the slowest probe in the set.
const PS_TIMEOUT: Duration = Duration::from_secs(10);

pub trait ProbePlan: Send + Sync {
    fn gpu_basic(&self) -> Vec<Probe>;
    fn memory_basic(&self) -> Vec<Probe>;
    fn cpu_detail(&self) -> Vec<Probe>;
    fn memory_detail(&self) -> Vec<Probe>;
    fn gpu_detail(&self) -> Vec<Probe>;
    fn network_detail(&self) -> Vec<Probe>;
    fn process_detail(&self) -> Vec<Probe>;
}

/// Selects the plan for the OS this binary was built for. The choice is
/// made once at monitor construction, not per call.
pub fn plan_for_host(default_timeout: Duration) -> Arc<dyn ProbePlan> {
    if cfg!(target_os = "macos") {
        Arc::new(DarwinProbePlan { default_timeout })
    } else {
        Arc::new(GenericProbePlan { default_timeout })
    }
}

/// The rich macOS probe set: sysctl, vm_stat, memory_pressure, smctemp,
/// powermetrics, iostat, system_profiler, ioreg, netstat, nettop, ifconfig,
/// airport, ping, ps and lsof.
pub struct DarwinProbePlan {
    pub default_timeout: Duration,
}

const AIRPORT_BIN: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";

impl ProbePlan for DarwinProbePlan {
    fn gpu_basic(&self) -> Vec<Probe> {
        vec![
            Probe::new(NVIDIA_SMI_QUERY, self.default_timeout),
            Probe::new("system_profiler SPDisplaysDataType -json", self.default_timeout),
        ]
    }

    fn memory_basic(&self) -> Vec<Probe> {
        vec![Probe::new("vm_stat", self.default_timeout)]
    }

    fn cpu_detail(&self) -> Vec<Probe> {
        vec![
            Probe::new("sysctl -n hw.physicalcpu", self.default_timeout),
            Probe::new("sysctl -n hw.logicalcpu", self.default_timeout),
            Probe::new("sysctl -n hw.perflevel0.physicalcpu", self.default_timeout),
            Probe::new("sysctl -n hw.perflevel1.physicalcpu", self.default_timeout),
            Probe::new("sysctl -n hw.cpufrequency_max", self.default_timeout),
            Probe::new("sysctl -n hw.cpufrequency_min", self.default_timeout),
            Probe::new("smctemp -c", FAST_TIMEOUT),
            Probe::new("smctemp -g", FAST_TIMEOUT),
            Probe::new(POWERMETRICS_SAMPLE, self.default_timeout),
            Probe::new("iostat -c 1 | tail -n +4", self.default_timeout),
        ]
    }

    fn memory_detail(&self) -> Vec<Probe> {
        vec![
            Probe::new("vm_stat", self.default_timeout),
            Probe::new("memory_pressure -l 1", self.default_timeout),
        ]
    }

    fn gpu_detail(&self) -> Vec<Probe> {
        vec![
            Probe::new("system_profiler SPDisplaysDataType -json", self.default_timeout),
            Probe::new("ioreg -c AGXAccelerator -l", FAST_TIMEOUT),
            Probe::new("ioreg -l | grep \"vramFreeBytes\" | head -1", FAST_TIMEOUT),
            Probe::new("ioreg -l | grep \"VRAM,totalMB\" | head -1", FAST_TIMEOUT),
            Probe::new("smctemp -g 2>/dev/null || echo \"0\"", FAST_TIMEOUT),
            Probe::new(POWERMETRICS_SAMPLE, self.default_timeout),
            Probe::new(
                "ioreg -c AGXDeviceUserClient -l | grep -E \"IOUserClientCreator|CommandQueueCount|accumulatedGPUTime|API\"",
                FAST_TIMEOUT,
            ),
        ]
    }

    fn network_detail(&self) -> Vec<Probe> {
        vec![
            Probe::new("netstat -an | head -100", NETSTAT_TIMEOUT),
            Probe::new("netstat -s", NETSTAT_TIMEOUT),
            Probe::new("nettop -l 1 -c | head -50", NETSTAT_TIMEOUT),
            Probe::new("ifconfig -a", self.default_timeout),
            Probe::new(format!("{AIRPORT_BIN} -I"), FAST_TIMEOUT),
            Probe::new(
                "ping -c 3 -t 3 8.8.8.8 2>/dev/null || echo \"ping failed\"",
                NETSTAT_TIMEOUT,
            ),
        ]
    }

    fn process_detail(&self) -> Vec<Probe> {
        vec![
            Probe::new(
                "ps -eo pid,ppid,pcpu,pmem,rss,vsz,time,comm,user,state,pri,nice,args -r",
                PS_TIMEOUT,
            ),
            Probe::new(
                "lsof -n 2>/dev/null | awk '{print $2}' | sort | uniq -c | sort -rn | head -50",
                PS_TIMEOUT,
            ),
        ]
    }
}

/// Any platform without a rich probe set. The nvidia-smi query still runs
/// for the basic GPU view; everything detailed degrades to basic.
pub struct GenericProbePlan {
    pub default_timeout: Duration,
}

impl ProbePlan for GenericProbePlan {
    fn gpu_basic(&self) -> Vec<Probe> {
        vec![Probe::new(NVIDIA_SMI_QUERY, self.default_timeout)]
    }

    fn memory_basic(&self) -> Vec<Probe> {
        Vec::new()
    }

    fn cpu_detail(&self) -> Vec<Probe> {
        Vec::new()
    }

    fn memory_detail(&self) -> Vec<Probe> {
        Vec::new()
    }

    fn gpu_detail(&self) -> Vec<Probe> {
        Vec::new()
    }

    fn network_detail(&self) -> Vec<Probe> {
        Vec::new()
    }

    fn process_detail(&self) -> Vec<Probe> {
        Vec::new()
    }
}

const NVIDIA_SMI_QUERY: &str = "nvidia-smi --query-gpu=index,name,utilization.gpu,memory.used,memory.total,temperature.gpu --format=csv,noheader,nounits";

const POWERMETRICS_SAMPLE: &str = "sudo powermetrics -n 1 -i 1000 --samplers cpu_power,gpu_power 2>/dev/null || echo \"Power data unavailable\"";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_plan_has_no_detail_probes() {
        let plan = GenericProbePlan {
            default_timeout: Duration::from_secs(5),
        };
        assert!(plan.cpu_detail().is_empty());
        assert!(plan.memory_detail().is_empty());
        assert!(plan.gpu_detail().is_empty());
        assert!(plan.network_detail().is_empty());
        assert!(plan.process_detail().is_empty());
        assert_eq!(plan.gpu_basic().len(), 1);
    }

    #[test]
    fn darwin_slow_probes_get_wider_deadlines() {
        let plan = DarwinProbePlan {
            default_timeout: Duration::from_secs(5),
        };
        let process = plan.process_detail();
        assert!(process.iter().all(|p| p.timeout == PS_TIMEOUT));
        let network = plan.network_detail();
        assert_eq!(network[0].timeout, NETSTAT_TIMEOUT);
        let cpu = plan.cpu_detail();
        assert_eq!(cpu.len(), 10);
        assert_eq!(cpu[6].timeout, FAST_TIMEOUT);
    }
}
