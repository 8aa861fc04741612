use crate::collectors::{now_millis, round2, CollectError, MIB, SAMPLE_WINDOW};
use crate::platform::ProbePlan;
use crate::probe::run_probe_set;
use crate::types::{
    ChildProcess, CpuBottleneck, CriticalService, DetailedProcessEntry, DetailedProcessStatus,
    FdProcessEntry, HeavyService, IoIntensiveProcess, MemoryBottleneck, MemoryDetails,
    MemoryProcessEntry, ParentProcess, PerformanceImpact, ProcessInfo, ProcessResources,
    ProcessStateInfo, ProcessSummary, ProcessTree, RootProcess, SecurityAnalysis, SuspiciousProcess,
    SystemServices, TimeInfo, TopProcesses,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{PidExt, ProcessExt, System, SystemExt};
use tokio::time;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
    Name,
}

const CRITICAL_SERVICES: &[&str] = &[
    "launchd",
    "kernel_task",
    "WindowServer",
    "loginwindow",
    "cfprefsd",
    "systemd",
    "init",
];

const KNOWN_PROCESSES: &[&str] = &[
    "kernel_task",
    "launchd",
    "WindowServer",
    "Finder",
    "Dock",
    "Safari",
    "Google Chrome",
    "firefox",
    "node",
    "Xcode",
];

pub struct ProcessCollector {
    plan: Arc<dyn ProbePlan>,
}

impl ProcessCollector {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self { plan }
    }

    /// Baseline process list. CPU figures need two refreshes a short
    /// window apart; processes idle on both axes are dropped before
    /// sorting so the list reflects actual activity.
    pub async fn list(&self, sort_by: SortKey, limit: usize) -> Result<Vec<ProcessInfo>, CollectError> {
        let started = Instant::now();
        let mut system = System::new();
        system.refresh_processes();
        time::sleep(SAMPLE_WINDOW).await;
        system.refresh_processes();
        system.refresh_memory();

        let total_memory = system.total_memory();
        if system.processes().is_empty() {
            return Err(CollectError::basic("process", "no processes visible"));
        }

        let mut list: Vec<ProcessInfo> = system
            .processes()
            .values()
            .map(|p| {
                let memory_bytes = p.memory();
                ProcessInfo {
                    pid: p.pid().as_u32(),
                    name: p.name().to_string(),
                    cpu: round2(p.cpu_usage() as f64),
                    memory: round2(memory_bytes as f64 / MIB),
                    memory_percent: if total_memory > 0 {
                        round2(memory_bytes as f64 / total_memory as f64 * 100.0)
                    } else {
                        0.0
                    },
                }
            })
            .filter(|p| p.cpu > 0.0 || p.memory > 0.0)
            .collect();
        // enumeration order is a HashMap's; pin it down before the keyed sort
        list.sort_by_key(|p| p.pid);

        let list = sort_processes(list, sort_by, limit);
        debug!(
            returned = list.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "process list collected"
        );
        Ok(list)
    }

    /// Full process analysis from a ps sweep joined with lsof descriptor
    /// counts. When the sweep is unavailable the analysis is rebuilt from
    /// the baseline list instead of failing.
    pub async fn detailed_status(&self) -> Result<DetailedProcessStatus, CollectError> {
        let probes = self.plan.process_detail();
        if probes.is_empty() {
            let basic = self.list(SortKey::Cpu, 50).await?;
            return Ok(status_from_basic_list(&basic));
        }

        let results = run_probe_set(&probes).await;
        let ps = &results[0];
        if !ps.ok || ps.output.trim().is_empty() {
            warn!(error = ?ps.error, "ps probe failed, building process status from baseline");
            let basic = self.list(SortKey::Cpu, 50).await?;
            return Ok(status_from_basic_list(&basic));
        }

        let fd_counts = results
            .get(1)
            .filter(|r| r.ok)
            .map(|r| parse_lsof_counts(&r.output))
            .unwrap_or_default();
        let entries = parse_ps_processes(&ps.output, &fd_counts);
        debug!(processes = entries.len(), "detailed process sweep parsed");
        Ok(build_process_status(&entries))
    }
}

/// Stable keyed sort: ties keep the caller's order, so pre-sorting by pid
/// makes tie-breaks deterministic.
pub fn sort_processes(mut list: Vec<ProcessInfo>, sort_by: SortKey, limit: usize) -> Vec<ProcessInfo> {
    match sort_by {
        SortKey::Cpu => list.sort_by(|a, b| b.cpu.total_cmp(&a.cpu)),
        SortKey::Memory => list.sort_by(|a, b| b.memory.total_cmp(&a.memory)),
        SortKey::Name => list.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    list.truncate(limit);
    list
}

/// One entry per ps line. Columns, in order: pid, ppid, pcpu, pmem, rss,
/// vsz, time, comm, user, state, pri, nice, then the full command. Lines
/// short of the fixed columns (including the header) are skipped.
fn parse_ps_processes(ps_text: &str, fd_counts: &HashMap<u32, u64>) -> Vec<DetailedProcessEntry> {
    let now = now_millis();
    ps_text
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 13 {
                return None;
            }
            let pid: u32 = parts[0].parse().ok()?;

            let rss: u64 = parts[4].parse().unwrap_or(0);
            let cpu_time = parts[6].to_string();
            let run_time = parse_cpu_time(&cpu_time);
            let name = parts[7].rsplit('/').next().unwrap_or(parts[7]).to_string();
            let fds = fd_counts.get(&pid).copied().unwrap_or(0);

            Some(DetailedProcessEntry {
                pid,
                ppid: parts[1].parse().unwrap_or(0),
                name,
                command: parts[12..].join(" "),
                user: parts[8].to_string(),
                cpu: parts[2].parse().unwrap_or(0.0),
                memory: round2(rss as f64 / 1024.0),
                memory_percent: parts[3].parse().unwrap_or(0.0),
                memory_details: MemoryDetails {
                    rss,
                    vsz: parts[5].parse().unwrap_or(0),
                    // ps gives no shared/private split; estimate 10% shared
                    shared: (rss as f64 * 0.1).round() as u64,
                    private_kb: (rss as f64 * 0.9).round() as u64,
                },
                time_info: TimeInfo {
                    cpu_time,
                    start_time: now - (run_time * 1000.0) as i64,
                    run_time,
                },
                resources: ProcessResources {
                    threads: 1,
                    file_descriptors: fds,
                    open_files: fds,
                },
                status: ProcessStateInfo {
                    state: parts[9].to_string(),
                    priority: parts[10].parse().unwrap_or(0),
                    nice: parts[11].parse().unwrap_or(0),
                },
            })
        })
        .collect()
}

/// ps TIME is `MM:SS.ss` or `HH:MM:SS`; anything else counts as zero.
fn parse_cpu_time(time: &str) -> f64 {
    let parts: Vec<&str> = time.split(':').collect();
    match parts.len() {
        2 => {
            let minutes: f64 = parts[0].parse().unwrap_or(0.0);
            let seconds: f64 = parts[1].parse().unwrap_or(0.0);
            minutes * 60.0 + seconds
        }
        3 => {
            let hours: f64 = parts[0].parse().unwrap_or(0.0);
            let minutes: f64 = parts[1].parse().unwrap_or(0.0);
            let seconds: f64 = parts[2].parse().unwrap_or(0.0);
            hours * 3600.0 + minutes * 60.0 + seconds
        }
        _ => 0.0,
    }
}

/// `lsof | awk | uniq -c` output: a count and a pid per line.
fn parse_lsof_counts(text: &str) -> HashMap<u32, u64> {
    let mut counts = HashMap::new();
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            if let (Ok(count), Ok(pid)) = (parts[0].parse::<u64>(), parts[1].parse::<u32>()) {
                counts.insert(pid, count);
            }
        }
    }
    counts
}

fn summarize(entries: &[DetailedProcessEntry]) -> ProcessSummary {
    let mut summary = ProcessSummary {
        total_processes: entries.len() as u64,
        total_threads: entries.len() as u64,
        ..ProcessSummary::default()
    };
    for entry in entries {
        match entry.status.state.chars().next() {
            Some('R') => summary.running_processes += 1,
            Some('S') | Some('I') => summary.sleeping_processes += 1,
            Some('Z') => summary.zombie_processes += 1,
            _ => {}
        }
    }
    summary
}

fn build_process_status(entries: &[DetailedProcessEntry]) -> DetailedProcessStatus {
    DetailedProcessStatus {
        summary: summarize(entries),
        top_processes: top_processes(entries),
        process_tree: build_process_tree(entries),
        system_services: analyze_services(entries),
        security_analysis: analyze_security(entries),
        performance_impact: analyze_impact(entries),
    }
}

fn top_processes(entries: &[DetailedProcessEntry]) -> TopProcesses {
    let mut by_cpu: Vec<DetailedProcessEntry> = entries
        .iter()
        .filter(|e| e.cpu > 0.1)
        .cloned()
        .collect();
    by_cpu.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    by_cpu.truncate(20);

    let mut by_memory: Vec<MemoryProcessEntry> = entries
        .iter()
        .filter(|e| e.memory > 10.0)
        .map(|e| MemoryProcessEntry {
            pid: e.pid,
            name: e.name.clone(),
            memory: e.memory,
            memory_percent: e.memory_percent,
            cpu: e.cpu,
            user: e.user.clone(),
        })
        .collect();
    by_memory.sort_by(|a, b| b.memory.total_cmp(&a.memory));
    by_memory.truncate(20);

    let mut by_fds: Vec<FdProcessEntry> = entries
        .iter()
        .filter(|e| e.resources.file_descriptors > 10)
        .map(|e| FdProcessEntry {
            pid: e.pid,
            name: e.name.clone(),
            file_descriptors: e.resources.file_descriptors,
            user: e.user.clone(),
        })
        .collect();
    by_fds.sort_by(|a, b| b.file_descriptors.cmp(&a.file_descriptors));
    by_fds.truncate(15);

    TopProcesses {
        by_cpu,
        by_memory,
        by_file_descriptors: by_fds,
    }
}

/// Groups processes under their parent pid; only parents with more than
/// one child are interesting enough to report.
fn build_process_tree(entries: &[DetailedProcessEntry]) -> ProcessTree {
    let by_pid: HashMap<u32, &DetailedProcessEntry> =
        entries.iter().map(|e| (e.pid, e)).collect();
    let mut children: HashMap<u32, Vec<&DetailedProcessEntry>> = HashMap::new();
    for entry in entries {
        children.entry(entry.ppid).or_default().push(entry);
    }

    let mut parents: Vec<ParentProcess> = children
        .into_iter()
        .filter(|(_, kids)| kids.len() > 1)
        .map(|(ppid, mut kids)| {
            kids.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
            let parent = by_pid.get(&ppid);
            let own_cpu = parent.map(|p| p.cpu).unwrap_or(0.0);
            let own_memory = parent.map(|p| p.memory).unwrap_or(0.0);
            ParentProcess {
                pid: ppid,
                name: parent
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                child_count: kids.len() as u64,
                total_cpu_usage: round2(own_cpu + kids.iter().map(|k| k.cpu).sum::<f64>()),
                total_memory_usage: round2(own_memory + kids.iter().map(|k| k.memory).sum::<f64>()),
                children: kids
                    .iter()
                    .take(5)
                    .map(|k| ChildProcess {
                        pid: k.pid,
                        name: k.name.clone(),
                        cpu: k.cpu,
                        memory: k.memory,
                    })
                    .collect(),
            }
        })
        .collect();
    parents.sort_by(|a, b| b.child_count.cmp(&a.child_count));
    parents.truncate(5);
    ProcessTree {
        top_parents: parents,
    }
}

fn analyze_services(entries: &[DetailedProcessEntry]) -> SystemServices {
    let critical_services = entries
        .iter()
        .filter(|e| CRITICAL_SERVICES.contains(&e.name.as_str()))
        .map(|e| CriticalService {
            name: e.name.clone(),
            pid: e.pid,
            status: match e.status.state.chars().next() {
                Some('R') => "running".to_string(),
                Some('S') | Some('I') => "sleeping".to_string(),
                Some('Z') => "zombie".to_string(),
                _ => e.status.state.clone(),
            },
            cpu: e.cpu,
            memory: e.memory,
        })
        .collect();

    let mut heavy: Vec<HeavyService> = entries
        .iter()
        .filter(|e| e.cpu > 5.0 || e.memory > 500.0)
        .map(|e| HeavyService {
            name: e.name.clone(),
            pid: e.pid,
            cpu: e.cpu,
            memory: e.memory,
            impact: if e.cpu > 20.0 || e.memory > 1000.0 {
                "high".to_string()
            } else if e.cpu > 10.0 || e.memory > 500.0 {
                "medium".to_string()
            } else {
                "low".to_string()
            },
        })
        .collect();
    heavy.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    heavy.truncate(10);

    SystemServices {
        critical_services,
        heavy_services: heavy,
    }
}

fn analyze_security(entries: &[DetailedProcessEntry]) -> SecurityAnalysis {
    let mut root: Vec<RootProcess> = entries
        .iter()
        .filter(|e| e.user == "root")
        .map(|e| RootProcess {
            pid: e.pid,
            name: e.name.clone(),
            command: e.command.clone(),
            cpu: e.cpu,
            memory: e.memory,
        })
        .collect();
    root.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    root.truncate(10);

    let suspicious = entries
        .iter()
        .filter_map(|e| {
            let known = KNOWN_PROCESSES.contains(&e.name.as_str());
            let reason = if (e.cpu > 50.0 || e.memory > 2000.0) && !known {
                "Unusually high resource usage"
            } else if e.resources.file_descriptors > 1000 {
                "Excessive file descriptors"
            } else {
                return None;
            };
            Some(SuspiciousProcess {
                pid: e.pid,
                name: e.name.clone(),
                reason: reason.to_string(),
                cpu: e.cpu,
                memory: e.memory,
                file_descriptors: e.resources.file_descriptors,
            })
        })
        .collect();

    SecurityAnalysis {
        root_processes: root,
        suspicious_processes: suspicious,
    }
}

fn analyze_impact(entries: &[DetailedProcessEntry]) -> PerformanceImpact {
    let mut cpu_bottlenecks: Vec<CpuBottleneck> = entries
        .iter()
        .filter(|e| e.cpu > 15.0)
        .map(|e| CpuBottleneck {
            pid: e.pid,
            name: e.name.clone(),
            cpu: e.cpu,
            impact: round2((e.cpu * 2.0).min(100.0)),
            recommendation: cpu_recommendation(e.cpu).to_string(),
        })
        .collect();
    cpu_bottlenecks.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    cpu_bottlenecks.truncate(10);

    let mut memory_bottlenecks: Vec<MemoryBottleneck> = entries
        .iter()
        .filter(|e| e.memory_percent > 5.0)
        .map(|e| MemoryBottleneck {
            pid: e.pid,
            name: e.name.clone(),
            memory: e.memory,
            memory_percent: e.memory_percent,
            impact: round2((e.memory_percent * 10.0).min(100.0)),
            recommendation: memory_recommendation(e.memory_percent).to_string(),
        })
        .collect();
    memory_bottlenecks.sort_by(|a, b| b.memory_percent.total_cmp(&a.memory_percent));
    memory_bottlenecks.truncate(10);

    let mut io_intensive: Vec<IoIntensiveProcess> = entries
        .iter()
        .filter(|e| e.resources.file_descriptors > 50)
        .map(|e| IoIntensiveProcess {
            pid: e.pid,
            name: e.name.clone(),
            file_descriptors: e.resources.file_descriptors,
        })
        .collect();
    io_intensive.sort_by(|a, b| b.file_descriptors.cmp(&a.file_descriptors));
    io_intensive.truncate(10);

    PerformanceImpact {
        cpu_bottlenecks,
        memory_bottlenecks,
        io_intensive_processes: io_intensive,
    }
}

fn cpu_recommendation(cpu: f64) -> &'static str {
    if cpu > 80.0 {
        "Consider restarting or terminating the process"
    } else if cpu > 50.0 {
        "Optimize the process or set resource limits"
    } else if cpu > 30.0 {
        "Reschedule background work"
    } else {
        "Keep monitoring"
    }
}

fn memory_recommendation(memory_percent: f64) -> &'static str {
    if memory_percent > 20.0 {
        "Check for memory leaks and restart the process"
    } else if memory_percent > 10.0 {
        "Increase memory usage monitoring"
    } else {
        "Review memory optimization"
    }
}

/// Degraded path: no ps sweep, so every entry is synthesized from the
/// baseline list with unknowable fields left at defaults.
fn status_from_basic_list(list: &[ProcessInfo]) -> DetailedProcessStatus {
    let entries: Vec<DetailedProcessEntry> = list
        .iter()
        .map(|p| DetailedProcessEntry {
            pid: p.pid,
            name: p.name.clone(),
            cpu: p.cpu,
            memory: p.memory,
            memory_percent: p.memory_percent,
            status: ProcessStateInfo {
                state: "R".to_string(),
                ..ProcessStateInfo::default()
            },
            ..DetailedProcessEntry::default()
        })
        .collect();
    build_process_status(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, name: &str, cpu: f64, memory: f64) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            cpu,
            memory,
            memory_percent: 0.0,
        }
    }

    #[test]
    fn sort_by_memory_takes_the_heaviest_first() {
        let list = vec![
            info(1, "a", 1.0, 100.0),
            info(2, "b", 2.0, 500.0),
            info(3, "c", 3.0, 50.0),
            info(4, "d", 4.0, 300.0),
            info(5, "e", 5.0, 200.0),
        ];
        let sorted = sort_processes(list, SortKey::Memory, 3);
        let pids: Vec<u32> = sorted.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![2, 4, 5]);
    }

    #[test]
    fn sort_by_name_is_ascending() {
        let list = vec![
            info(1, "zsh", 0.0, 1.0),
            info(2, "bash", 0.0, 1.0),
            info(3, "nginx", 0.0, 1.0),
        ];
        let sorted = sort_processes(list, SortKey::Name, 10);
        let names: Vec<&str> = sorted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bash", "nginx", "zsh"]);
    }

    #[test]
    fn cpu_ties_keep_pid_order() {
        let list = vec![
            info(10, "a", 5.0, 1.0),
            info(20, "b", 5.0, 1.0),
            info(30, "c", 9.0, 1.0),
        ];
        let sorted = sort_processes(list, SortKey::Cpu, 10);
        let pids: Vec<u32> = sorted.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![30, 10, 20]);
    }

    const PS_FIXTURE: &str = "\
  PID  PPID  %CPU %MEM    RSS      VSZ      TIME COMM            USER   STAT PRI NI ARGS
    1     0   0.1  0.2  12000   409600   1:02:03 /sbin/launchd    root   Ss   31  0 /sbin/launchd
  502     1  42.5  8.4 881920 34909120   5:31.11 node             alice  R    31  0 node server.js --port 8080
  503     1   0.0  0.1   2048   409600   0:00.10 zombied          alice  Z    31  0 zombied
  777   502   4.0  1.0  51200   409600   0:03.50 worker           alice  S    31  0 worker --queue jobs
  778   502   6.0  1.2  61440   409600   0:04.50 worker           alice  I    31  0 worker --queue mail
garbage line
";

    fn fixture_entries() -> Vec<DetailedProcessEntry> {
        let mut fds = HashMap::new();
        fds.insert(502, 1200_u64);
        fds.insert(777, 60_u64);
        parse_ps_processes(PS_FIXTURE, &fds)
    }

    #[test]
    fn ps_lines_parse_positionally_and_skip_short_ones() {
        let entries = fixture_entries();
        assert_eq!(entries.len(), 5);

        let node = entries.iter().find(|e| e.pid == 502).expect("node entry");
        assert_eq!(node.ppid, 1);
        assert_eq!(node.name, "node");
        assert_eq!(node.command, "node server.js --port 8080");
        assert_eq!(node.user, "alice");
        assert_eq!(node.cpu, 42.5);
        // 881920 KB rss
        assert_eq!(node.memory, 861.25);
        assert_eq!(node.memory_details.rss, 881920);
        assert_eq!(node.memory_details.shared, 88192);
        assert_eq!(node.resources.file_descriptors, 1200);
        assert_eq!(node.status.state, "R");

        let launchd = entries.iter().find(|e| e.pid == 1).expect("launchd entry");
        assert_eq!(launchd.name, "launchd");
        assert_eq!(launchd.time_info.run_time, 3723.0);
    }

    #[test]
    fn cpu_time_formats() {
        assert_eq!(parse_cpu_time("0:03.56"), 3.56);
        assert_eq!(parse_cpu_time("12:34.56"), 754.56);
        assert_eq!(parse_cpu_time("1:02:03"), 3723.0);
        assert_eq!(parse_cpu_time("garbage"), 0.0);
    }

    #[test]
    fn lsof_counts_index_by_pid() {
        let counts = parse_lsof_counts("  341 502\n   12 777\nnot a line\n");
        assert_eq!(counts.get(&502), Some(&341));
        assert_eq!(counts.get(&777), Some(&12));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn summary_buckets_by_state_letter() {
        let summary = summarize(&fixture_entries());
        assert_eq!(summary.total_processes, 5);
        assert_eq!(summary.running_processes, 1);
        // S, Ss and I all count as sleeping
        assert_eq!(summary.sleeping_processes, 3);
        assert_eq!(summary.zombie_processes, 1);
    }

    #[test]
    fn top_lists_apply_their_thresholds() {
        let top = top_processes(&fixture_entries());
        // cpu > 0.1: node, worker x2 (launchd at 0.1 is excluded)
        assert_eq!(top.by_cpu.len(), 3);
        assert_eq!(top.by_cpu[0].pid, 502);
        // memory > 10 MB: node (861), workers (50, 60), launchd (11.72)
        assert_eq!(top.by_memory.len(), 4);
        assert_eq!(top.by_memory[0].pid, 502);
        // fds > 10: node (1200), worker 777 (60)
        assert_eq!(top.by_file_descriptors.len(), 2);
        assert_eq!(top.by_file_descriptors[0].file_descriptors, 1200);
    }

    #[test]
    fn process_tree_groups_by_parent() {
        let tree = build_process_tree(&fixture_entries());
        // pid 1 has two children (502, 503), pid 502 has two workers
        let node_parent = tree
            .top_parents
            .iter()
            .find(|p| p.pid == 502)
            .expect("node parent");
        assert_eq!(node_parent.name, "node");
        assert_eq!(node_parent.child_count, 2);
        assert_eq!(node_parent.total_cpu_usage, 52.5);
        assert_eq!(node_parent.children[0].pid, 778);
    }

    #[test]
    fn services_and_security_flag_the_right_processes() {
        let entries = fixture_entries();
        let services = analyze_services(&entries);
        assert_eq!(services.critical_services.len(), 1);
        assert_eq!(services.critical_services[0].name, "launchd");
        // node: cpu 42.5 > 20 => high impact
        let node = services
            .heavy_services
            .iter()
            .find(|s| s.pid == 502)
            .expect("heavy node");
        assert_eq!(node.impact, "high");

        let security = analyze_security(&entries);
        assert_eq!(security.root_processes.len(), 1);
        assert_eq!(security.root_processes[0].name, "launchd");
        // node is not in the known list and burns > 50? no, but 1200 fds
        let suspicious = security
            .suspicious_processes
            .iter()
            .find(|s| s.pid == 502)
            .expect("suspicious node");
        assert_eq!(suspicious.reason, "Excessive file descriptors");
    }

    #[test]
    fn impact_thresholds_and_scaling() {
        let entries = fixture_entries();
        let impact = analyze_impact(&entries);
        assert_eq!(impact.cpu_bottlenecks.len(), 1);
        assert_eq!(impact.cpu_bottlenecks[0].pid, 502);
        // 42.5 * 2 = 85
        assert_eq!(impact.cpu_bottlenecks[0].impact, 85.0);
        assert_eq!(impact.memory_bottlenecks.len(), 1);
        // 8.4 * 10 = 84
        assert_eq!(impact.memory_bottlenecks[0].impact, 84.0);
        assert_eq!(impact.io_intensive_processes.len(), 2);
    }

    #[test]
    fn basic_list_fallback_still_produces_a_full_record() {
        let list = vec![
            info(1, "a", 30.0, 1200.0),
            info(2, "b", 0.5, 20.0),
        ];
        let status = status_from_basic_list(&list);
        assert_eq!(status.summary.total_processes, 2);
        assert_eq!(status.summary.running_processes, 2);
        assert_eq!(status.top_processes.by_cpu.len(), 2);
        assert!(status.top_processes.by_file_descriptors.is_empty());
        // heavy by memory even without a ps sweep
        assert_eq!(status.system_services.heavy_services.len(), 1);
    }
}
