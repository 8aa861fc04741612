use crate::collectors::{bytes_to_gb, first_number, round2, CollectError, GIB};
use crate::platform::ProbePlan;
use crate::probe::run_probe_set;
use crate::types::{DetailedMemoryStatus, MemoryPageDetails, MemoryStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{System, SystemExt};
use tracing::{debug, warn};

/// Page size used by the detailed page breakdown. The header-derived page
/// size only applies to the basic used/free split.
const DETAIL_PAGE_SIZE: u64 = 4096;

pub struct MemoryCollector {
    plan: Arc<dyn ProbePlan>,
}

impl MemoryCollector {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self { plan }
    }

    /// Baseline memory view. On hosts with vm_stat the used/free split is
    /// recomputed from page counts, which tracks the OS's own accounting
    /// more closely than the raw counters.
    pub async fn status(&self) -> Result<MemoryStatus, CollectError> {
        let started = Instant::now();
        let mut system = System::new();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(CollectError::basic("memory", "host reported zero total memory"));
        }

        let mut status = MemoryStatus {
            total: bytes_to_gb(total),
            used: bytes_to_gb(system.used_memory()),
            free: bytes_to_gb(system.free_memory()),
            usage_percent: round2(system.used_memory() as f64 / total as f64 * 100.0),
            available: bytes_to_gb(system.available_memory()),
            swap_total: bytes_to_gb(system.total_swap()),
            swap_used: bytes_to_gb(system.used_swap()),
        };

        let probes = self.plan.memory_basic();
        if !probes.is_empty() {
            let results = run_probe_set(&probes).await;
            if let Some(split) = results
                .first()
                .filter(|r| r.ok)
                .and_then(|r| parse_vm_stat_split(&r.output))
            {
                status.used = split.used_gb;
                status.free = split.free_gb;
                status.usage_percent = round2(split.used_gb / status.total * 100.0);
            }
        }

        if status.usage_percent > 80.0 {
            warn!(usage_percent = status.usage_percent, "memory usage is high");
        }
        debug!(
            total = status.total,
            usage_percent = status.usage_percent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "memory status collected"
        );
        Ok(status)
    }

    /// Enriched memory view: vm_stat page breakdown plus the current
    /// memory-pressure level. A failing vm_stat probe degrades to basic.
    pub async fn detailed_status(&self) -> Result<DetailedMemoryStatus, CollectError> {
        let basic = self.status().await?;
        let probes = self.plan.memory_detail();
        if probes.is_empty() {
            return Ok(basic.into());
        }

        let results = run_probe_set(&probes).await;
        let vm_stat = &results[0];
        if !vm_stat.ok {
            warn!(error = ?vm_stat.error, "vm_stat probe failed, degrading to basic");
            return Ok(basic.into());
        }

        let breakdown = parse_vm_stat_breakdown(&vm_stat.output);
        let pressure = results
            .get(1)
            .filter(|r| r.ok)
            .map(|r| parse_memory_pressure(&r.output))
            .unwrap_or_else(|| "Normal".to_string());

        Ok(DetailedMemoryStatus {
            app_memory: Some(breakdown.app_memory_gb),
            wired_memory: Some(breakdown.wired_gb),
            compressed_memory: Some(breakdown.compressed_gb),
            cached_files: Some(breakdown.cached_files_gb),
            memory_pressure: Some(pressure),
            details: Some(breakdown.pages),
            basic,
        })
    }
}

static PAGE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"page size of (\d+) bytes").expect("page size pattern"));

struct VmStatSplit {
    used_gb: f64,
    free_gb: f64,
}

/// Recomputes used/free from vm_stat page counts. Compressed pages are
/// split evenly between the two sides. Returns `None` when the output
/// carries no page counts at all, so the caller keeps its raw numbers.
fn parse_vm_stat_split(text: &str) -> Option<VmStatSplit> {
    let page_size = PAGE_SIZE
        .captures(text)
        .and_then(|c| c[1].parse::<u64>().ok())
        .unwrap_or(16384);

    let active = vm_stat_value(text, "Pages active");
    let wired = vm_stat_value(text, "Pages wired down");
    let compressed = vm_stat_value(text, "Pages stored in compressor");
    let free = vm_stat_value(text, "Pages free");
    let inactive = vm_stat_value(text, "Pages inactive");
    if active + wired + compressed + free + inactive == 0 {
        return None;
    }

    let half_compressed = compressed as f64 * 0.5;
    let used_pages = active as f64 + wired as f64 + half_compressed;
    let free_pages = free as f64 + inactive as f64 + half_compressed;
    Some(VmStatSplit {
        used_gb: round2(used_pages * page_size as f64 / GIB),
        free_gb: round2(free_pages * page_size as f64 / GIB),
    })
}

struct VmStatBreakdown {
    app_memory_gb: f64,
    wired_gb: f64,
    compressed_gb: f64,
    /// Free pages past the first gigabyte count as file cache.
    cached_files_gb: f64,
    pages: MemoryPageDetails,
}

fn parse_vm_stat_breakdown(text: &str) -> VmStatBreakdown {
    let pages = MemoryPageDetails {
        page_size: DETAIL_PAGE_SIZE,
        pages_active: vm_stat_value(text, "Pages active"),
        pages_inactive: vm_stat_value(text, "Pages inactive"),
        pages_wired: vm_stat_value(text, "Pages wired down"),
        pages_compressed: vm_stat_value(text, "Pages stored in compressor"),
        pages_free: vm_stat_value(text, "Pages free"),
        swap_ins: vm_stat_value(text, "Pageins"),
        swap_outs: vm_stat_value(text, "Pageouts"),
    };

    let to_gb = |count: u64| round2(count as f64 * DETAIL_PAGE_SIZE as f64 / GIB);
    VmStatBreakdown {
        app_memory_gb: to_gb(pages.pages_active + pages.pages_inactive),
        wired_gb: to_gb(pages.pages_wired),
        compressed_gb: to_gb(pages.pages_compressed),
        cached_files_gb: round2((to_gb(pages.pages_free) - 1.0).max(0.0)),
        pages,
    }
}

/// First integer on the first line containing the label; zero when absent.
fn vm_stat_value(text: &str, label: &str) -> u64 {
    text.lines()
        .find(|line| line.contains(label))
        .and_then(first_number)
        .map(|v| v as u64)
        .unwrap_or(0)
}

fn parse_memory_pressure(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("warn") {
        "Warning".to_string()
    } else if lower.contains("critical") || lower.contains("urgent") {
        "Critical".to_string()
    } else {
        "Normal".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_STAT_FIXTURE: &str = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               31854.
Pages active:                            389342.
Pages inactive:                          371444.
Pages speculative:                         2093.
Pages throttled:                              0.
Pages wired down:                        111879.
Pages purgeable:                           4744.
Pages stored in compressor:              143696.
Pageins:                                1333556.
Pageouts:                                 11599.
";

    #[test]
    fn vm_stat_split_uses_header_page_size() {
        let split = parse_vm_stat_split(VM_STAT_FIXTURE).expect("fixture has page counts");
        // used = (389342 + 111879 + 143696/2) * 16384 bytes
        assert_eq!(split.used_gb, 8.74);
        // free = (31854 + 371444 + 143696/2) * 16384 bytes
        assert_eq!(split.free_gb, 7.25);
    }

    #[test]
    fn vm_stat_split_rejects_output_without_page_counts() {
        assert!(parse_vm_stat_split("").is_none());
        assert!(parse_vm_stat_split("vm_stat: command not found").is_none());
    }

    #[test]
    fn vm_stat_breakdown_reads_every_counter() {
        let breakdown = parse_vm_stat_breakdown(VM_STAT_FIXTURE);
        assert_eq!(breakdown.pages.page_size, DETAIL_PAGE_SIZE);
        assert_eq!(breakdown.pages.pages_active, 389_342);
        assert_eq!(breakdown.pages.pages_wired, 111_879);
        assert_eq!(breakdown.pages.swap_ins, 1_333_556);
        assert_eq!(breakdown.pages.swap_outs, 11_599);
        // (389342 + 371444) * 4096 bytes
        assert_eq!(breakdown.app_memory_gb, 2.9);
        assert_eq!(breakdown.wired_gb, 0.43);
        assert_eq!(breakdown.compressed_gb, 0.55);
        // 31854 free pages at 4096 bytes is well under a gigabyte
        assert_eq!(breakdown.cached_files_gb, 0.0);
    }

    #[test]
    fn cached_files_follow_the_page_derived_free_figure() {
        // 1048576 pages * 4096 bytes = 4 GB free, 1 GB of which is headroom
        let breakdown = parse_vm_stat_breakdown("Pages free: 1048576.\n");
        assert_eq!(breakdown.cached_files_gb, 3.0);
    }

    #[test]
    fn vm_stat_breakdown_of_garbage_is_all_zeroes() {
        let breakdown = parse_vm_stat_breakdown("total garbage\nwith no counters");
        assert_eq!(breakdown.pages.pages_active, 0);
        assert_eq!(breakdown.app_memory_gb, 0.0);
    }

    #[test]
    fn memory_pressure_levels_bucket_by_keyword() {
        assert_eq!(parse_memory_pressure("System-wide memory free percentage: 70%"), "Normal");
        assert_eq!(parse_memory_pressure("memory pressure state: warn"), "Warning");
        assert_eq!(parse_memory_pressure("memory pressure state: CRITICAL"), "Critical");
        assert_eq!(parse_memory_pressure("urgent reclaim active"), "Critical");
        // warn outranks critical when both keywords appear
        assert_eq!(
            parse_memory_pressure("state: warn, critical threshold not reached"),
            "Warning"
        );
        assert_eq!(parse_memory_pressure(""), "Normal");
    }
}
