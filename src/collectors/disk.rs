use crate::collectors::{bytes_to_gb, round2, CollectError};
use crate::types::{DiskEntry, DiskIo, DiskStatus};
use std::time::Instant;
use sysinfo::{DiskExt, System, SystemExt};
use tracing::debug;

/// Mounted-filesystem view. No probe plan: the baseline library covers
/// every platform, and there is no richer detail level for disks.
pub struct DiskCollector;

impl DiskCollector {
    pub fn new() -> Self {
        Self
    }

    pub async fn status(&self) -> Result<DiskStatus, CollectError> {
        let started = Instant::now();
        let mut system = System::new();
        system.refresh_disks_list();
        system.refresh_disks();

        let disks: Vec<DiskEntry> = system
            .disks()
            .iter()
            .map(|disk| {
                let size = disk.total_space();
                let available = disk.available_space();
                let used = size.saturating_sub(available);
                DiskEntry {
                    device: disk.name().to_string_lossy().into_owned(),
                    kind: String::from_utf8_lossy(disk.file_system()).into_owned(),
                    size: bytes_to_gb(size),
                    used: bytes_to_gb(used),
                    available: bytes_to_gb(available),
                    usage_percent: if size > 0 {
                        round2(used as f64 / size as f64 * 100.0)
                    } else {
                        0.0
                    },
                    mount: disk.mount_point().to_string_lossy().into_owned(),
                }
            })
            .collect();

        debug!(
            disks = disks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "disk status collected"
        );
        // no io counters exposed by the baseline library; io stays zero
        Ok(DiskStatus {
            disks,
            io: DiskIo::default(),
        })
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_status_has_consistent_accounting() {
        let status = DiskCollector::new().status().await.expect("disk status");
        for disk in &status.disks {
            assert!(disk.usage_percent >= 0.0 && disk.usage_percent <= 100.0);
            // used + available never exceeds size (rounding slack aside)
            assert!(disk.used + disk.available <= disk.size + 0.02);
        }
        assert_eq!(status.io, DiskIo::default());
    }
}
