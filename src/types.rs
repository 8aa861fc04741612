//! Typed metric model for every telemetry domain.
//!
//! Field names serialize in camelCase to stay wire-compatible with the
//! tool's established JSON shape. Required numeric fields default to zero
//! so every record is constructible even when no probe succeeded; optional
//! enrichments are `Option<T>` and only serialized when present.
//!
//! Each `Detailed*` record embeds its basic record via `#[serde(flatten)]`:
//! the detailed view is always a strict superset of the basic one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- CPU ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStatus {
    pub usage: f64,
    pub cores: u32,
    /// Clock speed in GHz.
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub load_average: Vec<f64>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedCpuStatus {
    #[serde(flatten)]
    pub basic: CpuStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<CpuTemperatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<CpuPower>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequencies: Option<CpuFrequencies>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerStats>,
}

impl From<CpuStatus> for DetailedCpuStatus {
    fn from(basic: CpuStatus) -> Self {
        Self {
            basic,
            physical_cores: None,
            logical_cores: None,
            performance_cores: None,
            efficiency_cores: None,
            temperatures: None,
            power: None,
            frequencies: None,
            scheduler: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTemperatures {
    pub cpu: f64,
    pub cores: Vec<f64>,
    pub max: f64,
    pub sensors: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuPower {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ane_power: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuFrequencies {
    /// Minimum clock in GHz.
    pub base: f64,
    /// Maximum clock in GHz.
    pub boost: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub run_queue: u64,
    pub context_switches: u64,
    pub interrupts: u64,
}

// --- Memory ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub usage_percent: f64,
    pub available: f64,
    pub swap_total: f64,
    pub swap_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMemoryStatus {
    #[serde(flatten)]
    pub basic: MemoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wired_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_memory: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_files: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_pressure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<MemoryPageDetails>,
}

impl From<MemoryStatus> for DetailedMemoryStatus {
    fn from(basic: MemoryStatus) -> Self {
        Self {
            basic,
            app_memory: None,
            wired_memory: None,
            compressed_memory: None,
            cached_files: None,
            memory_pressure: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPageDetails {
    pub page_size: u64,
    pub pages_active: u64,
    pub pages_inactive: u64,
    pub pages_wired: u64,
    pub pages_compressed: u64,
    pub pages_free: u64,
    pub swap_ins: u64,
    pub swap_outs: u64,
}

// --- GPU ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuStatus {
    pub controllers: Vec<GpuController>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuController {
    pub model: String,
    pub vendor: String,
    /// VRAM in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vram: Option<f64>,
    /// Used VRAM in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<f64>,
    /// Total VRAM in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization_gpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_gpu: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedGpuStatus {
    #[serde(flatten)]
    pub basic: GpuStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<GpuDetails>,
}

impl From<GpuStatus> for DetailedGpuStatus {
    fn from(basic: GpuStatus) -> Self {
        Self {
            basic,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuDetails {
    pub chipset: String,
    pub total_cores: u32,
    pub metal_support: String,
    pub utilization: GpuUtilization,
    pub memory: GpuMemory,
    pub thermal: GpuThermal,
    pub power: GpuPowerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_processes: Option<Vec<GpuProcess>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttling: Option<GpuThrottling>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuUtilization {
    pub overall: f64,
    pub performance_state: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuMemory {
    pub total_mb: f64,
    pub used_mb: f64,
    pub free_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_mb: Option<f64>,
    pub utilization_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_utilization_percent: Option<f64>,
    /// Bandwidth in GB/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuThermal {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermal_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuPowerInfo {
    pub usage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuProcess {
    pub pid: u32,
    pub name: String,
    pub command_queue_count: u64,
    pub accumulated_gpu_time: u64,
    pub api: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuThrottling {
    pub is_throttling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_percent: Option<f64>,
}

// --- Network ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub interfaces: Vec<NetworkInterface>,
    pub stats: Vec<InterfaceStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub iface: String,
    pub ip4: String,
    pub ip6: String,
    pub mac: String,
    pub speed: f64,
    pub operstate: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    pub iface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_sec: f64,
    pub tx_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedNetworkStatus {
    #[serde(flatten)]
    pub basic: NetworkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_stats: Option<RealTimeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_analysis: Option<ConnectionAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_details: Option<WifiDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_details: Option<Vec<InterfaceDetail>>,
}

impl From<NetworkStatus> for DetailedNetworkStatus {
    fn from(basic: NetworkStatus) -> Self {
        Self {
            basic,
            real_time_stats: None,
            connection_analysis: None,
            wifi_details: None,
            quality_metrics: None,
            interface_details: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeStats {
    pub active_interface: String,
    pub current_bandwidth: Bandwidth,
    pub history: Vec<BandwidthSample>,
    pub peaks: BandwidthPeaks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bandwidth {
    pub download: f64,
    pub upload: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthSample {
    pub timestamp: i64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub total_mbps: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthPeaks {
    pub max_download: f64,
    pub max_upload: f64,
    pub avg_download: f64,
    pub avg_upload: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAnalysis {
    pub active_connections: u64,
    pub established_connections: u64,
    pub listening_ports: u64,
    pub top_connections: Vec<ConnectionEntry>,
    pub protocol_stats: ProtocolStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    pub protocol: String,
    pub local_address: String,
    pub remote_address: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStats {
    pub tcp: ProtocolCounters,
    pub udp: ProtocolCounters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolCounters {
    pub packets_sent: u64,
    pub packets_received: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiDetails {
    pub ssid: String,
    pub signal_strength: i64,
    pub signal_quality: u32,
    pub channel: u32,
    /// Channel center frequency in MHz.
    pub frequency: u32,
    pub link_speed: u32,
    pub transmit_rate: u32,
    pub receive_rate: u32,
    pub security: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub latency: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub dns_resolution_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDetail {
    pub iface: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mtu: u32,
    pub duplex: String,
    pub carrier: bool,
    pub packets: PacketCounters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketCounters {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

// --- Disk ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStatus {
    pub disks: Vec<DiskEntry>,
    pub io: DiskIo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskEntry {
    pub device: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: f64,
    pub used: f64,
    pub available: f64,
    pub usage_percent: f64,
    pub mount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskIo {
    pub reads: u64,
    pub writes: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

// --- Processes ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu: f64,
    /// Resident memory in MB.
    pub memory: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProcessStatus {
    pub summary: ProcessSummary,
    pub top_processes: TopProcesses,
    pub process_tree: ProcessTree,
    pub system_services: SystemServices,
    pub security_analysis: SecurityAnalysis,
    pub performance_impact: PerformanceImpact,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub total_processes: u64,
    pub running_processes: u64,
    pub sleeping_processes: u64,
    pub zombie_processes: u64,
    pub total_threads: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProcesses {
    pub by_cpu: Vec<DetailedProcessEntry>,
    pub by_memory: Vec<MemoryProcessEntry>,
    pub by_file_descriptors: Vec<FdProcessEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProcessEntry {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub command: String,
    pub user: String,
    pub cpu: f64,
    /// Resident memory in MB.
    pub memory: f64,
    pub memory_percent: f64,
    pub memory_details: MemoryDetails,
    pub time_info: TimeInfo,
    pub resources: ProcessResources,
    pub status: ProcessStateInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDetails {
    /// Resident set size in KB.
    pub rss: u64,
    /// Virtual size in KB.
    pub vsz: u64,
    /// Estimated shared portion in KB.
    pub shared: u64,
    /// Estimated private portion in KB.
    #[serde(rename = "private")]
    pub private_kb: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub cpu_time: String,
    pub start_time: i64,
    pub run_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResources {
    pub threads: u64,
    pub file_descriptors: u64,
    pub open_files: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStateInfo {
    pub state: String,
    pub priority: i64,
    pub nice: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryProcessEntry {
    pub pid: u32,
    pub name: String,
    pub memory: f64,
    pub memory_percent: f64,
    pub cpu: f64,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FdProcessEntry {
    pub pid: u32,
    pub name: String,
    pub file_descriptors: u64,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTree {
    pub top_parents: Vec<ParentProcess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentProcess {
    pub pid: u32,
    pub name: String,
    pub child_count: u64,
    pub total_cpu_usage: f64,
    pub total_memory_usage: f64,
    pub children: Vec<ChildProcess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProcess {
    pub pid: u32,
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemServices {
    pub critical_services: Vec<CriticalService>,
    pub heavy_services: Vec<HeavyService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalService {
    pub name: String,
    pub pid: u32,
    pub status: String,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeavyService {
    pub name: String,
    pub pid: u32,
    pub cpu: f64,
    pub memory: f64,
    pub impact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAnalysis {
    pub root_processes: Vec<RootProcess>,
    pub suspicious_processes: Vec<SuspiciousProcess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootProcess {
    pub pid: u32,
    pub name: String,
    pub command: String,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousProcess {
    pub pid: u32,
    pub name: String,
    pub reason: String,
    pub cpu: f64,
    pub memory: f64,
    pub file_descriptors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceImpact {
    pub cpu_bottlenecks: Vec<CpuBottleneck>,
    pub memory_bottlenecks: Vec<MemoryBottleneck>,
    pub io_intensive_processes: Vec<IoIntensiveProcess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuBottleneck {
    pub pid: u32,
    pub name: String,
    pub cpu: f64,
    pub impact: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBottleneck {
    pub pid: u32,
    pub name: String,
    pub memory: f64,
    pub memory_percent: f64,
    pub impact: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IoIntensiveProcess {
    pub pid: u32,
    pub name: String,
    pub file_descriptors: u64,
}

// --- Overview & analysis ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemOverview {
    pub timestamp: i64,
    pub cpu: CpuStatus,
    pub memory: MemoryStatus,
    pub gpu: GpuStatus,
    pub network: NetworkStatus,
    pub disk: DiskStatus,
    pub processes: Vec<ProcessInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub performance: PerformanceTier,
    pub score: i64,
    pub bottlenecks: Vec<String>,
    pub recommendations: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Moderate,
    Poor,
    Critical,
}
