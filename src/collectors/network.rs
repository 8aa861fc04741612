use crate::collectors::{first_number, now_millis, round2, CollectError, SAMPLE_WINDOW};
use crate::platform::ProbePlan;
use crate::probe::run_probe_set;
use crate::types::{
    Bandwidth, BandwidthPeaks, BandwidthSample, ConnectionAnalysis, ConnectionEntry,
    DetailedNetworkStatus, InterfaceDetail, InterfaceStats, NetworkInterface, NetworkStatus,
    PacketCounters, ProtocolCounters, ProtocolStats, QualityMetrics, RealTimeStats, WifiDetails,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;
use std::sync::Arc;
use sysinfo::{NetworkExt, NetworksExt, System, SystemExt};
use tokio::time;
use tracing::{debug, warn};

const NETWORK_DETAIL_PROBES: usize = 6;

pub struct NetworkCollector {
    plan: Arc<dyn ProbePlan>,
}

impl NetworkCollector {
    pub fn new(plan: Arc<dyn ProbePlan>) -> Self {
        Self { plan }
    }

    /// Baseline interface list and counters. Per-second rates come from
    /// the delta between two refreshes scaled by the elapsed window.
    pub async fn status(&self) -> Result<NetworkStatus, CollectError> {
        let started = Instant::now();
        let mut system = System::new();
        system.refresh_networks_list();
        system.refresh_networks();
        let window_start = Instant::now();
        time::sleep(SAMPLE_WINDOW).await;
        system.refresh_networks();
        let window = window_start.elapsed().as_secs_f64().max(0.001);

        let mut interfaces = Vec::new();
        let mut stats = Vec::new();
        for (name, data) in system.networks() {
            interfaces.push(NetworkInterface {
                iface: name.clone(),
                ip4: String::new(),
                ip6: String::new(),
                mac: data.mac_address().to_string(),
                speed: 0.0,
                operstate: "unknown".to_string(),
            });
            stats.push(InterfaceStats {
                iface: name.clone(),
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
                rx_sec: round2(data.received() as f64 / window),
                tx_sec: round2(data.transmitted() as f64 / window),
            });
        }
        // HashMap iteration order is arbitrary; keep output stable
        interfaces.sort_by(|a, b| a.iface.cmp(&b.iface));
        stats.sort_by(|a, b| a.iface.cmp(&b.iface));

        debug!(
            interfaces = interfaces.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "network status collected"
        );
        Ok(NetworkStatus { interfaces, stats })
    }

    /// Enriched network view: socket table, protocol counters, per-process
    /// traffic, interface flags, Wi-Fi link state and a short ping sample.
    /// Each probe that fails simply leaves its section empty or absent.
    pub async fn detailed_status(&self) -> Result<DetailedNetworkStatus, CollectError> {
        let basic = self.status().await?;
        let probes = self.plan.network_detail();
        if probes.len() < NETWORK_DETAIL_PROBES {
            if !probes.is_empty() {
                warn!(probes = probes.len(), "incomplete network probe plan, degrading to basic");
            }
            return Ok(basic.into());
        }

        let results = run_probe_set(&probes).await;
        let text = |idx: usize| {
            if results[idx].ok {
                results[idx].output.as_str()
            } else {
                ""
            }
        };

        let connection_analysis = ConnectionAnalysis {
            protocol_stats: parse_protocol_stats(text(1)),
            ..parse_connections(text(0))
        };
        let real_time_stats = build_real_time_stats(text(2), &basic.stats);
        let interface_details = parse_ifconfig(text(3));
        let wifi_details = parse_wifi_info(text(4));
        let quality_metrics = parse_ping_quality(text(5));

        Ok(DetailedNetworkStatus {
            basic,
            real_time_stats: Some(real_time_stats),
            connection_analysis: Some(connection_analysis),
            wifi_details,
            quality_metrics: Some(quality_metrics),
            interface_details: Some(interface_details),
        })
    }
}

/// Socket table scan. Lines short of the six netstat columns are skipped;
/// wildcard remotes are not connections.
fn parse_connections(netstat_text: &str) -> ConnectionAnalysis {
    let mut analysis = ConnectionAnalysis::default();
    for line in netstat_text.lines() {
        let is_tcp = line.contains("tcp");
        let is_udp = line.contains("udp");
        if !is_tcp && !is_udp {
            continue;
        }
        analysis.active_connections += 1;
        if line.contains("ESTABLISHED") {
            analysis.established_connections += 1;
        }
        if line.contains("LISTEN") {
            analysis.listening_ports += 1;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 6 && analysis.top_connections.len() < 10 {
            let remote = parts[4];
            if !remote.contains('*') {
                analysis.top_connections.push(ConnectionEntry {
                    protocol: parts[0].to_string(),
                    local_address: parts[3].to_string(),
                    remote_address: remote.to_string(),
                    state: parts[5].to_string(),
                });
            }
        }
    }
    analysis
}

/// netstat -s groups counters under unindented `tcp:` / `udp:` headers.
fn parse_protocol_stats(stats_text: &str) -> ProtocolStats {
    let mut stats = ProtocolStats::default();
    let mut section = "";
    for line in stats_text.lines() {
        if !line.starts_with(char::is_whitespace) && line.trim_end().ends_with(':') {
            section = line.trim().trim_end_matches(':');
            continue;
        }
        let counters = match section {
            "tcp" => &mut stats.tcp,
            "udp" => &mut stats.udp,
            _ => continue,
        };
        if line.contains("packets sent") {
            counters.packets_sent = first_number(line).map(|v| v as u64).unwrap_or(0);
        } else if line.contains("packets received") {
            counters.packets_received = first_number(line).map(|v| v as u64).unwrap_or(0);
        }
    }
    stats
}

static BYTE_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(KiB|MiB|GiB|B)\b").expect("byte value pattern"));

/// Sums per-process traffic from a one-shot nettop sample. Lines with two
/// byte figures contribute the first as inbound and the second as outbound.
fn build_real_time_stats(nettop_text: &str, stats: &[InterfaceStats]) -> RealTimeStats {
    let mut bytes_in = 0.0;
    let mut bytes_out = 0.0;
    for line in nettop_text.lines() {
        let values: Vec<f64> = BYTE_VALUE
            .captures_iter(line)
            .map(|caps| {
                let value: f64 = caps[1].parse().unwrap_or(0.0);
                match &caps[2] {
                    "KiB" => value * 1024.0,
                    "MiB" => value * 1024.0 * 1024.0,
                    "GiB" => value * 1024.0 * 1024.0 * 1024.0,
                    _ => value,
                }
            })
            .collect();
        if values.len() >= 2 {
            bytes_in += values[0];
            bytes_out += values[1];
        }
    }

    let download = round2(bytes_in * 8.0 / (1024.0 * 1024.0));
    let upload = round2(bytes_out * 8.0 / (1024.0 * 1024.0));
    let active_interface = stats
        .iter()
        .max_by(|a, b| (a.rx_bytes + a.tx_bytes).cmp(&(b.rx_bytes + b.tx_bytes)))
        .map(|s| s.iface.clone())
        .unwrap_or_default();

    let sample = BandwidthSample {
        timestamp: now_millis(),
        download_mbps: download,
        upload_mbps: upload,
        total_mbps: round2(download + upload),
    };
    RealTimeStats {
        active_interface,
        current_bandwidth: Bandwidth {
            download,
            upload,
            total: round2(download + upload),
        },
        peaks: BandwidthPeaks {
            max_download: download,
            max_upload: upload,
            avg_download: download,
            avg_upload: upload,
        },
        history: vec![sample],
    }
}

static IFACE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z][a-z0-9]*):\s+flags=").expect("iface header pattern"));
static MTU: Lazy<Regex> = Lazy::new(|| Regex::new(r"mtu (\d+)").expect("mtu pattern"));

fn parse_ifconfig(text: &str) -> Vec<InterfaceDetail> {
    let mut details: Vec<InterfaceDetail> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = IFACE_HEADER.captures(line) {
            let iface = caps[1].to_string();
            details.push(InterfaceDetail {
                kind: interface_kind(&iface).to_string(),
                iface,
                mtu: MTU
                    .captures(line)
                    .and_then(|c| c[1].parse().ok())
                    .unwrap_or(1500),
                duplex: "full".to_string(),
                carrier: false,
                packets: PacketCounters::default(),
            });
        } else if let Some(current) = details.last_mut() {
            if line.contains("status: active") {
                current.carrier = true;
            }
        }
    }
    details
}

fn interface_kind(iface: &str) -> &'static str {
    if iface.starts_with("lo") {
        "loopback"
    } else if iface.starts_with("en") {
        "ethernet"
    } else if iface.starts_with("utun") {
        "tunnel"
    } else if iface.starts_with("awdl") {
        "airdrop"
    } else {
        "unknown"
    }
}

/// airport -I prints `key: value` pairs. Field names vary across OS
/// releases, so the RSSI lookup accepts both spellings.
fn parse_wifi_info(airport_text: &str) -> Option<WifiDetails> {
    let mut fields = HashMap::new();
    for line in airport_text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let ssid = fields.get("SSID").filter(|s| !s.is_empty())?.clone();
    let rssi = fields
        .get("agrCtlRSSI")
        .or_else(|| fields.get("RSSI"))
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let channel = fields
        .get("channel")
        .and_then(|v| first_number(v))
        .map(|v| v as u32)
        .unwrap_or(0);
    let max_rate = fields
        .get("maxRate")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let tx_rate = fields
        .get("lastTxRate")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let security = fields
        .get("link auth")
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());

    Some(WifiDetails {
        ssid,
        signal_strength: rssi,
        signal_quality: signal_quality(rssi),
        channel,
        frequency: channel_to_frequency(channel),
        link_speed: tx_rate,
        transmit_rate: tx_rate,
        receive_rate: max_rate,
        security,
    })
}

/// Maps RSSI to a 0..100 quality figure in fixed 10 dBm bands.
fn signal_quality(rssi: i64) -> u32 {
    if rssi >= -50 {
        100
    } else if rssi >= -60 {
        80
    } else if rssi >= -70 {
        60
    } else if rssi >= -80 {
        40
    } else if rssi >= -90 {
        20
    } else {
        0
    }
}

/// 2.4 GHz channels 1..14, 5 GHz channels from 36 up. Unknown channels
/// map to zero rather than a guess.
fn channel_to_frequency(channel: u32) -> u32 {
    match channel {
        1..=14 => 2412 + (channel - 1) * 5,
        c if c >= 36 => 5180 + (c - 36) * 5,
        _ => 0,
    }
}

static PACKET_LOSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:\.\d+)?% packet loss").expect("packet loss pattern"));
static RTT_STATS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"min/avg/max/stddev = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+)").expect("rtt pattern")
});

/// A ping that produced no output or announced its own failure counts as
/// full packet loss, not as an error.
fn parse_ping_quality(ping_text: &str) -> QualityMetrics {
    if ping_text.trim().is_empty() || ping_text.contains("ping failed") {
        return QualityMetrics {
            latency: 0.0,
            jitter: 0.0,
            packet_loss: 100.0,
            dns_resolution_time: 0.0,
        };
    }

    let packet_loss = PACKET_LOSS
        .captures(ping_text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);
    let (latency, jitter) = RTT_STATS
        .captures(ping_text)
        .map(|c| {
            (
                c[2].parse().unwrap_or(0.0),
                c[4].parse().unwrap_or(0.0),
            )
        })
        .unwrap_or((0.0, 0.0));

    QualityMetrics {
        latency,
        jitter,
        packet_loss,
        dns_resolution_time: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_quality_bands() {
        assert_eq!(signal_quality(-50), 100);
        assert_eq!(signal_quality(-55), 80);
        assert_eq!(signal_quality(-65), 60);
        assert_eq!(signal_quality(-75), 40);
        assert_eq!(signal_quality(-85), 20);
        assert_eq!(signal_quality(-95), 0);
    }

    #[test]
    fn channel_frequency_mapping() {
        assert_eq!(channel_to_frequency(1), 2412);
        assert_eq!(channel_to_frequency(6), 2437);
        assert_eq!(channel_to_frequency(11), 2462);
        assert_eq!(channel_to_frequency(36), 5180);
        assert_eq!(channel_to_frequency(149), 5745);
        assert_eq!(channel_to_frequency(0), 0);
        assert_eq!(channel_to_frequency(20), 0);
    }

    #[test]
    fn ping_output_parses_into_quality_metrics() {
        let text = "\
PING 8.8.8.8 (8.8.8.8): 56 data bytes
64 bytes from 8.8.8.8: icmp_seq=0 ttl=117 time=14.3 ms
3 packets transmitted, 3 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 13.9/14.4/15.0/0.45 ms
";
        let quality = parse_ping_quality(text);
        assert_eq!(quality.latency, 14.4);
        assert_eq!(quality.jitter, 0.45);
        assert_eq!(quality.packet_loss, 0.0);
    }

    #[test]
    fn failed_ping_means_full_packet_loss() {
        let quality = parse_ping_quality("ping failed");
        assert_eq!(quality.packet_loss, 100.0);
        assert_eq!(quality.latency, 0.0);
        assert_eq!(parse_ping_quality("").packet_loss, 100.0);
    }

    #[test]
    fn netstat_lines_bucket_into_connection_counts() {
        let text = "\
Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  192.168.1.5.52922      17.57.146.52.5223      ESTABLISHED
tcp4       0      0  127.0.0.1.631          *.*                    LISTEN
udp4       0      0  *.5353                 *.*
tcp6       0      0  ::1.8790               ::1.52100              ESTABLISHED
";
        let analysis = parse_connections(text);
        assert_eq!(analysis.active_connections, 4);
        assert_eq!(analysis.established_connections, 2);
        assert_eq!(analysis.listening_ports, 1);
        // wildcard remotes are excluded from top connections
        assert_eq!(analysis.top_connections.len(), 2);
        assert_eq!(analysis.top_connections[0].remote_address, "17.57.146.52.5223");
        assert_eq!(analysis.top_connections[0].state, "ESTABLISHED");
    }

    #[test]
    fn protocol_stats_read_from_their_sections() {
        let text = "\
tcp:
\t123456 packets sent
\t98765 packets received
udp:
\t555 packets sent
\t777 packets received
ip:
\t1 packets sent
";
        let stats = parse_protocol_stats(text);
        assert_eq!(stats.tcp.packets_sent, 123456);
        assert_eq!(stats.tcp.packets_received, 98765);
        assert_eq!(stats.udp.packets_sent, 555);
        assert_eq!(stats.udp.packets_received, 777);
    }

    #[test]
    fn nettop_byte_figures_sum_into_bandwidth() {
        let text = "\
time interface state bytes_in bytes_out
firefox.123 1.5 MiB 512 KiB
Spotify.456 256 KiB 128 KiB
header only line
";
        let stats = vec![InterfaceStats {
            iface: "en0".to_string(),
            rx_bytes: 100,
            tx_bytes: 100,
            ..InterfaceStats::default()
        }];
        let real_time = build_real_time_stats(text, &stats);
        assert_eq!(real_time.active_interface, "en0");
        // 1.5 MiB + 256 KiB inbound
        let expected_in = round2((1.5 * 1024.0 * 1024.0 + 256.0 * 1024.0) * 8.0 / (1024.0 * 1024.0));
        assert_eq!(real_time.current_bandwidth.download, expected_in);
        assert_eq!(real_time.history.len(), 1);
    }

    #[test]
    fn ifconfig_blocks_parse_into_interface_details() {
        let text = "\
lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tstatus: active
utun0: flags=8051<UP,POINTOPOINT,RUNNING,MULTICAST> mtu 1380
";
        let details = parse_ifconfig(text);
        assert_eq!(details.len(), 3);
        assert_eq!(details[0].iface, "lo0");
        assert_eq!(details[0].kind, "loopback");
        assert_eq!(details[0].mtu, 16384);
        assert!(!details[0].carrier);
        assert_eq!(details[1].kind, "ethernet");
        assert!(details[1].carrier);
        assert_eq!(details[2].kind, "tunnel");
        assert_eq!(details[2].mtu, 1380);
    }

    #[test]
    fn wifi_details_need_an_ssid() {
        let text = "\
     agrCtlRSSI: -62
     agrExtRSSI: 0
           SSID: HomeNet
        channel: 11
        maxRate: 1300
     lastTxRate: 878
      link auth: wpa2-psk
";
        let wifi = parse_wifi_info(text).expect("ssid present");
        assert_eq!(wifi.ssid, "HomeNet");
        assert_eq!(wifi.signal_strength, -62);
        assert_eq!(wifi.signal_quality, 60);
        assert_eq!(wifi.channel, 11);
        assert_eq!(wifi.frequency, 2462);
        assert_eq!(wifi.transmit_rate, 878);
        assert_eq!(wifi.receive_rate, 1300);
        assert_eq!(wifi.security, "wpa2-psk");

        assert!(parse_wifi_info("AirPort: Off").is_none());
        assert!(parse_wifi_info("").is_none());
    }
}
