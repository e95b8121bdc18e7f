//! Federation simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::latency::{Coordinates, LatencyModel};

/// Holds raw federation config parsed from YAML file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawFederationConfig {
    pub name: Option<String>,
    pub seed: Option<u64>,
    pub propagation_speed: Option<f64>,
    pub round_trip_factor: Option<f64>,
    pub min_time_between_events: Option<f64>,
    pub storage_read_rate: Option<f64>,
    pub vm_destruction_delay: Option<f64>,
    pub max_allocation_attempts: Option<u32>,
    pub allocation_policy: Option<String>,
    pub host: Option<HostConfig>,
    pub members: Option<Vec<MemberConfig>>,
    pub trace: Option<BotTraceConfig>,
}

/// Capacity of every host of the federation.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    pub pes: u32,
    /// MIPS of each PE.
    pub mips: f64,
    /// RAM in MB.
    pub ram: u64,
    /// Bandwidth in Mbps.
    pub bw: u64,
    /// Storage in MB.
    pub storage: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            pes: 4,
            mips: 3450.,
            ram: 8192,
            bw: 10_000,
            storage: 10_000,
        }
    }
}

fn default_datacenters() -> u32 {
    1
}

fn default_ten() -> u32 {
    10
}

/// Describes a federation member and the workload its users submit.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct MemberConfig {
    pub name: String,
    pub abbreviation: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_datacenters")]
    pub datacenters: u32,
    #[serde(default = "default_ten")]
    pub hosts_per_datacenter: u32,
    #[serde(default = "default_ten")]
    pub users: u32,
    #[serde(default = "default_ten")]
    pub bots_per_user: u32,
    /// Overrides the federation-wide allocation policy for datacenters of this member.
    #[serde(default)]
    pub allocation_policy: Option<String>,
}

impl MemberConfig {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Location of the bag-of-tasks trace.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct BotTraceConfig {
    pub path: String,
    pub line_limit: Option<u64>,
}

/// Represents federation simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct FederationConfig {
    /// Federation name.
    pub name: String,
    /// Seed of the simulation and of randomized allocation policies.
    pub seed: u64,
    /// Signal propagation speed in km/s used by the latency model.
    pub propagation_speed: f64,
    /// Multiplier applied to the distance-based delay.
    pub round_trip_factor: f64,
    /// Minimum time in seconds between two consecutive events of a component.
    pub min_time_between_events: f64,
    /// Storage read rate in MB/s used to compute task input transfer time (no transfer time if absent).
    pub storage_read_rate: Option<f64>,
    /// Delay in seconds between completion of the last VM task and VM destruction.
    pub vm_destruction_delay: f64,
    /// Number of failed placement attempts after which a VM is considered failed.
    pub max_allocation_attempts: u32,
    /// Default VM allocation policy of datacenters.
    pub allocation_policy: String,
    /// Configuration of hosts.
    pub host: HostConfig,
    /// Federation members.
    pub members: Vec<MemberConfig>,
    /// Used bag-of-tasks trace.
    pub trace: Option<BotTraceConfig>,
}

impl FederationConfig {
    /// Creates federation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let raw: RawFederationConfig = serde_yaml::from_str(
            &std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|e| panic!("Can't parse YAML from file {}: {}", file_name, e));
        Self::from_raw(raw)
    }

    /// Creates federation config from YAML string.
    pub fn from_yaml(yaml: &str) -> Self {
        let raw: RawFederationConfig =
            serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("Can't parse YAML config: {}", e));
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawFederationConfig) -> Self {
        Self {
            name: raw.name.unwrap_or_else(|| "federation".to_string()),
            seed: raw.seed.unwrap_or(123),
            propagation_speed: raw.propagation_speed.unwrap_or(200_000.),
            round_trip_factor: raw.round_trip_factor.unwrap_or(2.),
            min_time_between_events: raw.min_time_between_events.unwrap_or(0.00001),
            storage_read_rate: raw.storage_read_rate,
            vm_destruction_delay: raw.vm_destruction_delay.unwrap_or(0.),
            max_allocation_attempts: raw.max_allocation_attempts.unwrap_or(100),
            allocation_policy: raw.allocation_policy.unwrap_or_else(|| "FirstFit".to_string()),
            host: raw.host.unwrap_or_default(),
            members: raw.members.unwrap_or_default(),
            trace: raw.trace,
        }
    }

    pub fn latency_model(&self) -> LatencyModel {
        LatencyModel::new(self.propagation_speed, self.round_trip_factor)
    }

    /// Number of trace rows needed to give every member its bags.
    ///
    /// Bags are assigned round-robin over members, so the limit is `members * bags + position`
    /// maximized over members, unless the trace config sets it explicitly.
    pub fn trace_line_limit(&self) -> u64 {
        if let Some(limit) = self.trace.as_ref().and_then(|t| t.line_limit) {
            return limit;
        }
        let member_count = self.members.len() as u64;
        self.members
            .iter()
            .enumerate()
            .map(|(position, m)| member_count * (m.users as u64 * m.bots_per_user as u64) + position as u64)
            .max()
            .unwrap_or(0)
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self::from_raw(RawFederationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FederationConfig::default();
        assert_eq!(config.seed, 123);
        assert_eq!(config.min_time_between_events, 0.00001);
        assert_eq!(config.allocation_policy, "FirstFit");
        assert_eq!(config.host, HostConfig::default());
        assert!(config.members.is_empty());
        assert_eq!(config.storage_read_rate, None);
    }

    #[test]
    fn test_member_defaults() {
        let config = FederationConfig::from_yaml(
            r#"
allocation_policy: Random[seed=1]
host:
  pes: 2
  mips: 1000
  ram: 4096
  bw: 1000
  storage: 1000
members:
  - name: Universidade Federal de Juiz de Fora
    abbreviation: UFJF
    latitude: -21.776859501069005
    longitude: -43.36904141993076
  - name: Universidade Federal da Bahia
    abbreviation: UFBA
    latitude: -13.00365838049915
    longitude: -38.509963739614044
    hosts_per_datacenter: 3
    allocation_policy: WorstFit
"#,
        );
        assert_eq!(config.allocation_policy, "Random[seed=1]");
        assert_eq!(config.host.pes, 2);
        assert_eq!(config.members.len(), 2);
        assert_eq!(config.members[0].datacenters, 1);
        assert_eq!(config.members[0].hosts_per_datacenter, 10);
        assert_eq!(config.members[0].allocation_policy, None);
        assert_eq!(config.members[1].hosts_per_datacenter, 3);
        assert_eq!(config.members[1].allocation_policy, Some("WorstFit".to_string()));
        // 2 members with 100 bags each, the second one reads up to row 2 * 100 + 1
        assert_eq!(config.trace_line_limit(), 201);
    }
}
