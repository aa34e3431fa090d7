use std::collections::BTreeMap;

use serde::Deserialize;

pub const INSTANCE_KIND: &str = "compute#instance";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum InstanceStatus {
    Running,
    Other(String),
}

impl From<String> for InstanceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "RUNNING" => InstanceStatus::Running,
            _ => InstanceStatus::Other(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessConfig {
    #[serde(rename = "natIP")]
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkInterface {
    #[serde(rename = "accessConfigs", default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Instance {
    pub kind: String,
    pub name: String,
    pub status: InstanceStatus,
    #[serde(rename = "networkInterfaces", default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

impl Instance {
    /// First public (NAT) address found across the instance's interfaces.
    pub fn public_address(&self) -> Option<&str> {
        self.network_interfaces
            .iter()
            .flat_map(|iface| iface.access_configs.iter())
            .find_map(|cfg| cfg.nat_ip.as_deref().filter(|ip| !ip.is_empty()))
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }
}

/// Matched instances keyed by the zone they were found in.
///
/// A zone that was queried but had no matches is still present with an
/// empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneInstanceGroup(BTreeMap<String, Vec<Instance>>);

impl ZoneInstanceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, zone: impl Into<String>, instances: Vec<Instance>) {
        self.0.insert(zone.into(), instances);
    }

    pub fn get(&self, zone: &str) -> Option<&[Instance]> {
        self.0.get(zone).map(Vec::as_slice)
    }

    pub fn contains_zone(&self, zone: &str) -> bool {
        self.0.contains_key(zone)
    }

    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Instance])> {
        self.0.iter().map(|(z, i)| (z.as_str(), i.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn instance_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
