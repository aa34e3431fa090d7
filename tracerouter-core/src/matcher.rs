use futures::{stream, StreamExt, TryStreamExt};
use regex::Regex;
use tracing::{debug, info};

use crate::{
    compute::ComputeInventory,
    error::{Error, Result},
    models::{
        instances::{Instance, ZoneInstanceGroup, INSTANCE_KIND},
        zones::Zone,
    },
};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Selects running instances whose name matches a pattern from its first
/// character. The pattern does not have to consume the whole name, so
/// `web-` matches `web-01` but not `my-web-01`.
#[derive(Debug, Clone)]
pub struct InstanceMatcher {
    pattern: String,
    regex: Regex,
    concurrency: usize,
}

impl InstanceMatcher {
    /// Compiles the pattern. Nothing touches the network until `discover`.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches_name(&self, name: &str) -> bool {
        // Leftmost-first: a match at 0 is returned whenever one exists.
        self.regex.find(name).is_some_and(|m| m.start() == 0)
    }

    pub fn is_match(&self, instance: &Instance) -> bool {
        instance.is_running() && instance.kind == INSTANCE_KIND && self.matches_name(&instance.name)
    }

    /// Queries every searchable zone of `project` and keeps the matching
    /// instances. Every queried zone appears in the result, even with no
    /// matches.
    pub async fn discover<I>(&self, inventory: &I, project: &str) -> Result<ZoneInstanceGroup>
    where
        I: ComputeInventory + ?Sized,
    {
        let zones: Vec<Zone> = inventory
            .list_zones(project)
            .await?
            .into_iter()
            .filter(Zone::is_searchable)
            .collect();
        debug!("searching {} zones in {project}", zones.len());

        let found: Vec<(String, Vec<Instance>)> = stream::iter(zones)
            .map(|zone| async move {
                let instances = inventory.list_instances(project, &zone.name).await?;
                let matched: Vec<Instance> =
                    instances.into_iter().filter(|i| self.is_match(i)).collect();
                debug!("{}: {} matching instances", zone.name, matched.len());
                Ok::<_, Error>((zone.name, matched))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut group = ZoneInstanceGroup::new();
        for (zone, instances) in found {
            group.insert(zone, instances);
        }
        info!(
            "{} instances matching {:?} across {} zones",
            group.instance_count(),
            self.pattern,
            group.len()
        );

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::models::{
        instances::{AccessConfig, InstanceStatus, NetworkInterface},
        zones::{ZoneStatus, ZONE_KIND},
    };

    #[derive(Default)]
    struct FakeInventory {
        zones: Vec<Zone>,
        instances: HashMap<String, Vec<Instance>>,
        zone_calls: AtomicUsize,
        instance_calls: AtomicUsize,
        queried: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ComputeInventory for FakeInventory {
        async fn list_zones(&self, _project: &str) -> Result<Vec<Zone>> {
            self.zone_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.zones.clone())
        }

        async fn list_instances(&self, _project: &str, zone: &str) -> Result<Vec<Instance>> {
            self.instance_calls.fetch_add(1, Ordering::SeqCst);
            self.queried.lock().unwrap().push(zone.to_string());
            Ok(self.instances.get(zone).cloned().unwrap_or_default())
        }
    }

    fn zone(name: &str, status: &str) -> Zone {
        Zone {
            kind: ZONE_KIND.into(),
            name: name.into(),
            status: ZoneStatus::from(status.to_string()),
        }
    }

    fn instance(name: &str, status: &str) -> Instance {
        Instance {
            kind: INSTANCE_KIND.into(),
            name: name.into(),
            status: InstanceStatus::from(status.to_string()),
            network_interfaces: vec![NetworkInterface {
                access_configs: vec![AccessConfig {
                    nat_ip: Some("10.0.0.1".into()),
                }],
            }],
        }
    }

    #[test]
    fn test_prefix_match_semantics() {
        let matcher = InstanceMatcher::new("web-").unwrap();
        assert!(matcher.matches_name("web-01"));
        assert!(!matcher.matches_name("my-web-01"));

        let matcher = InstanceMatcher::new("worker").unwrap();
        assert!(matcher.matches_name("worker-1-extra"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let matcher = InstanceMatcher::new("api|web").unwrap();
        assert!(matcher.matches_name("web-1"));
        assert!(matcher.matches_name("api-1"));
        assert!(!matcher.matches_name("my-web-1"));
    }

    #[test]
    fn test_stray_paren_is_rejected() {
        assert!(matches!(
            InstanceMatcher::new("a)(b"),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn test_is_match_requires_running_and_kind() {
        let matcher = InstanceMatcher::new("db").unwrap();
        assert!(matcher.is_match(&instance("db-1", "RUNNING")));
        assert!(!matcher.is_match(&instance("db-1", "STOPPING")));

        let mut other_kind = instance("db-1", "RUNNING");
        other_kind.kind = "compute#disk".into();
        assert!(!matcher.is_match(&other_kind));
    }

    #[test]
    fn test_unbalanced_group_is_rejected() {
        assert!(matches!(
            InstanceMatcher::new("(unbalanced"),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn test_verbose_pattern_with_trailing_comment() {
        let matcher = InstanceMatcher::new("(?x)web # web tier").unwrap();
        assert!(matcher.matches_name("web-1"));
        assert!(!matcher.matches_name("my-web-1"));
    }

    #[test]
    fn test_later_match_does_not_count() {
        let matcher = InstanceMatcher::new("[0-9]+").unwrap();
        assert!(matcher.matches_name("42-web"));
        assert!(!matcher.matches_name("web-42"));
    }

    #[tokio::test]
    async fn test_no_up_zones_gives_empty_group() {
        let inventory = FakeInventory {
            zones: vec![zone("us-central1-a", "DOWN")],
            ..Default::default()
        };
        let matcher = InstanceMatcher::new(".*").unwrap();
        let group = matcher.discover(&inventory, "demo").await.unwrap();
        assert!(group.is_empty());
        assert_eq!(inventory.instance_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_discover_scenario() {
        let mut instances = HashMap::new();
        instances.insert(
            "us-central1-a".to_string(),
            vec![
                instance("worker-1", "RUNNING"),
                instance("worker-2", "RUNNING"),
                instance("worker-3", "TERMINATED"),
                instance("worker-x", "RUNNING"),
                instance("db-1", "RUNNING"),
            ],
        );
        instances.insert(
            "europe-west1-b".to_string(),
            vec![instance("worker-9", "RUNNING")],
        );
        let inventory = FakeInventory {
            zones: vec![zone("us-central1-a", "UP"), zone("europe-west1-b", "DOWN")],
            instances,
            ..Default::default()
        };

        let matcher = InstanceMatcher::new("^worker-[0-9]+$").unwrap();
        let group = matcher.discover(&inventory, "demo").await.unwrap();

        assert_eq!(group.zones().collect::<Vec<_>>(), vec!["us-central1-a"]);
        let names: Vec<&str> = group
            .get("us-central1-a")
            .unwrap()
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["worker-1", "worker-2"]);
        assert_eq!(
            *inventory.queried.lock().unwrap(),
            vec!["us-central1-a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zone_with_no_matches_is_kept() {
        let inventory = FakeInventory {
            zones: vec![zone("us-east1-b", "UP"), zone("us-west1-a", "UP")],
            ..Default::default()
        };
        let matcher = InstanceMatcher::new("web")
            .unwrap()
            .with_concurrency(1);
        let group = matcher.discover(&inventory, "demo").await.unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.instance_count(), 0);
        assert!(group.contains_zone("us-west1-a"));
    }
}
