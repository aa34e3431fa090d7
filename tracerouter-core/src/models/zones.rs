use serde::Deserialize;

pub const ZONE_KIND: &str = "compute#zone";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ZoneStatus {
    Up,
    Other(String),
}

impl From<String> for ZoneStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UP" => ZoneStatus::Up,
            _ => ZoneStatus::Other(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub kind: String,
    pub name: String,
    pub status: ZoneStatus,
}

impl Zone {
    /// Only zones that are up and reported as zone records get searched.
    pub fn is_searchable(&self) -> bool {
        self.status == ZoneStatus::Up && self.kind == ZONE_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_json() {
        let input = r#"{"kind": "compute#zone", "name": "us-central1-a", "status": "UP", "region": "x"}"#;
        let zone: Zone = serde_json::from_str(input).unwrap();
        assert_eq!(
            zone,
            Zone {
                kind: ZONE_KIND.into(),
                name: "us-central1-a".into(),
                status: ZoneStatus::Up,
            }
        );
        assert!(zone.is_searchable());
    }

    #[test]
    fn test_down_zone_not_searchable() {
        let input = r#"{"kind": "compute#zone", "name": "europe-west1-a", "status": "DOWN"}"#;
        let zone: Zone = serde_json::from_str(input).unwrap();
        assert_eq!(zone.status, ZoneStatus::Other("DOWN".into()));
        assert!(!zone.is_searchable());
    }

    #[test]
    fn test_zone_missing_status_is_rejected() {
        let input = r#"{"kind": "compute#zone", "name": "us-east1-b"}"#;
        assert!(serde_json::from_str::<Zone>(input).is_err());
    }
}
