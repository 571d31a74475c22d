//! Node records and the write payloads that create or modify them.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

/// A registered backend endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique key across all nodes.
    pub owner: String,
    pub name: String,
    pub ip: String,
    pub url: String,
    #[serde(default)]
    pub comments: String,
    pub enabled: bool,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// The fields handed out to clients; bookkeeping stays internal.
    pub fn public(&self) -> PublicNode {
        PublicNode {
            owner: self.owner.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            ip: self.ip.clone(),
        }
    }
}

/// Connection info returned by the selection and lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicNode {
    pub owner: String,
    pub name: String,
    pub url: String,
    pub ip: String,
}

/// Upsert payload. Required fields are optional here so that every missing
/// one can be reported at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFields {
    pub owner: Option<String>,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub url: Option<String>,
    pub comments: Option<String>,
    pub enabled: Option<bool>,
}

/// Upsert payload with the required fields checked.
#[derive(Debug, Clone)]
pub struct ValidNodeFields {
    pub owner: String,
    pub name: String,
    pub ip: String,
    pub url: String,
    pub comments: String,
    pub enabled: bool,
}

impl NodeFields {
    /// Check that `owner`, `name`, `ip` and `url` are present and non-empty.
    pub fn validate(self) -> Result<ValidNodeFields, RegistryError> {
        fn present(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        let owner = present(self.owner);
        let name = present(self.name);
        let ip = present(self.ip);
        let url = present(self.url);

        let mut missing = Vec::new();
        if owner.is_none() {
            missing.push("owner");
        }
        if name.is_none() {
            missing.push("name");
        }
        if ip.is_none() {
            missing.push("ip");
        }
        if url.is_none() {
            missing.push("url");
        }

        match (owner, name, ip, url) {
            (Some(owner), Some(name), Some(ip), Some(url)) => Ok(ValidNodeFields {
                owner,
                name,
                ip,
                url,
                comments: self.comments.unwrap_or_default(),
                enabled: self.enabled.unwrap_or(true),
            }),
            _ => Err(RegistryError::Validation { missing }),
        }
    }
}

/// Partial update. Absent fields are left untouched; `owner` is not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub url: Option<String>,
    pub comments: Option<String>,
    pub enabled: Option<bool>,
    /// Administrative overwrite of the rotation timestamp.
    pub last_used: Option<DateTime<Utc>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.ip.is_none()
            && self.url.is_none()
            && self.comments.is_none()
            && self.enabled.is_none()
            && self.last_used.is_none()
    }

    pub(crate) fn apply(self, node: &mut Node) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(ip) = self.ip {
            node.ip = ip;
        }
        if let Some(url) = self.url {
            node.url = url;
        }
        if let Some(comments) = self.comments {
            node.comments = comments;
        }
        if let Some(enabled) = self.enabled {
            node.enabled = enabled;
        }
        if let Some(last_used) = self.last_used {
            node.last_used = last_used;
        }
    }

    /// Names of the fields this patch sets, for activity logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.ip.is_some() {
            fields.push("ip");
        }
        if self.url.is_some() {
            fields.push("url");
        }
        if self.comments.is_some() {
            fields.push("comments");
        }
        if self.enabled.is_some() {
            fields.push("enabled");
        }
        if self.last_used.is_some() {
            fields.push("lastUsed");
        }
        fields
    }
}

/// Smallest timestamp that is both `>= now` and strictly after `prev`.
pub fn advance_past(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = prev + TimeDelta::microseconds(1);
    now.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_every_missing_field() {
        let fields = NodeFields {
            owner: Some("alice".into()),
            name: Some("  ".into()),
            ..Default::default()
        };

        match fields.validate() {
            Err(RegistryError::Validation { missing }) => {
                assert_eq!(missing, vec!["name", "ip", "url"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_applies_defaults() {
        let valid = NodeFields {
            owner: Some("alice".into()),
            name: Some("Alice".into()),
            ip: Some("10.0.0.1".into()),
            url: Some("https://a.example".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert!(valid.enabled);
        assert_eq!(valid.comments, "");
    }

    #[test]
    fn test_advance_past_is_strict() {
        let t = Utc::now();
        assert!(advance_past(t, t) > t);
        assert!(advance_past(t, t - TimeDelta::seconds(5)) > t);
        let later = t + TimeDelta::seconds(5);
        assert_eq!(advance_past(t, later), later);
    }
}
