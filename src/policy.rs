//! Access policy: the static allow-list of tables an engine instance serves.

use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// `None` until configured: every table is served.
    allowed: Option<BTreeSet<String>>,
}

impl AccessPolicy {
    /// Policy that serves every table.
    pub fn unrestricted() -> Self {
        AccessPolicy { allowed: None }
    }

    /// Build the policy from the requested names. An empty request snapshots `known_tables`,
    /// so tables that appear later are not served. Names are not checked against the catalog.
    pub fn from_request<I, S>(requested: &[String], known_tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: BTreeSet<String> = if requested.is_empty() {
            known_tables.into_iter().map(Into::into).collect()
        } else {
            requested.iter().cloned().collect()
        };
        AccessPolicy { allowed: Some(allowed) }
    }

    pub fn allows(&self, table: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(set) => set.contains(table),
        }
    }

    /// Explicit allow-list, if configured.
    pub fn tables(&self) -> Option<&BTreeSet<String>> {
        self.allowed.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_list_is_exact() {
        let p = AccessPolicy::from_request(&["A".to_string()], ["A", "B"]);
        assert!(p.allows("A"));
        assert!(!p.allows("B"));
        assert!(!p.allows("a"));
    }

    #[test]
    fn empty_request_snapshots_known_tables() {
        let p = AccessPolicy::from_request(&[], ["A", "B"]);
        assert!(p.allows("A"));
        assert!(p.allows("B"));
        assert!(!p.allows("C"));
        assert_eq!(p.tables().map(|t| t.len()), Some(2));
    }

    #[test]
    fn default_serves_everything() {
        assert!(AccessPolicy::default().allows("anything"));
        assert_eq!(AccessPolicy::unrestricted(), AccessPolicy::default());
    }
}
