//! Manifest documents and the Manifest Resolver.
//!
//! A manifest is a named YAML document listing desired installs,
//! uninstalls, and updates, possibly including other manifests and
//! declaring catalogs. Resolution is a breadth-first worklist walk with a
//! visited set keyed by name, guaranteeing termination under cycles
//! guaranteeing termination under cycles.

use crate::error::GorillaError;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestDoc {
    pub name: String,
    #[serde(default)]
    pub included_manifests: Vec<String>,
    #[serde(default)]
    pub managed_installs: Vec<String>,
    #[serde(default)]
    pub managed_uninstalls: Vec<String>,
    #[serde(default)]
    pub managed_updates: Vec<String>,
    #[serde(default)]
    pub optional_installs: Vec<String>,
    #[serde(default)]
    pub catalogs: Vec<String>,
}

pub fn parse_manifest(content: &str) -> Result<ManifestDoc, GorillaError> {
    serde_yaml::from_str(content).map_err(|e| GorillaError::Parse {
        path: "<manifest>".to_string(),
        source: e,
    })
}

/// A fetcher callback used by [`resolve`]: given a manifest name, returns
/// its raw YAML content (or an error, e.g. a 404). Kept generic over a
/// closure so the resolver has no direct dependency on the HTTP layer and
/// is trivially unit-testable against an in-memory map.
pub trait ManifestSource {
    fn fetch(&self, name: &str) -> Result<String, GorillaError>;
}

/// Result of a full manifest resolution: the deduplicated, BFS-ordered
/// manifest list and the union of catalogs they declared, in first-seen
/// order.
#[derive(Debug, Default)]
pub struct ResolvedManifests {
    pub manifests: Vec<ManifestDoc>,
    pub catalogs: Vec<String>,
}

/// Fetches `client_identifier` and transitively its `included_manifests`
/// from `source`, then appends each of `local_manifests` verbatim
/// (parsed, not fetched) if its name isn't already present.
pub fn resolve(
    client_identifier: &str,
    local_manifests: &[ManifestDoc],
    source: &dyn ManifestSource,
) -> ResolvedManifests {
    let mut visited = HashSet::new();
    let mut worklist = VecDeque::new();
    worklist.push_back(client_identifier.to_string());

    let mut result = ResolvedManifests::default();

    while let Some(name) = worklist.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let content = match source.fetch(&name) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("failed to fetch manifest {}: {}", name, e);
                continue;
            }
        };
        let doc = match parse_manifest(&content) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("failed to parse manifest {}: {}", name, e);
                continue;
            }
        };
        for included in &doc.included_manifests {
            if !visited.contains(included) {
                worklist.push_back(included.clone());
            }
        }
        for catalog in &doc.catalogs {
            if !result.catalogs.contains(catalog) {
                result.catalogs.push(catalog.clone());
            }
        }
        result.manifests.push(doc);
    }

    for local in local_manifests {
        if !result.manifests.iter().any(|m| m.name == local.name) {
            for catalog in &local.catalogs {
                if !result.catalogs.contains(catalog) {
                    result.catalogs.push(catalog.clone());
                }
            }
            result.manifests.push(local.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapSource {
        docs: HashMap<String, String>,
        fetch_count: Mutex<HashMap<String, usize>>,
    }

    impl ManifestSource for MapSource {
        fn fetch(&self, name: &str) -> Result<String, GorillaError> {
            *self
                .fetch_count
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_insert(0) += 1;
            self.docs
                .get(name)
                .cloned()
                .ok_or_else(|| GorillaError::NotFound(name.to_string()))
        }
    }

    fn manifest_yaml(name: &str, includes: &[&str], installs: &[&str]) -> String {
        format!(
            "name: {name}\nincluded_manifests: [{}]\nmanaged_installs: [{}]\n",
            includes.join(", "),
            installs.join(", "),
        )
    }

    #[test]
    fn flattens_and_deduplicates_cyclic_includes() {
        let mut docs = HashMap::new();
        docs.insert("a".to_string(), manifest_yaml("a", &["b"], &["pkg-a"]));
        docs.insert("b".to_string(), manifest_yaml("b", &["a"], &["pkg-b"]));
        let source = MapSource {
            docs,
            fetch_count: Mutex::new(HashMap::new()),
        };

        let resolved = resolve("a", &[], &source);

        assert_eq!(resolved.manifests.len(), 2);
        assert_eq!(resolved.manifests[0].name, "a");
        assert_eq!(resolved.manifests[1].name, "b");
        assert_eq!(*source.fetch_count.lock().unwrap().get("a").unwrap(), 1);
        assert_eq!(*source.fetch_count.lock().unwrap().get("b").unwrap(), 1);
    }

    #[test]
    fn breadth_first_order_with_local_manifests_last() {
        let mut docs = HashMap::new();
        docs.insert(
            "root".to_string(),
            manifest_yaml("root", &["child1", "child2"], &[]),
        );
        docs.insert("child1".to_string(), manifest_yaml("child1", &[], &[]));
        docs.insert("child2".to_string(), manifest_yaml("child2", &[], &[]));
        let source = MapSource {
            docs,
            fetch_count: Mutex::new(HashMap::new()),
        };
        let local = ManifestDoc {
            name: "local-extra".into(),
            ..Default::default()
        };

        let resolved = resolve("root", &[local], &source);

        let names: Vec<&str> = resolved.manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["root", "child1", "child2", "local-extra"]);
    }

    #[test]
    fn local_manifest_already_present_remotely_is_not_duplicated() {
        let mut docs = HashMap::new();
        docs.insert("root".to_string(), manifest_yaml("root", &[], &[]));
        let source = MapSource {
            docs,
            fetch_count: Mutex::new(HashMap::new()),
        };
        let local = ManifestDoc {
            name: "root".into(),
            ..Default::default()
        };

        let resolved = resolve("root", &[local], &source);
        assert_eq!(resolved.manifests.len(), 1);
    }

    #[test]
    fn parse_error_is_skipped_not_fatal() {
        let mut docs = HashMap::new();
        docs.insert("root".to_string(), "not: [valid".to_string());
        let source = MapSource {
            docs,
            fetch_count: Mutex::new(HashMap::new()),
        };
        let resolved = resolve("root", &[], &source);
        assert!(resolved.manifests.is_empty());
    }

    #[test]
    fn empty_manifest_resolves_with_no_actions_later() {
        let mut docs = HashMap::new();
        docs.insert("root".to_string(), manifest_yaml("root", &[], &[]));
        let source = MapSource {
            docs,
            fetch_count: Mutex::new(HashMap::new()),
        };
        let resolved = resolve("root", &[], &source);
        assert_eq!(resolved.manifests.len(), 1);
        assert!(resolved.manifests[0].managed_installs.is_empty());
    }
}
