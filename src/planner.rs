//! Action Planner: walks resolved manifests, validates each requested item
//! against catalogs, filters by architecture, expands dependencies, and
//! emits ordered install/uninstall/update lists.

use crate::catalog::CatalogMap;
use crate::config::normalize_arch;
use crate::manifest::ManifestDoc;
use crate::status::Action;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct PlannedAction {
    pub name: String,
    pub version: String,
    pub action: Action,
}

pub struct Planner<'a> {
    catalogs: &'a CatalogMap,
    detected_arch: String,
    seen: HashSet<(String, ActionKind)>,
    planned: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActionKind {
    Install,
    Update,
    Uninstall,
}

impl From<Action> for ActionKind {
    fn from(a: Action) -> Self {
        match a {
            Action::Install => ActionKind::Install,
            Action::Update => ActionKind::Update,
            Action::Uninstall => ActionKind::Uninstall,
        }
    }
}

impl<'a> Planner<'a> {
    pub fn new(catalogs: &'a CatalogMap, runtime_arch: &str) -> Self {
        Self {
            catalogs,
            detected_arch: normalize_arch(runtime_arch),
            seen: HashSet::new(),
            planned: Vec::new(),
        }
    }

    /// Plans every manifest's `managed_installs` + `optional_installs`,
    /// `managed_uninstalls`, and `managed_updates`, in that per-manifest
    /// order, across manifests in their resolved (BFS, local-last) order.
    pub fn plan(mut self, manifests: &[ManifestDoc]) -> Vec<PlannedAction> {
        for manifest in manifests {
            let installs: Vec<&String> = manifest
                .managed_installs
                .iter()
                .chain(manifest.optional_installs.iter())
                .collect();
            for name in installs {
                self.plan_install(name);
            }
            for name in &manifest.managed_uninstalls {
                self.plan_simple(name, Action::Uninstall);
            }
            for name in &manifest.managed_updates {
                self.plan_simple(name, Action::Update);
            }
        }
        self.planned
    }

    fn plan_install(&mut self, name: &str) {
        let item = match self.catalogs.first_item(name) {
            Ok(item) => item.clone(),
            Err(e) => {
                log::warn!("skipping install of {}: {}", name, e);
                return;
            }
        };
        if !self.arch_supported(&item.supported_architectures) {
            log::info!(
                "skipping {} install: arch {} not in {:?}",
                name,
                self.detected_arch,
                item.supported_architectures
            );
            return;
        }
        for dep in item.dependencies.clone() {
            self.plan_install(&dep);
        }
        self.emit(name, &item.version, Action::Install);
    }

    fn plan_simple(&mut self, name: &str, action: Action) {
        let item = match self.catalogs.first_item(name) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("skipping {:?} of {}: {}", action, name, e);
                return;
            }
        };
        self.emit(name, &item.version.clone(), action);
    }

    fn arch_supported(&self, supported: &[String]) -> bool {
        supported.is_empty() || supported.iter().any(|a| a == &self.detected_arch)
    }

    fn emit(&mut self, name: &str, version: &str, action: Action) {
        let key = (name.to_string(), ActionKind::from(action));
        if self.seen.insert(key) {
            self.planned.push(PlannedAction {
                name: name.to_string(),
                version: version.to_string(),
                action,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogDoc, CatalogItem, Check, InstallerSpec};

    fn item(name: &str, deps: &[&str], archs: &[&str]) -> CatalogItem {
        CatalogItem {
            name: name.to_string(),
            display_name: String::new(),
            version: "1.0.0".to_string(),
            supported_architectures: archs.iter().map(|s| s.to_string()).collect(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            installer: InstallerSpec::default(),
            uninstaller: InstallerSpec::default(),
            check: Check::default(),
            installs: vec![],
            preinstall_script: None,
            postinstall_script: None,
        }
    }

    #[test]
    fn empty_manifest_emits_no_actions() {
        let catalogs = CatalogMap::new();
        let planner = Planner::new(&catalogs, "x86_64");
        let planned = planner.plan(&[ManifestDoc::default()]);
        assert!(planned.is_empty());
    }

    #[test]
    fn dependency_installed_before_dependent_and_deduped() {
        let mut doc = CatalogDoc::new();
        doc.insert("lib".to_string(), item("lib", &[], &[]));
        doc.insert("app".to_string(), item("app", &["lib"], &[]));
        doc.insert("app2".to_string(), item("app2", &["lib"], &[]));
        let mut catalogs = CatalogMap::new();
        catalogs.insert(1, doc);

        let mut m = ManifestDoc {
            name: "m".to_string(),
            ..Default::default()
        };
        m.managed_installs = vec!["app".to_string(), "app2".to_string()];

        let planner = Planner::new(&catalogs, "x86_64");
        let planned = planner.plan(&[m]);

        let names: Vec<&str> = planned.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "app", "app2"]);
    }

    #[test]
    fn arch_mismatch_skips_item_and_its_dependents() {
        let mut doc = CatalogDoc::new();
        doc.insert("arm-only".to_string(), item("arm-only", &[], &["arm64"]));
        let mut catalogs = CatalogMap::new();
        catalogs.insert(1, doc);

        let mut m = ManifestDoc {
            name: "m".to_string(),
            ..Default::default()
        };
        m.managed_installs = vec!["arm-only".to_string()];

        let planner = Planner::new(&catalogs, "x86_64");
        let planned = planner.plan(&[m]);
        assert!(planned.is_empty());
    }

    #[test]
    fn arch_agnostic_item_with_empty_supported_list_always_plans() {
        let mut doc = CatalogDoc::new();
        doc.insert("any".to_string(), item("any", &[], &[]));
        let mut catalogs = CatalogMap::new();
        catalogs.insert(1, doc);
        let mut m = ManifestDoc {
            name: "m".to_string(),
            ..Default::default()
        };
        m.managed_installs = vec!["any".to_string()];
        let planner = Planner::new(&catalogs, "arm64");
        let planned = planner.plan(&[m]);
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn same_name_action_pair_emitted_at_most_once() {
        let mut doc = CatalogDoc::new();
        doc.insert("shared".to_string(), item("shared", &[], &[]));
        let mut catalogs = CatalogMap::new();
        catalogs.insert(1, doc);

        let mut m1 = ManifestDoc {
            name: "m1".to_string(),
            ..Default::default()
        };
        m1.managed_installs = vec!["shared".to_string()];
        let mut m2 = ManifestDoc {
            name: "m2".to_string(),
            ..Default::default()
        };
        m2.managed_installs = vec!["shared".to_string()];

        let planner = Planner::new(&catalogs, "x86_64");
        let planned = planner.plan(&[m1, m2]);
        assert_eq!(planned.len(), 1);
    }

    #[test]
    fn not_found_item_is_skipped_not_fatal() {
        let catalogs = CatalogMap::new();
        let mut m = ManifestDoc {
            name: "m".to_string(),
            ..Default::default()
        };
        m.managed_installs = vec!["missing".to_string()];
        let planner = Planner::new(&catalogs, "x86_64");
        let planned = planner.plan(&[m]);
        assert!(planned.is_empty());
    }
}
