//! The explicit run context threaded through the resolver, planner, and
//! dispatcher instead of ambient globals.

use crate::cache::CacheStore;
use crate::catalog::CatalogMap;
use crate::config::Config;
use crate::credential::CredentialProvider;
use crate::registry::RegistrySource;
use crate::report::RunReport;

pub struct RunContext<'a> {
    pub config: Config,
    pub catalogs: CatalogMap,
    pub cache: CacheStore,
    pub registry: &'a dyn RegistrySource,
    pub credentials: &'a dyn CredentialProvider,
    pub report: RunReport,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: Config,
        catalogs: CatalogMap,
        registry: &'a dyn RegistrySource,
        credentials: &'a dyn CredentialProvider,
    ) -> Self {
        let cache = CacheStore::new(config.cache_path.clone());
        Self {
            config,
            catalogs,
            cache,
            registry,
            credentials,
            report: RunReport::new(),
        }
    }
}
