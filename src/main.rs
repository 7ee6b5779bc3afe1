use clap::Parser;
use colored::*;
use gorilla::catalog::{parse_catalog, CatalogMap};
use gorilla::cleaner;
use gorilla::config::{Config, DEFAULT_CONFIG_PATH};
use gorilla::context::RunContext;
use gorilla::credential::NoCredentialProvider;
use gorilla::dispatcher::Dispatcher;
use gorilla::error::GorillaError;
use gorilla::http::Fetcher;
use gorilla::manifest::{parse_manifest, resolve, ManifestDoc, ManifestSource};
use gorilla::planner::Planner;
use gorilla::preflight;
use gorilla::registry::{RegistrySource, StaticRegistry};
use gorilla::retry::RealSleeper;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

#[derive(Parser, Debug)]
#[command(name = "managedsoftwareupdate")]
#[command(about = "Client update core: resolves manifests and catalogs, and installs, updates, or removes managed software.")]
struct Args {
    /// Path to the config document. Defaults to the well-known install path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    show_config: bool,

    /// Report what would happen without downloading or installing anything.
    #[arg(long)]
    check_only: bool,

    /// Increase log verbosity. Repeatable: -v info, -vv debug, -vvv trace.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "config error:".red().bold(), e);
            return ExitCode::from(1);
        }
    };
    if args.check_only {
        config.check_only = true;
    }

    if let Err(e) = init_logging(args.verbose, &config) {
        eprintln!("{} {:#}", "logging setup failed:".red().bold(), e);
        return ExitCode::from(1);
    }

    if args.show_config {
        match config.to_yaml() {
            Ok(yaml) => println!("{}", yaml),
            Err(e) => eprintln!("{} {}", "failed to serialize config:".red(), e),
        }
        return ExitCode::SUCCESS;
    }

    if !is_privileged() {
        eprintln!(
            "{}",
            "managedsoftwareupdate requires administrator privileges".red().bold()
        );
        return ExitCode::from(3);
    }

    let preflight_path = PathBuf::from(preflight::DEFAULT_PREFLIGHT_PATH);
    match preflight::run(&preflight_path) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("{}", "preflight script failed, aborting run".red().bold());
            return ExitCode::from(2);
        }
        Err(e) => {
            log::warn!("preflight script could not be run: {}", e);
        }
    }

    // The preflight hook may have rewritten the config document; the one
    // reload picks up any such change.
    if preflight_path.exists() {
        if let Ok(reloaded) = Config::load(&config_path) {
            config = reloaded;
        }
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "run failed:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the `log` facade. Failing to open the log file is a warning,
/// not fatal (stderr still gets everything); failing to install the
/// dispatcher at all is the one case worth aborting the run over, since
/// every downstream log::warn!/error! would then be silently dropped.
fn init_logging(verbose: u8, config: &Config) -> anyhow::Result<()> {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let log_path = log_file_path(config);
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    match fern::log_file(&log_path) {
        Ok(file) => dispatch = dispatch.chain(file),
        Err(e) => eprintln!("warning: could not open log file {}: {}", log_path.display(), e),
    }

    use anyhow::Context;
    dispatch.apply().context("installing the global log dispatcher")?;
    Ok(())
}

/// `<ManagedInstalls root>/Logs/ManagedSoftwareUpdate.log`, derived from
/// the configured cache path's parent so tests can redirect both by
/// pointing `cache_path` at a temp directory.
fn log_file_path(config: &Config) -> PathBuf {
    let root = config
        .cache_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| config.cache_path.clone());
    root.join("Logs").join("ManagedSoftwareUpdate.log")
}

#[cfg(windows)]
fn is_privileged() -> bool {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_SET_VALUE};
    use winreg::RegKey;
    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags("SOFTWARE", KEY_READ | KEY_SET_VALUE)
        .is_ok()
}

#[cfg(not(windows))]
fn is_privileged() -> bool {
    true
}

/// Manifest and catalog names are interpolated straight into repo URLs;
/// reject anything that isn't a bare identifier before it gets near a
/// path segment (blocks `../`, absolute paths, and embedded slashes).
fn is_valid_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static pattern is valid"))
        .is_match(name)
}

struct HttpManifestSource<'a> {
    fetcher: &'a Fetcher<'a>,
    repo_url: &'a str,
    manifests_path: &'a Path,
}

impl<'a> ManifestSource for HttpManifestSource<'a> {
    fn fetch(&self, name: &str) -> Result<String, GorillaError> {
        if !is_valid_name(name) {
            return Err(GorillaError::Config(format!("invalid manifest name: {}", name)));
        }
        let body = self
            .fetcher
            .get(&format!("{}/manifests/{}.yaml", self.repo_url, name))?;
        write_cached_copy(self.manifests_path, name, &body);
        Ok(body)
    }
}

/// Writes a fetched manifest/catalog body to its local cache directory as
/// `<name>.yaml`, overwriting any prior copy. Failures are logged, not
/// fatal: the in-memory body this run uses already fetched and parsed
/// successfully.
fn write_cached_copy(dir: &Path, name: &str, body: &str) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("failed to create {}: {}", dir.display(), e);
        return;
    }
    let path = dir.join(format!("{}.yaml", name));
    if let Err(e) = std::fs::write(&path, body) {
        log::warn!("failed to write {}: {}", path.display(), e);
    }
}

fn load_local_manifests(config: &Config) -> Vec<ManifestDoc> {
    config
        .local_manifests
        .iter()
        .filter_map(|path| match std::fs::read_to_string(path) {
            Ok(content) => match parse_manifest(&content) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    log::warn!("failed to parse local manifest {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("failed to read local manifest {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn fetch_catalogs(
    fetcher: &Fetcher,
    config: &Config,
    catalog_names: &[String],
) -> Result<CatalogMap, GorillaError> {
    let mut map = CatalogMap::new();
    for (idx, name) in config.catalogs.iter().chain(catalog_names.iter()).enumerate() {
        if !is_valid_name(name) {
            log::warn!("skipping catalog with invalid name: {}", name);
            continue;
        }
        let url = format!("{}/catalogs/{}.yaml", config.software_repo_url, name);
        match fetcher.get(&url) {
            Ok(body) => {
                write_cached_copy(&config.catalogs_path, name, &body);
                match parse_catalog(&body) {
                    Ok(doc) => map.insert(idx + 1, doc),
                    Err(e) => log::warn!("failed to parse catalog {}: {}", name, e),
                }
            }
            Err(e) if e.is_fatal_to_run() => return Err(e),
            Err(e) => log::warn!("failed to fetch catalog {}: {}", name, e),
        }
    }
    Ok(map)
}

#[cfg(windows)]
fn registry_source() -> Box<dyn RegistrySource> {
    Box::new(gorilla::registry::WindowsRegistry)
}

#[cfg(not(windows))]
fn registry_source() -> Box<dyn RegistrySource> {
    Box::new(StaticRegistry::new(vec![]))
}

fn run(config: Config) -> Result<(), GorillaError> {
    let credentials = NoCredentialProvider;
    let sleeper = RealSleeper;
    let fetcher = Fetcher::new(&credentials, &sleeper).with_force_basic_auth(config.force_basic_auth);

    let source = HttpManifestSource {
        fetcher: &fetcher,
        repo_url: &config.software_repo_url,
        manifests_path: &config.manifests_path,
    };
    let local_manifests = load_local_manifests(&config);
    let resolved = resolve(&config.client_identifier, &local_manifests, &source);
    let catalogs = fetch_catalogs(&fetcher, &config, &resolved.catalogs)?;

    let registry = registry_source();
    let mut ctx = RunContext::new(config, catalogs, registry.as_ref(), &credentials);

    let planner = Planner::new(&ctx.catalogs, &ctx.config.default_arch);
    let planned = planner.plan(&resolved.manifests);

    let status = gorilla::status::StatusChecker {
        registry: ctx.registry,
        script_runner: &gorilla::status::RealScriptRunner,
        version_reader: &gorilla::status::NoVersionReader,
        cache_path: ctx.config.cache_path.clone(),
    };
    let dispatcher = Dispatcher::new(&credentials, &sleeper, &ctx.cache, &status, ctx.config.check_only);

    let catalogs_ref = &ctx.catalogs;
    dispatcher.run_all(
        &planned,
        |name| catalogs_ref.first_item(name).ok().cloned(),
        &mut ctx.report,
    );

    cleaner::cleanup(&ctx.config.cache_path, cleaner::DEFAULT_AGE_DAYS);

    let report_path = ctx.config.cache_path.join("report.yaml");
    if let Err(e) = ctx.report.flush(&report_path) {
        log::warn!("failed to write report: {}", e);
    }

    println!(
        "{} installed/updated, {} failed",
        ctx.report.installed_count(),
        ctx.report.failure_count()
    );

    Ok(())
}
