// # zonesync - DNS zone reconciliation driver
//
// Thin integration layer: all diffing, planning, retry and execution logic
// lives in zonesync-core. This binary only:
// 1. Reads environment variables and the JSON zone declaration file
// 2. Initializes logging and the runtime
// 3. Registers backend adapters
// 4. Runs one preview or push pass over the declared zones
// 5. Prints correction descriptions and maps the outcome to an exit code
//
// ## Configuration
//
// - `ZONESYNC_CONFIG`: path to the JSON declaration file (required)
// - `ZONESYNC_MODE`: `preview` (default) or `push`
// - `ZONESYNC_ZONES`: comma-separated list of zones to reconcile (default: all)
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
// - `ZONESYNC_PROVIDER_API_KEY`: overrides the provider API key from the file
//
// ## Example
//
// ```bash
// export ZONESYNC_CONFIG=/etc/zonesync/zones.json
// export ZONESYNC_PROVIDER_API_KEY=your_key
// ZONESYNC_MODE=preview zonesync
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::{
    CorrectionStatus, ProviderRegistry, ReconcileEngine, RunMode, ZoneDeclaration, ZoneResult,
    ZoneSyncConfig,
};

/// Exit codes
///
/// - 0: Nothing to change
/// - 1: Corrections were computed (preview) or applied (push)
/// - 2: Configuration error or failed correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneSyncExitCode {
    /// Every zone matches its declaration
    NoCorrections = 0,
    /// At least one correction was computed or applied
    CorrectionsFound = 1,
    /// Startup failure, failed zone or failed correction
    Failure = 2,
}

impl From<ZoneSyncExitCode> for ExitCode {
    fn from(code: ZoneSyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings taken from the environment
#[derive(Debug)]
struct Settings {
    config_path: PathBuf,
    mode: RunMode,
    zone_filter: Vec<String>,
    api_key: Option<String>,
    log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = lookup("ZONESYNC_CONFIG")
            .filter(|p| !p.is_empty())
            .context("ZONESYNC_CONFIG is required. Set it via: export ZONESYNC_CONFIG=/path/to/zones.json")?;

        let mode = match lookup("ZONESYNC_MODE") {
            Some(mode) if !mode.is_empty() => mode.parse::<RunMode>()?,
            _ => RunMode::Preview,
        };

        let log_level = lookup("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        match log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                log_level
            ),
        }

        Ok(Self {
            config_path: PathBuf::from(config_path),
            mode,
            zone_filter: lookup("ZONESYNC_ZONES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            api_key: lookup("ZONESYNC_PROVIDER_API_KEY").filter(|k| !k.is_empty()),
            log_level,
        })
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Read and validate the declaration file
fn load_config(path: &Path, api_key: Option<&str>) -> Result<ZoneSyncConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut config = ZoneSyncConfig::from_json(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if let Some(key) = api_key {
        config.provider.set_api_key(key);
    }

    config.validate()?;
    Ok(config)
}

/// Keep only the zones named in `filter` (all zones when it is empty)
fn select_zones(
    declarations: Vec<ZoneDeclaration>,
    filter: &[String],
) -> Result<Vec<ZoneDeclaration>> {
    if filter.is_empty() {
        return Ok(declarations);
    }

    for wanted in filter {
        if !declarations.iter().any(|d| &d.origin == wanted) {
            anyhow::bail!("ZONESYNC_ZONES names unknown zone '{}'", wanted);
        }
    }

    Ok(declarations
        .into_iter()
        .filter(|d| filter.contains(&d.origin))
        .collect())
}

/// Map the pass results to an exit code
fn exit_code_for(results: &[ZoneResult]) -> ZoneSyncExitCode {
    let mut found = false;
    for zone in results {
        match &zone.result {
            Err(_) => return ZoneSyncExitCode::Failure,
            Ok(report) if report.has_failures() => return ZoneSyncExitCode::Failure,
            Ok(report) => found |= report.executable_count() > 0,
        }
    }
    if found {
        ZoneSyncExitCode::CorrectionsFound
    } else {
        ZoneSyncExitCode::NoCorrections
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZoneSyncExitCode::Failure.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.tracing_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZoneSyncExitCode::Failure.into();
    }

    info!("Starting zonesync ({:?})", settings.mode);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZoneSyncExitCode::Failure.into();
        }
    };

    let code = rt.block_on(async {
        match run(settings).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                ZoneSyncExitCode::Failure
            }
        }
    });

    code.into()
}

/// Register every backend compiled into the binary
fn build_registry() -> Result<ProviderRegistry> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "powerdns")]
    {
        debug!("Registering PowerDNS provider");
        zonesync_provider_powerdns::register(&registry);
    }

    #[cfg(feature = "namecheap")]
    {
        debug!("Registering Namecheap provider and registrar");
        zonesync_provider_namecheap::register(&registry);
    }

    registry.validate()?;
    info!("Available providers: {}", registry.list_providers().join(", "));
    info!("Available registrars: {}", registry.list_registrars().join(", "));
    Ok(registry)
}

/// Run one pass over the selected zones
async fn run(settings: Settings) -> Result<ZoneSyncExitCode> {
    let config = load_config(&settings.config_path, settings.api_key.as_deref())?;
    let declarations = select_zones(config.declarations()?, &settings.zone_filter)?;

    let registry = build_registry()?;

    let provider = registry.create_provider(&config.provider)?;
    let registrar = match &config.registrar {
        Some(registrar_config) => Some(registry.create_registrar(registrar_config)?),
        None => None,
    };

    let (engine, mut events) = ReconcileEngine::new(provider, registrar, &config.engine)?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    info!("Reconciling {} zone(s)", declarations.len());
    let results = engine.reconcile_all(declarations, settings.mode).await;

    print_results(&results, settings.mode);
    Ok(exit_code_for(&results))
}

/// Print every correction description, grouped by zone
fn print_results(results: &[ZoneResult], mode: RunMode) {
    for zone in results {
        println!("******************** Domain: {}", zone.zone);
        match &zone.result {
            Ok(report) => {
                let executable = report.executable_count();
                if executable > 0 {
                    println!("----- {} correction(s)", executable);
                }
                for (idx, outcome) in report.outcomes.iter().enumerate() {
                    match &outcome.status {
                        CorrectionStatus::Reported => println!("INFO: {}", outcome.description),
                        CorrectionStatus::Previewed => {
                            println!("#{}: {}", idx + 1, outcome.description)
                        }
                        CorrectionStatus::Applied => {
                            println!("#{}: {}\nSUCCESS!", idx + 1, outcome.description)
                        }
                        CorrectionStatus::Failed { error } => {
                            println!("#{}: {}\nFAILURE! {}", idx + 1, outcome.description, error)
                        }
                        CorrectionStatus::NotAttempted => {
                            println!("#{}: {}\nSKIPPED", idx + 1, outcome.description)
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Zone {} failed: {}", zone.zone, e);
                println!("ERROR: {}", e);
            }
        }
    }

    if mode == RunMode::Preview {
        println!("Done. Preview only, nothing was changed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use zonesync_core::{CorrectionOutcome, Error, ZoneReport};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const CONFIG: &str = r#"{
        "provider": {
            "type": "powerdns",
            "api_url": "http://localhost:8081",
            "api_key": "from-file",
            "server_name": "localhost"
        },
        "zones": [
            { "origin": "example.com",
              "records": [ { "name": "www", "type": "A", "content": "192.0.2.1" } ] },
            { "origin": "example.org" }
        ]
    }"#;

    fn config_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn report(statuses: Vec<CorrectionStatus>) -> ZoneReport {
        let now = chrono::Utc::now();
        ZoneReport {
            zone: "example.com".to_string(),
            mode: RunMode::Push,
            started_at: now,
            finished_at: now,
            outcomes: statuses
                .into_iter()
                .map(|status| CorrectionOutcome {
                    description: "+ CREATE www A 192.0.2.1 ttl=300".to_string(),
                    status,
                })
                .collect(),
        }
    }

    fn result(report: zonesync_core::Result<ZoneReport>) -> ZoneResult {
        ZoneResult {
            zone: "example.com".to_string(),
            result: report,
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(lookup(&[("ZONESYNC_CONFIG", "/etc/zones.json")])).unwrap();
        assert_eq!(settings.mode, RunMode::Preview);
        assert!(settings.zone_filter.is_empty());
        assert!(settings.api_key.is_none());
        assert_eq!(settings.tracing_level(), Level::INFO);
    }

    #[test]
    fn test_settings_require_config_path() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("ZONESYNC_CONFIG"));
    }

    #[test]
    fn test_settings_parse_mode_and_filter() {
        let settings = Settings::from_lookup(lookup(&[
            ("ZONESYNC_CONFIG", "zones.json"),
            ("ZONESYNC_MODE", "PUSH"),
            ("ZONESYNC_ZONES", "Example.com., example.org, "),
            ("ZONESYNC_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(settings.mode, RunMode::Push);
        assert_eq!(settings.zone_filter, vec!["example.com", "example.org"]);
        assert_eq!(settings.tracing_level(), Level::DEBUG);
    }

    #[test]
    fn test_settings_reject_unknown_mode_and_level() {
        assert!(
            Settings::from_lookup(lookup(&[("ZONESYNC_CONFIG", "z"), ("ZONESYNC_MODE", "apply")]))
                .is_err()
        );
        assert!(
            Settings::from_lookup(lookup(&[("ZONESYNC_CONFIG", "z"), ("ZONESYNC_LOG_LEVEL", "loud")]))
                .is_err()
        );
    }

    #[test]
    fn test_load_config_overrides_api_key() {
        let file = config_file(CONFIG);
        let config = load_config(file.path(), Some("from-env")).unwrap();
        match &config.provider {
            zonesync_core::ProviderConfig::PowerDns { api_key, .. } => assert_eq!(api_key, "from-env"),
            other => panic!("unexpected provider config: {other:?}"),
        }
        assert_eq!(config.zones.len(), 2);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let file = config_file(r#"{ "provider": { "type": "powerdns" } }"#);
        assert!(load_config(file.path(), None).is_err());

        let missing = Path::new("/nonexistent/zonesync/zones.json");
        assert!(load_config(missing, None).is_err());
    }

    #[cfg(all(feature = "powerdns", feature = "namecheap"))]
    #[test]
    fn test_registry_serves_namecheap_registrar() {
        let text = CONFIG.replacen(
            r#""zones": ["#,
            r#""registrar": { "type": "namecheap", "api_user": "alice", "api_key": "k3y" },
        "zones": ["#,
            1,
        );
        let file = config_file(&text);
        let config = load_config(file.path(), None).unwrap();

        let registry = build_registry().unwrap();
        assert!(registry.create_provider(&config.provider).is_ok());
        let registrar = config.registrar.as_ref().unwrap();
        let registrar = registry.create_registrar(registrar).unwrap();
        assert_eq!(registrar.registrar_name(), "namecheap");
    }

    #[test]
    fn test_select_zones() {
        let file = config_file(CONFIG);
        let config = load_config(file.path(), None).unwrap();

        let all = select_zones(config.declarations().unwrap(), &[]).unwrap();
        assert_eq!(all.len(), 2);

        let one = select_zones(config.declarations().unwrap(), &["example.org".to_string()]).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].origin, "example.org");

        assert!(select_zones(config.declarations().unwrap(), &["example.net".to_string()]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&[]), ZoneSyncExitCode::NoCorrections);
        assert_eq!(
            exit_code_for(&[result(Ok(report(vec![CorrectionStatus::Reported])))]),
            ZoneSyncExitCode::NoCorrections
        );
        assert_eq!(
            exit_code_for(&[result(Ok(report(vec![CorrectionStatus::Previewed])))]),
            ZoneSyncExitCode::CorrectionsFound
        );
        assert_eq!(
            exit_code_for(&[
                result(Ok(report(vec![CorrectionStatus::Applied]))),
                result(Ok(report(vec![CorrectionStatus::Failed {
                    error: "rejected".to_string()
                }]))),
            ]),
            ZoneSyncExitCode::Failure
        );
        assert_eq!(
            exit_code_for(&[result(Err(Error::config("boom")))]),
            ZoneSyncExitCode::Failure
        );
    }
}
