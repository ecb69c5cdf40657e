// Consular citizen-services wizard
// Main library entry point

pub mod applications;
pub mod config;
mod tui;
pub mod utils;
pub mod wizard;

use applications::{
    Application, ApplicationKind, AppointmentForm, AttestationForm, EtcForm, NolForm,
};
use config::{LoggingConfig, PortalConfig};
use log::{error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use wizard::{CitizenProfile, LoggingSink, NoProfile, ProfileProvider, TomlProfileFile};

/// Bind `$app` to the form type of `$kind` and evaluate `$body`.
macro_rules! for_application {
    ($kind:expr, $app:ident => $body:expr) => {
        match $kind {
            ApplicationKind::EmergencyTravelCertificate => {
                type $app = EtcForm;
                $body
            }
            ApplicationKind::NoObjectionLetter => {
                type $app = NolForm;
                $body
            }
            ApplicationKind::Attestation => {
                type $app = AttestationForm;
                $body
            }
            ApplicationKind::Appointment => {
                type $app = AppointmentForm;
                $body
            }
        }
    };
}

/// Initialize logging system with dual format (JSON + human-readable)
fn init_logging(
    with_stdout: bool,
    logging: &LoggingConfig,
    level: log::LevelFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder(logging.directory.as_deref())?;
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("wizard-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("wizard-{}.txt", timestamp));

    let mut details: HashMap<String, Value> = HashMap::new();
    details.insert(
        "version".to_string(),
        Value::from(env!("CARGO_PKG_VERSION")),
    );
    details.insert("pid".to_string(), Value::from(std::process::id()));

    // - JSON format to .log file
    // - Human-readable format to .txt file
    // - Optional: human-readable to stdout (disabled for TUI to avoid corrupting the terminal UI)
    let mut dispatch = fern::Dispatch::new().level(level);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        Some(&details),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

/// Load configuration and start logging. Logging falls back to defaults when the
/// configuration itself is unusable so the failure still reaches a log file.
fn bootstrap(config_path: Option<&Path>, with_stdout: bool) -> Option<PortalConfig> {
    let loaded = PortalConfig::load(config_path);

    let (logging, level) = match &loaded {
        Ok(cfg) => (
            cfg.logging.clone(),
            cfg.level_filter().unwrap_or(log::LevelFilter::Info),
        ),
        Err(_) => (LoggingConfig::default(), log::LevelFilter::Info),
    };
    if let Err(e) = init_logging(with_stdout, &logging, level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] [STEP: deployment_folder] Deployment folder: {:?}",
        utils::path_resolver::resolve_deployment_folder()
    );

    match loaded {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(
                "[PHASE: initialization] [STEP: config] Invalid configuration: {:#}",
                e
            );
            eprintln!("Configuration error: {:#}", e);
            None
        }
    }
}

fn load_profile(cfg: &PortalConfig) -> Option<CitizenProfile> {
    let provider: Box<dyn ProfileProvider> = match &cfg.profile_path {
        Some(path) => Box::new(TomlProfileFile::new(path.clone())),
        None => Box::new(NoProfile),
    };

    match provider.profile() {
        Ok(profile) => {
            if profile.is_some() {
                info!("[PHASE: initialization] [STEP: prefill] Citizen profile loaded");
            }
            profile
        }
        Err(e) => {
            // Prefill is a convenience; the wizard still starts empty.
            warn!(
                "[PHASE: initialization] [STEP: prefill] Ignoring unreadable profile: {:#}",
                e
            );
            None
        }
    }
}

/// Interactive terminal wizard for one application.
pub fn run_tui(kind: ApplicationKind, config_path: Option<PathBuf>) {
    // Initialize logging (no stdout to avoid corrupting the TUI)
    let Some(cfg) = bootstrap(config_path.as_deref(), false) else {
        std::process::exit(2);
    };

    info!(
        "[PHASE: initialization] Headless TUI wizard starting at {} application={}",
        chrono::Utc::now(),
        kind
    );

    let sink = match cfg.build_sink() {
        Ok(sink) => sink,
        Err(e) => {
            error!("[PHASE: initialization] [STEP: sink] {:#}", e);
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(2);
        }
    };
    let profile = load_profile(&cfg);

    let outcome = for_application!(kind, A => tui::run::<A>(profile, sink));
    match outcome {
        Ok(Some(result)) => {
            println!(
                "Submitted {}: reference {}",
                kind.title(),
                result.reference_id
            );
        }
        Ok(None) => {
            info!("[PHASE: tui] [STEP: exit] Wizard closed without submitting");
        }
        Err(e) => {
            error!("[PHASE: tui] [STEP: fatal] TUI exited with error: {:?}", e);
            eprintln!("Wizard error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Non-interactive TUI smoke mode (for automated checks).
/// Renders a single frame of `kind` at `step` to an in-memory terminal and exits.
pub fn run_tui_smoke(kind: ApplicationKind, step: Option<String>) {
    if bootstrap(None, false).is_none() {
        std::process::exit(2);
    }

    match for_application!(kind, A => tui::smoke::<A>(step.as_deref())) {
        Ok(_) => {
            println!(
                "TUI smoke OK: {} at {}",
                kind,
                step.as_deref().unwrap_or("first step")
            );
        }
        Err(e) => {
            error!(
                "[PHASE: tui] [STEP: smoke] TUI smoke exited with error: {:?}",
                e
            );
            eprintln!("Wizard error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn submit_sample<A: Application>() -> anyhow::Result<String> {
    let mut state = A::engine()?.initialize(A::sample());
    while !state.is_last_step() {
        info!(
            "[PHASE: smoke] [STEP: {}] progress={}%",
            state.current_step_id(),
            state.progress_percent()
        );
        state = state.advance()?;
    }
    let (_, result) = state.submit(&LoggingSink).await?;
    Ok(result.reference_id)
}

/// Drive every application through all steps with sample data and the logging sink.
/// Prints one reference id per application and exits 0/1.
pub fn run_submit_smoke(config_path: Option<PathBuf>) {
    if bootstrap(config_path.as_deref(), true).is_none() {
        std::process::exit(2);
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime for submit smoke: {}", e);
            std::process::exit(1);
        }
    };

    let mut failed = false;
    for kind in ApplicationKind::ALL {
        let outcome = rt.block_on(async {
            for_application!(kind, A => submit_sample::<A>().await)
        });
        match outcome {
            Ok(reference) => println!("{:<12} {}", kind.as_id(), reference),
            Err(e) => {
                failed = true;
                error!(
                    "[PHASE: smoke] [STEP: submit] {} failed: {:#}",
                    kind.as_id(),
                    e
                );
                eprintln!("{:<12} FAILED: {:#}", kind.as_id(), e);
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}
