use consular_wizard::applications::ApplicationKind;
use std::path::PathBuf;

const USAGE: &str = "\
Usage:
  consular-wizard --tui=<etc|nol|attestation|appointment> [--config=<path>]
  consular-wizard --tui-smoke=<app>[:<step>]
  consular-wizard --submit-smoke [--config=<path>]";

fn parse_kind_or_exit(raw: &str) -> ApplicationKind {
    match raw.parse::<ApplicationKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let prefix = format!("{}=", flag);
    args.iter()
        .find_map(|a| a.strip_prefix(prefix.as_str()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let config_path = flag_value(&args, "--config").map(PathBuf::from);

    // Non-interactive submission smoke: every application, sample data, logging sink.
    // Prints one reference id per application and exits 0/1.
    if args.iter().any(|a| a == "--submit-smoke") {
        consular_wizard::run_submit_smoke(config_path);
        return;
    }

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific application/step and exits 0.
    // Usage: --tui-smoke=etc or --tui-smoke=nol:purpose
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or("etc");
        let (app, step) = match target.split_once(':') {
            Some((app, step)) => (app, Some(step.trim().to_string())),
            None => (target, None),
        };
        consular_wizard::run_tui_smoke(parse_kind_or_exit(app), step);
        return;
    }

    if let Some(app) = flag_value(&args, "--tui") {
        consular_wizard::run_tui(parse_kind_or_exit(app), config_path);
        return;
    }

    eprintln!("{}", USAGE);
    std::process::exit(2);
}
