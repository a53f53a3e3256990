use {anyhow::Result, clap::Subcommand, projectp_config::ProjectPConfig};

#[derive(Subcommand, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML (token redacted).
    #[default]
    Show,
    /// Validate the effective configuration, including the bot token.
    Check,
}

pub fn handle_config(action: ConfigAction, config: &ProjectPConfig) -> Result<()> {
    match action {
        ConfigAction::Show => show(config),
        ConfigAction::Check => check(config),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn show(config: &ProjectPConfig) -> Result<()> {
    match projectp_config::find_config_file() {
        Some(path) => eprintln!("# discovered {}", path.display()),
        None => eprintln!("# no config file discovered; defaults + environment"),
    }
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &ProjectPConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

fn check(config: &ProjectPConfig) -> Result<()> {
    match projectp_config::validate(config, true) {
        Ok(()) => {
            eprintln!("{BOLD}{GREEN}ok{RESET} configuration is valid");
            Ok(())
        },
        Err(e) => {
            eprintln!("{BOLD}{RED}error{RESET} {e}");
            std::process::exit(1);
        },
    }
}
