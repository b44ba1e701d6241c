use clap::Parser;
use hookbridge::Settings;
use hookbridge::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        // notify runs inside the agent's hooks; a broken settings file must not lose the event
        Err(e) if matches!(cli.command, Commands::Notify { .. }) => {
            eprintln!("Warning: ignoring configuration, using defaults: {e}");
            Settings::default()
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    hookbridge::logging::init_with_config(&settings.logging);

    if let Err(e) = cli::run(cli.command, &settings).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
