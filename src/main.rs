use clap::Parser;
use opencode_relay::app::{handle_fatal_error, AppConfig};
use opencode_relay::cli::{execute_command, router::Exit, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::new(cli.verbose).with_config_path(cli.config);

    match execute_command(cli.command, &app).await {
        Ok(Exit::Normal) => {}
        Ok(Exit::Immediate) => std::process::exit(0),
        Err(e) => handle_fatal_error(e, app.verbose),
    }
}
