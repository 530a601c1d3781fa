use anyhow::Result;

use crate::app::Services;
use crate::cli::args::RunArgs;
use crate::error::{ErrorCode, RelayError};
use crate::opencode::{RunLauncher, RunRequest};
use crate::orchestrator::{collect, final_render, RunOutcome};
use crate::render::to_plain_text;

/// The `run` subcommand.
///
/// Prints the final render as plain text on stdout and the session id on
/// stderr, so the session can be continued with `--session`.
pub async fn run_once(services: &Services, args: RunArgs) -> Result<()> {
    let working_dir = args.dir.or_else(|| services.config.default_dir.clone());
    if let Some(dir) = &working_dir {
        if !dir.is_dir() {
            return Err(RelayError::config(format!("{} is not a directory", dir.display())).into());
        }
    }

    let request = RunRequest::new(args.message)
        .with_session(args.session)
        .with_working_dir(working_dir)
        .with_model(args.model)
        .with_agent(args.agent)
        .with_command(args.command)
        .with_files(args.files);

    let limits = services.config.render_limits();
    let handle = services.runner.start(request);
    let (outcome, accumulator, diagnostics) = collect(handle, limits).await;

    let blocks = final_render(&outcome, &accumulator, &diagnostics, &limits);
    println!("{}", to_plain_text(&blocks));

    if let Some(session) = outcome.session_id() {
        eprintln!("session: {}", session);
    }

    match outcome {
        RunOutcome::Completed(done) if done.success() => Ok(()),
        RunOutcome::Completed(done) => Err(RelayError::Execution {
            code: ErrorCode::EXEC_SUBPROCESS_FAILED,
            message: format!("opencode exited with code {}", done.exit_code),
            command: Some("opencode run".to_string()),
            exit_code: Some(done.exit_code),
            source: None,
        }
        .into()),
        RunOutcome::Failed(message) => Err(RelayError::execution(message).into()),
    }
}
