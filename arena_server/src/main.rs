use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match arena_server::run_with_config().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "arena server exited with error");
            eprintln!("arena server error: {e}");
            ExitCode::FAILURE
        }
    }
}
