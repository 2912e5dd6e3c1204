use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let workspace_root = match std::env::current_dir() {
        Ok(path) => path,
        Err(error) => {
            eprintln!("blockgrid: failed to resolve current directory: {error}");
            return ExitCode::FAILURE;
        }
    };
    let actor = std::env::var("BLOCKGRID_ACTOR").unwrap_or_else(|_| "planner".to_string());

    match blockgrid::run(workspace_root, &actor).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("blockgrid: {error}");
            ExitCode::FAILURE
        }
    }
}
