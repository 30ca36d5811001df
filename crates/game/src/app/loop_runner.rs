use std::process::ExitCode;

use tracing::error;

use super::bootstrap::AppWiring;
use super::gameplay;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = gameplay::run_day(app.slot) {
        error!(error = %err, "day_run_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
