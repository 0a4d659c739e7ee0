use std::process::ExitCode;

fn main() -> ExitCode {
    ration_cli::run()
}
