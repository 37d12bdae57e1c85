use std::process::ExitCode;

fn main() -> ExitCode {
    lashbook_cli::run()
}
