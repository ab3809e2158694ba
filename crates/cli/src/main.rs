use std::process::ExitCode;

fn main() -> ExitCode {
    ratedesk_cli::run()
}
