use std::process::ExitCode;

fn main() -> ExitCode {
    pricepromo_cli::run()
}
