use std::process::ExitCode;

fn main() -> ExitCode {
    extract_cp_lib::run()
}
