use clap::Parser;

mod cli;

fn main() -> std::process::ExitCode {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
