mod cli;

use colored::Colorize;

fn main() {
    let cli = cli::CommandLineInterface::load();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_env("GENCODEC_LOG")
        .format_timestamp(None)
        .init();
    if let Err(error) = cli.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
