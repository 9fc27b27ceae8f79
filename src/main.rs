use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = msdn_docset::cli::Cli::parse();
    msdn_docset::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        msdn_docset::cli::Command::CreateDocset(args) => {
            msdn_docset::build::run(args).context("create docset")?;
        }
        msdn_docset::cli::Command::RewriteHtml(args) => {
            msdn_docset::rewrite::run(args).context("rewrite html")?;
        }
        msdn_docset::cli::Command::Index(args) => {
            msdn_docset::index::run(args).context("index")?;
        }
    }

    Ok(())
}
