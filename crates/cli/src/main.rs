use clap::Parser;

fn main() -> anyhow::Result<()> {
    idforge_observability::init();

    let args = idforge_cli::Args::parse();
    let summary = idforge_cli::run(&args)?;

    print!("{}", idforge_cli::report::render(&summary, &args));
    Ok(())
}
