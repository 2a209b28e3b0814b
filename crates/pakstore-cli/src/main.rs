use atty::Stream;
use clap::Parser;
use color_eyre::Result;

mod cli;
mod dispatch;
mod outcome;
mod style;

use cli::PakStoreCli;
use outcome::{CommandStatus, ExecutionOutcome, Line};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PakStoreCli::parse();
    init_tracing(cli.trace, cli.quiet, cli.verbose);

    let outcome = dispatch::execute(&cli);
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, quiet: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("pakstore_cli={level},pakstore_core={level},pakstore_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &PakStoreCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if cli.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{}", style.status(outcome.status, &outcome.message));
        }
    } else {
        println!("{}", style.status(outcome.status, &outcome.message));
        for line in &outcome.lines {
            match line {
                Line::Heading(text) => println!("{}", style.heading(text)),
                Line::Item(text) => println!("  {text}"),
                Line::Note(text) => println!("  {}", style.dimmed(text)),
            }
        }
        if let Some(hint) = outcome.details.get("hint").and_then(|hint| hint.as_str()) {
            println!("{}", style.info(&format!("Hint: {hint}")));
        }
    }

    Ok(code)
}
