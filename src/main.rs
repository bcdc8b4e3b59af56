use std::process;

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use proclang::{parse, Diagnostics, Scanner, SymTable};

use crate::config::Config;

mod config;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proclang=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run() {
        Ok(true) => (),
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("proclang: {:#}", err);
            process::exit(2);
        }
    }
}

/// Returns whether the program parsed without errors.
fn run() -> Result<bool> {
    let config = Config::try_parse()?;
    debug!(input = %config.input, max_depth = config.options.max_depth, "parsing");

    if config.dump_tokens {
        dump_tokens(&config.input)?;
    }

    let mut diagnostics = Diagnostics::new();
    let res = parse(&config.input, &mut diagnostics, config.options);
    report(&diagnostics);

    let symbols = res.with_context(|| format!("cannot parse {}", config.input))?;
    if config.dump_symbols {
        dump(&symbols);
    }
    Ok(!diagnostics.has_errors())
}

fn report(diagnostics: &Diagnostics) {
    let by_line = diagnostics.by_line();
    for line in by_line.keys().sorted() {
        for message in by_line.get_vec(line).into_iter().flatten() {
            println!("{}", message);
        }
    }
    for e in &diagnostics.symbol {
        println!("{}", e);
    }
    if !diagnostics.is_empty() {
        println!(
            "{} lexical, {} syntax ({} warnings), {} symbol",
            diagnostics.lexical.len(),
            diagnostics.syntax_errors().count(),
            diagnostics.syntax_warnings().count(),
            diagnostics.symbol.len(),
        );
    }
}

/// Prints the raw token stream. Diagnostics from this pass are discarded,
/// the parse that follows reports them.
fn dump_tokens(input: &str) -> Result<()> {
    let mut symbols = SymTable::new();
    let mut diagnostics = Diagnostics::new();
    let tokens = Scanner::open(input)
        .and_then(|mut scanner| scanner.scan_all(&mut symbols, &mut diagnostics))
        .with_context(|| format!("cannot scan {}", input))?;
    println!("tokens:");
    for token in tokens {
        println!("    {}", token);
    }
    Ok(())
}

fn dump(symbols: &SymTable) {
    println!("globals:");
    for symbol in symbols.globals() {
        println!("    {}", symbol);
    }
}
