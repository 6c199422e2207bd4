use std::process::ExitCode;

use lucene_expr::{ParseOptions, PostgresDriver, from_json, parse, render, to_json};

fn main() -> ExitCode {
    let Some(query) = std::env::args().nth(1) else {
        eprintln!("Please provide a lucene query");
        return ExitCode::FAILURE;
    };

    match run(&query) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let e = parse(query, &ParseOptions::default())?;
    println!("Parsed  input: {e}");
    println!("Verbose input: {e:#}");

    let raw = to_json(&e)?;
    println!("\n{raw}\n");

    let reparsed = from_json(&raw)?;
    println!("Reparsed input: {reparsed}");

    let sql = render(&e, &PostgresDriver::new())?;
    println!("SQL     output: {sql}");
    Ok(())
}
