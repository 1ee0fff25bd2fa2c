use anyhow::Context as _;
use clap::Parser;
use std::{fs, path::PathBuf, time::Instant};
use tabula::grammar::Grammar;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The path of grammar definition file.
    input: PathBuf,

    /// Where to write the generated artifact. Defaults to `<input>.artifact.json`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also dump the sets, states and conflicts next to the artifact.
    #[arg(long)]
    automaton: bool,

    /// Emit the artifact without pretty printing.
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let in_file =
        fs::canonicalize(&args.input).context("failed to canonicalize the input file name")?;
    let out_file = args
        .output
        .clone()
        .unwrap_or_else(|| in_file.with_extension("artifact.json"));
    let automaton_file = out_file.with_extension("automaton");

    let start = Instant::now();
    let grammar = Grammar::from_file(&in_file)
        .with_context(|| format!("failed to load grammar from {}", in_file.display()))?;
    tracing::info!("grammar loaded in {:?}", start.elapsed());

    let start = Instant::now();
    let generated = tabula::generate(&grammar);
    tracing::info!(
        "{} states generated in {:?}",
        generated.automaton.states.len(),
        start.elapsed()
    );

    let diagnostics = &generated.diagnostics;
    if !diagnostics.empty_nonterminals.is_empty() {
        println!(
            "[warning] The following nonterminals have no associated production rule: {:?}",
            diagnostics.empty_nonterminals
        );
    }
    for conflict in &diagnostics.conflicts {
        println!("[warning] {}", conflict);
    }
    if args.automaton && !diagnostics.conflicts.is_empty() {
        println!("See {} for details.", automaton_file.display());
    }

    // dump results.
    let json = generated
        .artifact
        .to_json(!args.compact)
        .context("failed to serialize the artifact")?;
    fs::write(&out_file, json)
        .with_context(|| format!("failed to write the artifact to {}", out_file.display()))?;
    if args.automaton {
        let report = format!(
            "{}\n{}\n{}\n{}",
            grammar,
            diagnostics,
            generated.automaton.display(&grammar),
            generated.table.display(&grammar)
        );
        fs::write(&automaton_file, report).context("writing .automaton")?;
    }

    Ok(())
}
