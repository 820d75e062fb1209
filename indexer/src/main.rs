use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_core::persist::{is_encodable, load_engine, save_index, save_options, save_stats, IndexPaths};
use search_core::{build, collect, Document, QueryEngine, QueryKind, QueryResults, TokenizerOptions};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a sentiment-aware TF-IDF index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and corpus stats from crawler output (JSON/JSONL file or directory)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: String,
        /// The feed was crawled with --remove-stopwords; queries drop stopwords too
        #[arg(long, default_value_t = false)]
        remove_stopwords: bool,
        /// The feed was crawled with --stem; queries are stemmed too
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Run a single query against a persisted index
    Search {
        /// Index directory path
        #[arg(long, default_value = "./index")]
        index: String,
        /// Query mode: and | or
        #[arg(long, default_value = "and")]
        mode: QueryKind,
        /// Query text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Interactive query loop over a persisted index (skips the crawl)
    Shell {
        /// Index directory path
        #[arg(long, default_value = "./index")]
        index: String,
        /// Initial query mode: and | or
        #[arg(long, default_value = "and")]
        mode: QueryKind,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, remove_stopwords, stem } => {
            build_index(&input, &output, TokenizerOptions { remove_stopwords, stem })
        }
        Commands::Search { index, mode, text } => {
            let engine = open_engine(&index)?;
            print_results(&engine.execute(mode, &text.join(" ")));
            Ok(())
        }
        Commands::Shell { index, mode } => shell(&open_engine(&index)?, mode),
    }
}

fn build_index(input: &str, output: &str, options: TokenizerOptions) -> Result<()> {
    let (documents, rejected): (Vec<Document>, Vec<Document>) =
        read_documents(Path::new(input))?.into_iter().partition(|d| is_encodable(&d.url));
    tracing::info!(num_docs = documents.len(), "ingested documents");
    if !rejected.is_empty() {
        let urls: Vec<&str> = rejected.iter().map(|d| d.url.as_str()).collect();
        tracing::warn!(?urls, "{} document(s) skipped: url is empty or contains whitespace", urls.len());
    }

    let stats = collect(&documents).with_context(|| format!("no documents found in {input}"))?;
    let index = build(&documents, &stats);

    let out_paths = IndexPaths::new(output);
    save_stats(&out_paths, &stats)?;
    let index_report = save_index(&out_paths, &index)?;
    save_options(&out_paths, &options)?;

    println!(
        "Indexed {} document(s), {} distinct term(s) -> {}",
        stats.document_count,
        index.len(),
        out_paths.root.display()
    );
    if index_report.skipped_count() > 0 {
        println!("{} terms skipped due to encoding", index_report.skipped_count());
    }
    if !rejected.is_empty() {
        println!("{} document(s) skipped: url is empty or contains whitespace", rejected.len());
    }
    Ok(())
}

/// Collect documents from a `.json`/`.jsonl` file, or every such file under a directory.
fn read_documents(input_path: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input_path.display());
    }

    let mut documents = Vec::new();
    for file in files {
        let before = documents.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut documents)?;
        } else {
            read_json(&file, &mut documents)?;
        }
        tracing::debug!(file = %file.display(), docs = documents.len() - before, "read feed file");
    }
    Ok(documents)
}

fn read_jsonl(file: &Path, documents: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document record", file.display(), i + 1))?;
        documents.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, documents: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("{}: invalid JSON", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                documents.push(serde_json::from_value(v).with_context(|| format!("{}: invalid document record", file.display()))?);
            }
        }
        serde_json::Value::Object(_) => {
            documents.push(serde_json::from_value(json).with_context(|| format!("{}: invalid document record", file.display()))?);
        }
        _ => tracing::warn!(file = %file.display(), "ignoring feed that is neither an object nor an array"),
    }
    Ok(())
}

fn open_engine(index_dir: &str) -> Result<QueryEngine> {
    Ok(load_engine(&IndexPaths::new(index_dir))?)
}

fn shell(engine: &QueryEngine, mut mode: QueryKind) -> Result<()> {
    println!(
        "Loaded {} document(s), {} term(s). Type a query, `:and` / `:or` to switch mode, `:quit` to exit.",
        engine.stats().document_count,
        engine.index().len()
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{mode}> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":and" => mode = QueryKind::And,
            ":or" => mode = QueryKind::Or,
            text => print_results(&engine.execute(mode, text)),
        }
    }
    println!("Bye!");
    Ok(())
}

fn print_results(results: &QueryResults) {
    println!("{} query: {}", results.kind, results.raw_text);
    println!("Sentiment value: {}", results.sentiment);
    if results.is_empty() {
        println!("Your search didn't return any results.\n");
        return;
    }
    println!("{} page(s) found:", results.hits.len());
    println!("{:<20} {:<12} URL", "cosine similarity", "sentiment");
    for hit in &results.hits {
        println!("{:<20.10} {:<12} {}", hit.cosine_similarity, hit.sentiment, hit.url);
    }
    println!();
}
