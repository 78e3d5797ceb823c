use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use index_core::tokenizer::TermGenerator;
use index_core::{
    AcceptAll, Database, DatabaseParams, DocId, DocMeta, ExpandDecider, ExpansionEngine,
    IndexBuilder, IndexPaths, MissingDocPolicy, PostingList, PostingWeighting, RSet, RejectTerms,
    RelevanceCount, RobertsonSelection, TermList,
};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    body: String,
    url: Option<String>,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect read-only inverted indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Weighting {
    Wdf,
    Tfidf,
    SmoothedTfidf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scoring {
    Robertson,
    Count,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// What to store as the posting weight
        #[arg(long, value_enum, default_value_t = Weighting::Wdf)]
        weighting: Weighting,
    },
    /// Print header statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
    },
    /// Print the posting list of a term
    Postings {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        term: String,
        /// Skip postings with a weight below this
        #[arg(long, default_value_t = 0.0)]
        min_weight: f32,
    },
    /// Print the term list of a document
    Termlist {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        doc: DocId,
    },
    /// Propose expansion terms from relevant documents
    Expand {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Relevant document ids, comma separated
        #[arg(long, value_delimiter = ',')]
        rset: Vec<DocId>,
        #[arg(long, default_value_t = 10)]
        max: usize,
        /// Terms to leave out, e.g. those already in the query
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        #[arg(long, value_enum, default_value_t = Scoring::Robertson)]
        scoring: Scoring,
        /// Ignore relevant ids that are not in the index
        #[arg(long, default_value_t = false)]
        skip_missing: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, weighting } => build_index(&input, &output, weighting),
        Commands::Stats { index } => stats(&index),
        Commands::Postings { index, term, min_weight } => postings(&index, &term, min_weight),
        Commands::Termlist { index, doc } => termlist(&index, doc),
        Commands::Expand { index, rset, max, exclude, scoring, skip_missing } => {
            expand(&index, rset, max, &exclude, scoring, skip_missing)
        }
    }
}

fn open(index: &str) -> Result<Database> {
    Database::open(&DatabaseParams::new(index)).with_context(|| format!("opening index at {index}"))
}

fn build_index(input: &str, output: &str, weighting: Weighting) -> Result<()> {
    let weighting = match weighting {
        Weighting::Wdf => PostingWeighting::Wdf,
        Weighting::Tfidf => PostingWeighting::TfIdf { smoothed: false },
        Weighting::SmoothedTfidf => PostingWeighting::TfIdf { smoothed: true },
    };
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
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
        bail!("input {input} is neither a file nor a directory");
    }
    files.sort();

    let mut builder = IndexBuilder::new().with_weighting(weighting);
    let mut next_doc_id: DocId = 1;
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for doc in docs {
            ingest_doc(&mut builder, next_doc_id, doc)?;
            next_doc_id += 1;
        }
    }

    let stats = builder.write(&IndexPaths::new(output))?;
    tracing::info!(output, doc_count = stats.doc_count, term_count = stats.term_count, "index build complete");
    Ok(())
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line).with_context(|| format!("parsing {}", file.display()))?);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    Ok(match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    })
}

fn ingest_doc(builder: &mut IndexBuilder, doc_id: DocId, doc: InputDoc) -> Result<()> {
    let mut gen = TermGenerator::new();
    let mut terms = gen.index_text(&doc.title, 2);
    // keep title and body phrases apart
    gen.increase_termpos(100);
    terms.extend(gen.index_text(&doc.body, 1));
    let meta = DocMeta { external_id: doc.id, title: doc.title, url: doc.url };
    builder.add_generated(doc_id, meta.to_record()?, &terms)?;
    Ok(())
}

fn stats(index: &str) -> Result<()> {
    let db = open(index)?;
    println!("documents: {}", db.doc_count());
    println!("terms: {}", db.dictionary().term_count());
    println!("average length: {:.2}", db.avg_doc_length());
    Ok(())
}

fn postings(index: &str, term: &str, min_weight: f32) -> Result<()> {
    let db = open(index)?;
    let mut pl = db.open_posting_list(term.as_bytes())?;
    println!("{}", pl.description());
    pl.next(min_weight)?;
    while !pl.at_end()? {
        println!("{}\t{:.4}", pl.current_doc_id()?, pl.current_weight()?);
        pl.next(min_weight)?;
    }
    Ok(())
}

fn termlist(index: &str, doc_id: DocId) -> Result<()> {
    let db = open(index)?;
    let doc = db.open_document(doc_id)?;
    if let Ok(meta) = doc.meta() {
        println!("{} ({})", meta.title, meta.external_id);
    }
    let mut tl = db.open_term_list(doc_id)?;
    tl.next()?;
    while !tl.at_end()? {
        println!(
            "{}\twdf={}\ttermfreq={}",
            String::from_utf8_lossy(tl.current_term()?),
            tl.current_wdf()?,
            tl.current_termfreq()?
        );
        tl.next()?;
    }
    Ok(())
}

fn expand(
    index: &str,
    rset: Vec<DocId>,
    max: usize,
    exclude: &[String],
    scoring: Scoring,
    skip_missing: bool,
) -> Result<()> {
    let db = open(index)?;
    let rset: RSet = rset.into_iter().collect();
    let reject;
    let decider: &dyn ExpandDecider = if exclude.is_empty() {
        &AcceptAll
    } else {
        reject = RejectTerms::new(exclude);
        &reject
    };
    let policy = if skip_missing { MissingDocPolicy::Skip } else { MissingDocPolicy::Fail };
    let engine = ExpansionEngine::new(&db).with_missing_docs(policy);
    let eset = match scoring {
        Scoring::Robertson => engine.expand(&rset, max, decider, &RobertsonSelection)?,
        Scoring::Count => engine.expand(&rset, max, decider, &RelevanceCount)?,
    };
    println!("{}", serde_json::to_string_pretty(&eset)?);
    Ok(())
}
