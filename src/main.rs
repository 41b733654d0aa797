use std::time::{Duration, Instant};

use boilerkb::{
    DataDir,
    EngineConfig,
    RetrievalService,
    embedding::{Embedder, HashingEmbedder, UnavailableEmbedder},
    error,
    generation::OfflineGenerator,
    search,
    service::{IndexReport, QueryResponse},
    tagger,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("BOILERKB_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.config_file());
    let config = EngineConfig::load(&config_path)?;

    let embedder: Box<dyn Embedder> = if cli.keyword_only {
        Box::new(UnavailableEmbedder)
    } else {
        Box::new(HashingEmbedder::new(config.store.embedding_dimension))
    };
    let mut service = RetrievalService::open(
        &data_dir,
        config,
        embedder,
        Box::new(OfflineGenerator::default()),
    )?;

    match cli.command {
        Command::Index(args) => {
            let docs = match args.path {
                Some(path) => path,
                None => data_dir.documents_dir()?,
            };
            if args.force {
                let report = service.reindex(&docs)?;
                print_report(&report);
            } else {
                service.initialize(&docs, false);
                eprintln!(
                    "{} record(s) in the {} backend",
                    service.store().count()?,
                    service.store().backend_name()
                );
            }
        }
        Command::Query(args) => {
            service.initialize(&data_dir.documents_dir()?, false);
            let deadline = args
                .timeout_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms));
            let response = service.query_with_deadline(
                &args.question,
                args.max_context,
                deadline,
            );
            if args.json {
                println!("{}", serde_json::to_string(&response)?);
            } else {
                print_response(&response);
            }
        }
        Command::Search(args) => {
            let mut retrieval = service.config().retrieval.clone();
            retrieval.max_results = args.count;
            let analysis = tagger::analyze(&args.query);
            let results: Vec<_> = search::hybrid_search(
                service.store(),
                &args.query,
                &analysis,
                &retrieval,
            )?
            .into_iter()
            .filter(|r| r.score >= args.min_score)
            .collect();

            if args.json {
                search::format_json(&results, &args.query)?;
            } else {
                search::format_human(&results, &args.query);
            }
        }
        Command::Stats(args) => {
            let stats = service.store().stats()?;
            if args.json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("Backend: {}", stats.backend_name);
                println!("Records: {}", stats.total_records);
                if !stats.sample_sources.is_empty() {
                    println!("Sources:");
                    for source in &stats.sample_sources {
                        println!("  {source}");
                    }
                }
            }
        }
        Command::Status(args) => {
            cmd_status(&service, &data_dir, args.json)?;
        }
        Command::Clear => {
            if !service.store().clear() {
                return Err(error::Error::StoreWrite("clear"));
            }
            println!("Cleared all records.");
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn print_report(report: &IndexReport) {
    if report.seeded {
        eprintln!(
            "No document chunks found in {} file(s), indexed the built-in knowledge base.",
            report.files
        );
    } else {
        eprintln!(
            "Indexed {} chunk(s) from {} file(s)",
            report.chunks, report.files
        );
    }
    if report.failed_files > 0 {
        eprintln!("  {} file(s) could not be read", report.failed_files);
    }
    eprintln!(
        "  {} record(s) in the {} backend",
        report.total_records, report.backend
    );
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.response);
    if let Some(error) = &response.error {
        eprintln!("error: {error}");
    }
    if !response.sources.is_empty() {
        println!("\nSources:");
        for source in &response.sources {
            println!("  {source}");
        }
    }
    if let Some(confidence) = response.confidence {
        println!("Confidence: {confidence:.2}");
    }
    if response.degraded {
        eprintln!("(answer generated in degraded mode)");
    }
}

fn cmd_status(
    service: &RetrievalService,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let status = service.status();

    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    println!("Healthy: {}", if status.healthy { "yes" } else { "no" });
    println!(
        "Embeddings: {}",
        if status.embedder_available {
            "enabled"
        } else {
            "keyword only"
        }
    );
    match &status.store {
        Some(stats) => {
            println!("Backend: {}", stats.backend_name);
            println!("Records: {}", stats.total_records);
        }
        None => println!("Records: unavailable"),
    }
    let components: Vec<&str> =
        status.components.iter().map(|c| c.label()).collect();
    let defects: Vec<&str> = status.defects.iter().map(|d| d.label()).collect();
    println!("Components: {}", components.join(", "));
    println!("Defects: {}", defects.join(", "));
    Ok(())
}
