use std::error::Error;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use evaluation::{EvalConfig, Evaluator};
use llm_service::LlmService;
use population_data::{FeedClient, chunk_records, normalize_national, normalize_state};
use rag_store::{RagConfig, RagStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from a .env file when present.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {e}");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("ingest") => ingest().await,
        Some("evaluate") => {
            let queries_file = args
                .next()
                .unwrap_or_else(|| "evaluation/queries.json".to_string());
            evaluate(&queries_file).await
        }
        _ => {
            eprintln!("Usage: dosm-rag-backend <ingest | evaluate [queries.json]>");
            std::process::exit(2);
        }
    }
}

/// Fetches both population feeds, normalizes and chunks them, and indexes
/// the chunks into Qdrant. A feed that fails to fetch is skipped; the
/// other feed still ingests.
async fn ingest() -> Result<(), Box<dyn Error>> {
    let llm = Arc::new(LlmService::from_env()?);
    let store = RagStore::new(RagConfig::from_env(), llm)?;
    let feed = FeedClient::new()?;

    let mut records = Vec::new();
    match feed.fetch_national().await {
        Ok(rows) => {
            let (recs, _) = normalize_national(&rows);
            records.extend(recs);
        }
        Err(e) => error!("National feed skipped: {e}"),
    }
    match feed.fetch_states().await {
        Ok(rows) => {
            let (recs, _) = normalize_state(&rows);
            records.extend(recs);
        }
        Err(e) => error!("State feed skipped: {e}"),
    }
    if records.is_empty() {
        return Err("no records ingested from either feed".into());
    }

    let (chunks, report) = chunk_records(&records);
    info!(
        "Built {} chunks ({} degenerate groups, {} averaged duplicates)",
        chunks.len(),
        report.degenerate_groups,
        report.averaged_duplicates
    );

    let ingest = store.ingest_chunks(&chunks).await?;
    if ingest.failed_batches > 0 {
        warn!(
            "{} batches failed; {}/{} chunks persisted",
            ingest.failed_batches, ingest.persisted, ingest.attempted
        );
    }

    println!(
        "Ingestion complete: {}/{} chunks persisted",
        ingest.persisted, ingest.attempted
    );
    Ok(())
}

/// Runs the evaluation query set against the answer endpoint and writes
/// the JSON and CSV artifacts.
async fn evaluate(queries_file: &str) -> Result<(), Box<dyn Error>> {
    let cfg = EvalConfig::from_env();
    let output_dir = cfg.output_dir.clone();

    let queries = evaluation::load_queries(queries_file)?;
    let evaluator = Evaluator::new(cfg)?;
    let summary = evaluator.run(&queries).await?;

    let json_path = evaluation::save_results(&summary, &output_dir)?;
    let csv_path = evaluation::save_csv_report(&summary, &output_dir)?;

    let report = evaluation::metrics::comprehensive_report(&summary);
    let history = evaluation::load_historical(&output_dir);
    match evaluation::metrics::analyze_trends(&history) {
        Ok(trends) => info!(
            "Stability over {} runs: {:.2}",
            trends.evaluations_count, trends.stability_analysis.overall_stability_score
        ),
        Err(e) => info!("Trend analysis skipped: {e}"),
    }

    let m = &summary.aggregate_metrics;
    println!("{}", "=".repeat(60));
    println!("RAG SYSTEM EVALUATION RESULTS");
    println!("{}", "=".repeat(60));
    println!("Total Queries: {}", m.total_queries);
    println!("Successful: {}", m.successful_queries);
    println!("Failed: {}", m.failed_queries);
    println!("Latency P50: {:.2}s", m.latency_p50);
    println!("Latency P95: {:.2}s", m.latency_p95);
    println!("Retrieval Hit Rate: {:.2}", m.retrieval_hit_rate_mean);
    println!("Hallucination Rate: {:.2}", m.hallucination_rate_mean);
    println!("Avg Citations per Query: {:.1}", m.avg_citations_per_query);
    println!(
        "Quality: {:.2} ({})",
        report.quality_score.overall_score, report.quality_score.performance_grade
    );
    for rec in &report.recommendations {
        println!("  - {rec}");
    }
    println!("{}", "=".repeat(60));
    println!("Results saved to: {}", json_path.display());
    println!("CSV report: {}", csv_path.display());
    Ok(())
}
