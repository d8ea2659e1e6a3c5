use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use vacancy_scraper::{
    PipelineConfig, PipelineObserver, PipelineOutcome, SearchRequest, SessionId, StatusEvent,
    VacancyPipeline,
};

/// 標準出力に進捗を表示する
struct ConsoleObserver;

#[async_trait]
impl PipelineObserver for ConsoleObserver {
    async fn on_status(&self, event: StatusEvent) {
        println!("• {}", event);
    }

    async fn on_progress(&self, completed: usize, total: usize) {
        let percent = completed * 100 / total.max(1);
        println!("  [{:>3}%] {}/{}", percent, completed, total);
    }
}

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vacancy_scraper=debug".into()),
        )
        .init();

    // 例: cargo run --example search -- "rust developer" 2 ./out
    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "rust developer".to_string());
    let pages: u32 = args.next().and_then(|p| p.parse().ok()).unwrap_or(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "./downloads".to_string()));

    let config = PipelineConfig::from_env().expect("invalid VACANCY_* environment");
    let pipeline = Arc::new(VacancyPipeline::with_http(config).expect("failed to build pipeline"));

    let sweeper = pipeline
        .sessions()
        .spawn_sweeper(std::time::Duration::from_secs(60));

    println!("=== Vacancy Search ===");

    let request = SearchRequest::new(query, pages);
    match pipeline
        .run_for_session(&SessionId::from("cli"), &request, &ConsoleObserver)
        .await
    {
        Ok(PipelineOutcome::Success { result, exports }) => {
            std::fs::create_dir_all(&out_dir).expect("failed to create output directory");
            for artifact in exports.artifacts() {
                let target = out_dir.join(&artifact.file_name);
                std::fs::copy(&artifact.path, &target).expect("failed to copy artifact");
                println!("saved {:?} ({} bytes)", target, artifact.size);
            }
            println!("{} vacancies, {} skipped", result.processed, result.skipped);
            // 一時ファイルの削除
            if let Err(e) = exports.close() {
                eprintln!("cleanup failed: {}", e);
            }
        }
        Ok(other) => println!("{}", other.message()),
        Err(e) => eprintln!("error: {}", e),
    }

    sweeper.abort();
}
