use anyhow::{Context, Result};
use crpt_client::{ClientResult, Config, CrptClient, Document, Submission};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, clap::Args)]
pub struct SubmitArgs {
    /// Number of documents to submit
    #[arg(long, short = 'n', default_value_t = 12)]
    pub count: usize,

    /// JSON file with the document to submit (default: a placeholder document)
    #[arg(long)]
    pub document: Option<PathBuf>,

    /// Signature header value (default: a fresh random UUID per request)
    #[arg(long)]
    pub signature: Option<String>,

    /// Number of concurrent submitters sharing one rate limit
    #[arg(long, short = 'j', default_value_t = 1)]
    pub concurrency: usize,

    /// Give up on a submission if no rate-limit slot frees within this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Debug)]
struct Job {
    client: CrptClient,
    document: Document,
    signature: Option<String>,
    timeout: Option<Duration>,
}

impl Job {
    async fn submit(&self) -> ClientResult<Submission> {
        let signature = self
            .signature
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self.timeout {
            Some(timeout) => {
                self.client
                    .create_document_within(&self.document, &signature, timeout)
                    .await
            }
            None => self.client.create_document(&self.document, &signature).await,
        }
    }
}

/// Submit `count` documents, printing each response status.
pub async fn run_submit(config: &Config, args: SubmitArgs) -> Result<()> {
    let document = match &args.document {
        Some(path) => Document::from_json_file(path)
            .with_context(|| format!("Failed to read document from {}", path.display()))?,
        None => Document::placeholder(),
    };
    let client = CrptClient::new(config).context("Failed to create CRPT client")?;

    log::info!(
        "Submitting {} document(s) to {} at most {} per {:?}",
        args.count,
        config.api_url,
        config.request_limit,
        config.window()
    );

    let job = Arc::new(Job {
        client,
        document,
        signature: args.signature,
        timeout: args.timeout.map(Duration::from_secs),
    });
    let next = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let mut workers = JoinSet::new();
    for _ in 0..args.concurrency.max(1) {
        let job = Arc::clone(&job);
        let next = Arc::clone(&next);
        let failed = Arc::clone(&failed);
        let count = args.count;

        workers.spawn(async move {
            loop {
                let n = next.fetch_add(1, Ordering::SeqCst);
                if n >= count {
                    break;
                }
                match job.submit().await {
                    Ok(submission) => println!("#{} {}", n + 1, submission.status),
                    Err(e) if e.is_cancelled() => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        log::warn!("Submission #{} gave up waiting for a slot", n + 1);
                        println!("#{} skipped: {}", n + 1, e);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        println!("#{} error: {}", n + 1, e);
                    }
                }
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        joined.context("Submission worker panicked")?;
    }

    let failed = failed.load(Ordering::SeqCst);
    if failed > 0 {
        anyhow::bail!("{} of {} submission(s) failed", failed, args.count);
    }

    println!("\n✓ Submitted {} document(s)", args.count);
    Ok(())
}
