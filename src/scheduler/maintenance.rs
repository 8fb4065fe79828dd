use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;

/// A collaborator exposing one idempotent refresh, e.g. repopulating a reference table.
pub trait Refresh: Send + Sync + 'static {
    fn refresh(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Wraps `target` into a scheduler task that logs start, duration and failure of each refresh.
pub fn refresh_task<R: Refresh>(
    name: impl Into<Arc<str>>,
    target: Arc<R>,
) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
    let name: Arc<str> = name.into();
    move || {
        let name = Arc::clone(&name);
        let target = Arc::clone(&target);
        async move {
            tracing::info!(task = %name, "starting refresh");
            let start = Instant::now();
            match target.refresh().await {
                Ok(()) => {
                    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                    tracing::info!(
                        task = %name,
                        elapsed_ms = format!("{elapsed_ms:.0}"),
                        "finished refresh"
                    );
                }
                Err(err) => {
                    tracing::error!(task = %name, error = %format!("{err:#}"), "refresh failed");
                }
            }
        }
        .boxed()
    }
}
