use std::sync::Arc;

use cross_region_reader::{respond, CustomResourceRequest, SsmParameterStore};
use lambda_runtime::{service_fn, LambdaEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        // cloudwatch adds its own timestamps and shows escape codes verbatim.
        .with_ansi(false)
        .without_time()
        .init();

    let store = Arc::new(SsmParameterStore::new());
    let func = service_fn(move |event: LambdaEvent<CustomResourceRequest>| {
        let store = store.clone();
        async move {
            let (request, _context) = event.into_parts();
            respond(request, store.as_ref()).await?;
            Ok::<(), lambda_runtime::Error>(())
        }
    });
    lambda_runtime::run(func).await?;
    Ok(())
}
