use anyhow::Result;

/// The tracker runs on a single event loop. The timer tick and store writes never need
/// more than one thread.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
