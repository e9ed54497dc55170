use anyhow::Result;
use async_trait::async_trait;

/// Opens an interactive page for the user, such as the sign-in form.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}
