use async_trait::async_trait;
use miette::Result;

pub mod install;

#[async_trait]
pub trait WarrenCommand {
    async fn execute(self) -> Result<()>;
}
