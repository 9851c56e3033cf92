use miette::Result;
use warren::Warren;

#[async_std::main]
async fn main() -> Result<()> {
    Warren::load().await
}
