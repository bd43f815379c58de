#[tokio::main]
async fn main() -> Result<(), inline_translator::BoxError> {
    inline_translator::run().await
}
