//! Smoke test for the configured model endpoint: sends a canned summary
//! prompt and prints the raw and sanitized answers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;

use citybrief::llm::{provider_from_config, LlmRequest};
use citybrief::news::NewsItem;
use citybrief::prompt::PromptBuilder;
use citybrief::sanitize::ResponseSanitizer;
use citybrief::weather::WeatherReport;

#[derive(Parser, Debug)]
#[command(name = "check_llm", about = "Send one summary prompt to the configured model")]
struct Args {
    /// Path to config.toml (overrides config.default.toml)
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Also list the models the endpoint offers
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let default_path = PathBuf::from("config.default.toml");
    let config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        Some(args.config.as_path()).filter(|p| p.exists()),
    )
    .await?;

    let provider = provider_from_config(&config).context("no remote LLM configured in [llm]")?;
    let sanitizer = ResponseSanitizer::from_config(config.sanitizer.as_ref())?;

    println!("\n{}", "=".repeat(60));
    println!("Testing LLM Provider");
    println!("Model: {}", provider.model_name());
    println!("{}", "=".repeat(60));

    if args.list_models {
        println!("\n[Models]");
        match provider.list_models().await {
            Ok(models) => models.iter().for_each(|m| println!("  - {}", m)),
            Err(e) => eprintln!("✗ Failed: {}", e),
        }
    }

    let weather = WeatherReport::mock("北京");
    let news = vec![
        NewsItem::new("北京地铁新线今日开通", "北京地铁新线路开通运营，覆盖朝阳区和海淀区。"),
        NewsItem::new("全国多地迎来降温", "冷空气南下，多地气温下降。"),
    ];
    let prompt = PromptBuilder::default().summary_prompt(&weather, &news, None);

    println!("\n[Summary prompt]");
    match provider.generate(LlmRequest::new(prompt)).await {
        Ok(response) => {
            println!("✓ Success!");
            println!("--- raw ---\n{}", response.content);
            println!("--- sanitized ---\n{}", sanitizer.clean(&response.content));
            println!(
                "Usage: {} tokens (prompt: {}, completion: {})",
                response.usage.total_tokens,
                response.usage.prompt_tokens,
                response.usage.completion_tokens
            );
        }
        Err(e) => eprintln!("✗ Failed: {}", e),
    }

    println!("\n{}", "=".repeat(60));
    Ok(())
}
