//! `mdchat render`: Markdown from a file or stdin to an HTML fragment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use mdchat_markdown::{normalize_model_text, scan_blocks, ContentOrigin, ParserStrategy, RenderPipeline};

#[derive(Debug, Default)]
pub struct RenderOptions {
    pub file: Option<PathBuf>,
    pub strategy: ParserStrategy,
    /// Treat the input as user text: escape only.
    pub user: bool,
    pub enhance: bool,
    /// Print the fallback parser's block stream as JSON instead of HTML.
    pub blocks: bool,
}

pub async fn run(options: &RenderOptions) -> Result<()> {
    let input = match &options.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read stdin")?;
            input
        }
    };
    println!("{}", render(&input, options)?);
    Ok(())
}

pub fn render(input: &str, options: &RenderOptions) -> Result<String> {
    if options.blocks {
        let blocks = scan_blocks(&normalize_model_text(input));
        return Ok(serde_json::to_string_pretty(&blocks)?);
    }

    let pipeline = RenderPipeline::new(options.strategy);
    let origin = if options.user {
        ContentOrigin::User
    } else {
        ContentOrigin::Assistant
    };
    Ok(if options.enhance {
        pipeline.render_enhanced(input, origin)
    } else {
        pipeline.render(input, origin)
    })
}
