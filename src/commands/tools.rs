//! `render` and `scrape`, the commands that drive external tools and need no configuration.

use crate::args::{RenderArgs, ScrapeArgs};
use crate::commands::Out;
use crate::render::{RenderOptions, RenderResult, Renderer};
use crate::scrape::{Firecrawl, ScrapeSummary};
use crate::Result;
use anyhow::{bail, Context};
use std::fmt::Write;

fn render_options(args: &RenderArgs) -> RenderOptions {
    RenderOptions {
        width: args.width,
        height: args.height,
        scale: args.scale,
        wait_ms: args.wait,
        transparent: args.transparent,
    }
}

pub(super) async fn render(args: &RenderArgs) -> Result<Out<RenderResult>> {
    let result = Renderer::default()
        .render(&args.input, &args.output, &render_options(args))
        .await?;
    if !result.success {
        bail!(
            "Rendering failed: {}",
            result.error.as_deref().unwrap_or("Unknown error")
        );
    }
    let format = result
        .format
        .map(|f| f.to_string().to_uppercase())
        .unwrap_or_else(|| "Output".to_string());
    let mut message = format!(
        "{format} rendered: {}",
        result
            .output
            .clone()
            .unwrap_or_else(|| args.output.display().to_string())
    );
    if let Some(d) = result.dimensions {
        write!(message, "\nSize: {}x{}px", d.width, d.height)?;
    }
    Ok(Out::new(message, result))
}

pub(super) async fn scrape(args: &ScrapeArgs) -> Result<Out<ScrapeSummary>> {
    let cwd = std::env::current_dir().context("Unable to determine the current directory")?;
    let summary = Firecrawl::from_env(&cwd)?
        .download(&args.url, &args.out_dir, args.limit)
        .await?;
    Ok(Out::new(
        format!(
            "Scraped {} pages into {} ({} skipped, {} failed).",
            summary.scraped.len(),
            args.out_dir.display(),
            summary.skipped,
            summary.failed.len()
        ),
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(dir: &TempDir) -> RenderArgs {
        RenderArgs {
            input: dir.path().join("missing.html"),
            output: dir.path().join("out.png"),
            width: 1200,
            height: 628,
            scale: 2,
            wait: 500,
            transparent: true,
        }
    }

    #[test]
    fn test_render_options_from_args() {
        let dir = TempDir::new().unwrap();
        let options = render_options(&args(&dir));
        assert_eq!(
            options,
            RenderOptions {
                width: 1200,
                height: 628,
                scale: 2,
                wait_ms: 500,
                transparent: true,
            }
        );
    }

    #[tokio::test]
    async fn test_render_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = render(&args(&dir)).await.unwrap_err();
        assert!(err.to_string().contains("HTML file not found"));
    }
}
