//! Downloads a documentation site as markdown files with the `firecrawl` command-line tool.

use crate::{utils, Result};
use anyhow::{anyhow, bail, Context};
use encoding_rs::UTF_16LE;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use url::Url;

const API_KEY: &str = "FIRECRAWL_API_KEY";
const ENV_FILE: &str = ".env";
const ENV_SEARCH_PARENTS: usize = 5;

/// Finds `.env` in `start` or one of its first five parents.
pub(crate) fn find_env_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(ENV_SEARCH_PARENTS + 1)
        .map(|dir| dir.join(ENV_FILE))
        .find(|path| path.is_file())
}

/// Reads the variables of a `.env` file, which may be UTF-16LE with a BOM.
pub(crate) fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    let text = if bytes.starts_with(&[0xFF, 0xFE]) {
        UTF_16LE.decode(&bytes).0.into_owned()
    } else {
        crate::tabular::decode(&bytes)
    };
    dotenvy::from_read_iter(text.as_bytes())
        .map(|item| item.with_context(|| format!("Unable to parse {}", path.display())))
        .collect()
}

/// Keeps the `http` lines of `firecrawl map` output, dropping `?hl=` language variants.
pub(crate) fn filter_urls(output: &str, limit: usize) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http") && !line.contains("?hl="))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// `https://x.dev/docs/api/auth` becomes `api_auth.md`; the site root becomes `index.md`.
pub(crate) fn file_name(url: &str) -> Result<String> {
    let url = Url::parse(url).with_context(|| format!("Invalid URL '{url}'"))?;
    let path = url.path();
    let path = path.strip_prefix("/docs/").unwrap_or(path);
    let name = path.replace('/', "_");
    let name = name.strip_prefix('_').unwrap_or(&name);
    let name = if name.is_empty() { "index" } else { name };
    Ok(format!("{name}.md"))
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub(crate) struct ScrapeSummary {
    pub(crate) scraped: Vec<PathBuf>,
    pub(crate) skipped: usize,
    pub(crate) failed: Vec<String>,
}

/// Runs `firecrawl` with the API key and the rest of the `.env` variables in its environment.
pub(crate) struct Firecrawl {
    program: PathBuf,
    envs: HashMap<String, String>,
}

impl Firecrawl {
    /// Loads `.env` from `cwd` (or a parent) and requires `FIRECRAWL_API_KEY` there or in the
    /// process environment.
    pub(crate) fn from_env(cwd: &Path) -> Result<Self> {
        let mut envs = match find_env_file(cwd) {
            Some(path) => {
                info!("Loading .env from {}", path.display());
                read_env_file(&path)?
            }
            None => HashMap::new(),
        };
        if !envs.contains_key(API_KEY) {
            let key = std::env::var(API_KEY).map_err(|_| {
                anyhow!("{API_KEY} is not set; add it to the environment or a .env file")
            })?;
            envs.insert(API_KEY.to_string(), key);
        }
        Ok(Self {
            program: PathBuf::from("firecrawl"),
            envs,
        })
    }

    #[cfg(test)]
    fn with_program(program: impl Into<PathBuf>, envs: HashMap<String, String>) -> Self {
        Self {
            program: program.into(),
            envs,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("Running firecrawl {}", args.join(" "));
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .envs(&self.envs)
            .output()
            .await
            .context("Unable to run firecrawl; is it installed and on PATH?")?;
        if !output.status.success() {
            bail!(
                "firecrawl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Maps `root_url` and writes one markdown file per page into `out_dir`. Pages whose file
    /// already exists are skipped. A failed page is logged and the rest continue.
    pub(crate) async fn download(
        &self,
        root_url: &str,
        out_dir: &Path,
        limit: usize,
    ) -> Result<ScrapeSummary> {
        info!("Mapping URLs for {root_url}");
        let limit_arg = limit.to_string();
        let map = self
            .run(&["map", root_url, "--limit", &limit_arg])
            .await
            .context("firecrawl map failed")?;
        let urls = filter_urls(&map, limit);
        info!("Found {} target URLs", urls.len());
        utils::make_dir(out_dir).await?;

        let mut summary = ScrapeSummary::default();
        for url in urls {
            match self.download_page(&url, out_dir).await {
                Ok(Some(path)) => summary.scraped.push(path),
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!("Failed to scrape {url}: {e:#}");
                    summary.failed.push(url);
                }
            }
        }
        Ok(summary)
    }

    async fn download_page(&self, url: &str, out_dir: &Path) -> Result<Option<PathBuf>> {
        let path = out_dir.join(file_name(url)?);
        if path.exists() {
            info!("Skipping (already exists): {url}");
            return Ok(None);
        }
        info!("Scraping {url} -> {}", path.display());
        let markdown = self.run(&["scrape", url, "markdown"]).await?;
        utils::write(&path, markdown).await?;
        Ok(Some(path))
    }
}
