//! Renders an HTML file to PNG or PDF with headless Chrome, driven by a generated puppeteer script
//! that runs under `node`.

use crate::{utils, Result};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    Png,
    Pdf,
}

serde_plain::derive_display_from_serialize!(OutputFormat);

impl OutputFormat {
    /// `.pdf` (any case) is PDF, everything else is PNG.
    pub(crate) fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => OutputFormat::Pdf,
            _ => OutputFormat::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct RenderOptions {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Device scale factor. Only changes the pixel size of PNG output.
    pub(crate) scale: u32,
    /// Extra wait after fonts are ready, in milliseconds.
    pub(crate) wait_ms: u64,
    /// PNG only.
    pub(crate) transparent: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2000,
            scale: 1,
            wait_ms: 2000,
            transparent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct Dimensions {
    pub(crate) width: u64,
    pub(crate) height: u64,
}

/// The JSON object the render script prints, or an equivalent built locally.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct RenderResult {
    pub(crate) success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl RenderResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Runs render scripts with a given `node` executable.
pub(crate) struct Renderer {
    node: PathBuf,
    timeout: Duration,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            timeout: RENDER_TIMEOUT,
        }
    }
}

impl Renderer {
    #[cfg(test)]
    fn with_node(node: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            node: node.into(),
            timeout,
        }
    }

    /// Renders `input` to `output`. Failures of the renderer itself are reported in the result;
    /// only local I/O problems are errors.
    pub(crate) async fn render(
        &self,
        input: &Path,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        if !input.is_file() {
            return Ok(RenderResult::failure(format!(
                "HTML file not found: {}",
                input.display()
            )));
        }
        let format = OutputFormat::from_path(output);
        utils::make_parent_dir(output).await?;

        let input = utils::canonicalize(input).await?;
        let output = absolute(output)?;
        let script = puppeteer_script(&input, &output, options, format)?;

        let mut script_file = tempfile::Builder::new()
            .prefix("render-")
            .suffix(".js")
            .tempfile()
            .context("Unable to create the render script")?;
        script_file
            .write_all(script.as_bytes())
            .context("Unable to write the render script")?;
        debug!("Wrote render script {}", script_file.path().display());

        let run = tokio::process::Command::new(&self.node)
            .arg(script_file.path())
            .kill_on_drop(true)
            .output();
        let result = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => RenderResult::failure(format!(
                "Rendering timed out ({}s)",
                self.timeout.as_secs()
            )),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => RenderResult::failure(
                "Node.js not found. Install Node.js and run: npm install puppeteer",
            ),
            Ok(Err(e)) => return Err(e).context("Unable to run node"),
            Ok(Ok(out)) if !out.status.success() => {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                let message = if stderr.is_empty() {
                    "Unknown error".to_string()
                } else {
                    stderr
                };
                serde_json::from_str(&message).unwrap_or_else(|_| RenderResult::failure(message))
            }
            Ok(Ok(out)) => {
                let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
                match serde_json::from_str(&stdout) {
                    Ok(result) => result,
                    Err(_) if output.is_file() => RenderResult {
                        success: true,
                        output: Some(output.display().to_string()),
                        format: Some(format),
                        dimensions: Some(dimensions(options, OutputFormat::Png)),
                        scale: Some(options.scale),
                        error: None,
                    },
                    Err(_) => RenderResult::failure(format!("Unexpected output: {stdout}")),
                }
            }
        };
        Ok(result)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Unable to determine the current directory")?
        .join(path))
}

/// Output size in pixels. PNG output is multiplied by the device scale factor.
fn dimensions(options: &RenderOptions, format: OutputFormat) -> Dimensions {
    let factor = match format {
        OutputFormat::Png => u64::from(options.scale),
        OutputFormat::Pdf => 1,
    };
    Dimensions {
        width: u64::from(options.width) * factor,
        height: u64::from(options.height) * factor,
    }
}

/// Builds the puppeteer script. Paths are embedded as JSON string literals.
fn puppeteer_script(
    input: &Path,
    output: &Path,
    options: &RenderOptions,
    format: OutputFormat,
) -> Result<String> {
    let url = Url::from_file_path(input)
        .map_err(|_| anyhow!("Unable to build a file URL for {}", input.display()))?;
    let url = serde_json::to_string(url.as_str())?;
    let out = serde_json::to_string(&output.display().to_string())?;
    let RenderOptions {
        width,
        height,
        scale,
        wait_ms,
        transparent,
    } = *options;
    let dims = dimensions(options, format);

    let capture = match format {
        OutputFormat::Pdf => format!(
            "await page.pdf({{
        path: {out},
        width: '{width}px',
        height: '{height}px',
        printBackground: true,
        margin: {{ top: 0, right: 0, bottom: 0, left: 0 }}
    }});"
        ),
        OutputFormat::Png => format!(
            "await page.screenshot({{
        path: {out},
        type: 'png',
        clip: {{ x: 0, y: 0, width: {width}, height: {height} }},
        omitBackground: {transparent}
    }});"
        ),
    };

    Ok(format!(
        "const puppeteer = require('puppeteer');

(async () => {{
    const browser = await puppeteer.launch({{
        headless: 'new',
        args: ['--no-sandbox', '--disable-setuid-sandbox', '--font-render-hinting=none']
    }});
    const page = await browser.newPage();
    await page.setViewport({{ width: {width}, height: {height}, deviceScaleFactor: {scale} }});
    await page.goto({url}, {{ waitUntil: 'networkidle0', timeout: 30000 }});
    await page.evaluateHandle('document.fonts.ready');
    await new Promise(r => setTimeout(r, {wait_ms}));
    {capture}
    await browser.close();
    console.log(JSON.stringify({{
        success: true,
        output: {out},
        format: '{format}',
        dimensions: {{ width: {dw}, height: {dh} }},
        scale: {scale}
    }}));
}})().catch(err => {{
    console.error(JSON.stringify({{ success: false, error: err.message }}));
    process.exit(1);
}});
",
        dw = dims.width,
        dh = dims.height,
    ))
}
