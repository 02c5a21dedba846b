//! `freee export`: dumps freee resources to JSON-lines files, optionally loading them into
//! BigQuery.

use crate::api::{Freee, Params};
use crate::args::ExportArgs;
use crate::commands::Out;
use crate::{cloud, utils, Config, Result};
use anyhow::{bail, Context};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write;
use std::path::PathBuf;
use tracing::{info, warn};

const WALLETABLE_TYPES: &[&str] = &["bank_account", "credit_card", "wallet"];

/// One exportable freee list endpoint.
#[derive(Debug)]
struct Resource {
    name: &'static str,
    /// `{company_id}` is replaced with the company id.
    endpoint: &'static str,
    /// The query parameter that takes `--start-date`, if the endpoint filters by date.
    date_param: Option<&'static str>,
}

const RESOURCES: &[Resource] = &[
    Resource {
        name: "deals",
        endpoint: "deals",
        date_param: Some("start_issue_date"),
    },
    Resource {
        name: "manual_journals",
        endpoint: "manual_journals",
        date_param: Some("start_issue_date"),
    },
    Resource {
        name: "wallet_txns",
        endpoint: "wallet_txns",
        date_param: Some("start_date"),
    },
    Resource {
        name: "account_items",
        endpoint: "account_items",
        date_param: None,
    },
    Resource {
        name: "walletables",
        endpoint: "walletables",
        date_param: None,
    },
    Resource {
        name: "partners",
        endpoint: "partners",
        date_param: None,
    },
    Resource {
        name: "items",
        endpoint: "items",
        date_param: None,
    },
    Resource {
        name: "sections",
        endpoint: "sections",
        date_param: None,
    },
    Resource {
        name: "tags",
        endpoint: "tags",
        date_param: None,
    },
    Resource {
        name: "taxes",
        endpoint: "taxes/companies/{company_id}",
        date_param: None,
    },
];

/// A resource that was written to disk.
#[derive(Debug, Clone, Serialize)]
pub(super) struct Exported {
    pub(super) name: String,
    pub(super) records: usize,
    pub(super) path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) uri: Option<String>,
}

fn selected(only: &[String]) -> Result<Vec<&'static Resource>> {
    if only.is_empty() {
        return Ok(RESOURCES.iter().collect());
    }
    let mut chosen = Vec::new();
    for name in only.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        match RESOURCES.iter().find(|r| r.name == name) {
            Some(resource) => chosen.push(resource),
            None => {
                let known: Vec<&str> = RESOURCES.iter().map(|r| r.name).collect();
                bail!("Unknown resource '{name}'; expected one of {}", known.join(", "))
            }
        }
    }
    Ok(chosen)
}

async fn fetch(freee: &Freee, resource: &Resource, start_date: Option<&str>) -> Result<Vec<Value>> {
    let endpoint = resource
        .endpoint
        .replace("{company_id}", &freee.company_id().await?.to_string());
    let mut params: Params = Vec::new();
    if let (Some(param), Some(date)) = (resource.date_param, start_date) {
        params.push((param, date.to_string()));
    }
    if resource.name != "walletables" {
        return freee.paginate(&endpoint, resource.name, &params).await;
    }
    // walletables only lists one type per request.
    let mut all = Vec::new();
    for walletable_type in WALLETABLE_TYPES {
        let mut typed_params = params.clone();
        typed_params.push(("type", walletable_type.to_string()));
        all.extend(freee.paginate(&endpoint, resource.name, &typed_params).await?);
    }
    Ok(all)
}

fn stamp(records: &mut [Value], fetched_at: &str) {
    for record in records {
        if let Value::Object(map) = record {
            map.insert("_fetched_at".to_string(), json!(fetched_at));
        }
    }
}

pub(super) async fn export(
    freee: &Freee,
    config: &Config,
    args: &ExportArgs,
) -> Result<Out<Vec<Exported>>> {
    let resources = selected(&args.only)?;
    let upload = match (&args.upload, &args.bq_dataset) {
        (Some(prefix), _) => Some(prefix.clone()),
        (None, Some(_)) => Some(
            config
                .gcs_bucket()
                .context("--bq-dataset needs --upload or gcs_bucket in config.json")?
                .to_string(),
        ),
        (None, None) => None,
    };
    utils::make_dir(&args.out_dir).await?;

    let mut exported = Vec::new();
    for resource in resources {
        let mut records = fetch(freee, resource, args.start_date.as_deref()).await?;
        if records.is_empty() {
            warn!("No {} found, skipping", resource.name);
            continue;
        }
        stamp(&mut records, &Utc::now().to_rfc3339());
        let file_name = format!("{}.jsonl", resource.name);
        let path = args.out_dir.join(&file_name);
        utils::write_jsonl(&path, &records).await?;
        info!("Wrote {} {} to {}", records.len(), resource.name, path.display());

        let uri = match &upload {
            Some(prefix) => {
                let uri = cloud::gcs_uri(prefix, &file_name)?;
                cloud::gsutil_cp(&path, &uri).await?;
                if let Some(dataset) = &args.bq_dataset {
                    cloud::bq_load(&format!("{dataset}.{}", resource.name), &uri).await?;
                }
                Some(uri)
            }
            None => None,
        };
        exported.push(Exported {
            name: resource.name.to_string(),
            records: records.len(),
            path,
            uri,
        });
    }

    let mut message = format!("Exported {} resources to {}", exported.len(), args.out_dir.display());
    for e in &exported {
        write!(message, "\n  {}: {} records", e.name, e.records)?;
    }
    Ok(Out::new(message, exported))
}
