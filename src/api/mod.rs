//! Resource clients and the plumbing they share.
//!
//! Each client borrows a [`Session`] and turns domain calls into one or more
//! HTTP requests, delegating to the batch executor whenever a call fans out.

pub mod alerts;
pub mod cameras;
pub mod collections;
pub mod observations;
pub mod params;

pub use alerts::Alerts;
pub use cameras::Cameras;
pub use collections::Collections;
pub use observations::Observations;
pub use params::Params;

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::Session;
use crate::batch::{self, BatchFailure};
use crate::error::{Error, Result};
use crate::models::feature::{FeaturePage, RecordPage};
use crate::models::ImageRecord;

/// Default page size for index queries.
const DEFAULT_LIMIT: u64 = 100;

/// Server-side cap on the `skip` parameter. Results beyond it cannot be
/// paged to and the merged collection is marked truncated.
const MAX_SKIP: u64 = 4000;

/// A response page that knows the query's total result count.
pub(crate) trait IndexPage: DeserializeOwned {
    fn result_total(&self) -> Option<u64>;
}

impl IndexPage for FeaturePage {
    fn result_total(&self) -> Option<u64> {
        self.total()
    }
}

impl IndexPage for RecordPage {
    fn result_total(&self) -> Option<u64> {
        self.total
    }
}

/// Pages fetched by [`paginated_index`], plus per-page failures.
pub(crate) struct IndexPages<P> {
    pub pages: Vec<P>,
    pub total: u64,
    pub truncated: bool,
    pub failures: Vec<BatchFailure<u64>>,
}

/// Drive a paginated index query.
///
/// The first page is fetched alone to learn the total; remaining skips fan
/// out through the batch executor under the session's concurrency limit.
/// An error on the initial call aborts the query; later page failures are
/// reported alongside the pages that succeeded. Failure ids are skip
/// offsets, so callers can retry exactly the missing pages.
pub(crate) async fn paginated_index<P: IndexPage>(
    session: &Session,
    resource: &str,
    mut filters: params::Params,
) -> Result<IndexPages<P>> {
    let starting_skip = take_numeric(&mut filters, "skip")?.unwrap_or(0);
    let limit = take_numeric(&mut filters, "limit")?
        .unwrap_or(DEFAULT_LIMIT)
        .max(1);

    if starting_skip > MAX_SKIP {
        return Err(Error::Configuration(format!(
            "skip must be at most {MAX_SKIP}, got {starting_skip}"
        )));
    }

    let query = filters.query_string();
    let separator = if query.is_empty() { "" } else { "&" };
    let base = format!("{}/{}?{}{}", session.api_url(), resource, query, separator);
    let page_url = |skip: u64| format!("{base}skip={skip}&limit={limit}");

    let first: P = session.get_json(&page_url(starting_skip)).await?;
    let total = first.result_total().unwrap_or(0);

    if total <= starting_skip + limit {
        return Ok(IndexPages {
            pages: vec![first],
            total,
            truncated: false,
            failures: Vec::new(),
        });
    }

    let truncated = total > MAX_SKIP;
    if truncated {
        warn!(resource, total, "Skip cap reached; results will be truncated");
    }

    let skips: Vec<u64> = (starting_skip + limit..total)
        .step_by(limit as usize)
        .take_while(|skip| *skip <= MAX_SKIP)
        .collect();

    let outcome = batch::run(skips, session.max_concurrency(), None, |skip| {
        let url = page_url(skip);
        async move { session.get_json::<P>(&url).await }
    })
    .await;

    let mut pages = Vec::with_capacity(outcome.successes.len() + 1);
    pages.push(first);
    pages.extend(outcome.successes.into_iter().map(|(_, page)| page));

    Ok(IndexPages {
        pages,
        total,
        truncated,
        failures: outcome.failures,
    })
}

fn take_numeric(filters: &mut params::Params, key: &str) -> Result<Option<u64>> {
    match filters.take(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{key} must be an integer, got {raw:?}"))),
        None => Ok(None),
    }
}

/// Fetch one image, optionally writing it into `out_dir`.
///
/// `keep_bytes` controls whether the raw bytes ride along in the record;
/// callers downloading straight to disk usually drop them.
pub(crate) async fn download_image(
    session: &Session,
    url: String,
    out_dir: Option<&Path>,
    keep_bytes: bool,
) -> Result<ImageRecord> {
    let bytes = session.get_bytes(&url).await?;
    let name = ImageRecord::name_from_url(&url);

    let path = match out_dir {
        Some(dir) => {
            let path = dir.join(&name);
            tokio::fs::write(&path, &bytes).await?;
            Some(path)
        }
        None => None,
    };

    Ok(ImageRecord {
        name,
        url,
        bytes: keep_bytes.then_some(bytes),
        path,
    })
}

/// Ensure the caller's output directory exists before a fan-out download.
pub(crate) async fn prepare_out_dir(out_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = out_dir {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
