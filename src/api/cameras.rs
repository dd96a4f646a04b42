//! Client for the camera network.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::api::{download_image, paginated_index, params::Params, prepare_out_dir};
use crate::auth::Session;
use crate::batch::{self, BatchFailure, BatchOutcome};
use crate::error::{Error, Result};
use crate::models::feature::FeaturePage;
use crate::models::{Feature, FeatureCollection, ImageRecord};

const RESOURCE: &str = "cameras";

/// Media-cache page size cap.
const MAX_IMAGE_TIMES: u32 = 500;

/// Typed view of a camera feature's properties.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraProperties {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub video: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ImageTimesPage {
    #[serde(default)]
    times: Vec<String>,
}

pub struct Cameras<'a> {
    session: &'a Session,
}

impl<'a> Cameras<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Cameras matching the provided spatial, text, or metadata filters.
    pub async fn index(
        &self,
        filters: Params,
    ) -> Result<(FeatureCollection, Vec<BatchFailure<u64>>)> {
        let pages = paginated_index::<FeaturePage>(self.session, RESOURCE, filters).await?;
        Ok((
            FeatureCollection::from_pages(pages.pages, pages.total, pages.truncated),
            pages.failures,
        ))
    }

    /// Attributes for the given camera ids, fetched concurrently.
    pub async fn show(&self, ids: &[&str]) -> BatchOutcome<String, Feature> {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        batch::run(ids, self.session.max_concurrency(), None, |id| {
            let url = format!("{}/{}/{}", self.session.api_url(), RESOURCE, id);
            async move { self.session.get_json(&url).await }
        })
        .await
    }

    /// Image times available for a camera in the media cache.
    ///
    /// Timestamps are ISO 8601 UTC (`2024-08-01` or
    /// `2024-08-01T12:34:56Z`). The cache pages forward in time from
    /// `start_time`; when `end_time` is given, paging continues until the
    /// window is covered and times past the end are trimmed.
    pub async fn images(
        &self,
        camera_id: &str,
        start_time: &str,
        end_time: Option<&str>,
    ) -> Result<Vec<String>> {
        let end = end_time.map(parse_image_time).transpose()?;

        let mut image_times: Vec<String> = Vec::new();
        let mut cursor = start_time.to_string();

        loop {
            let url = format!(
                "{}/{}/{}/images?time={}&limit={}",
                self.session.api_url(),
                RESOURCE,
                camera_id,
                cursor,
                MAX_IMAGE_TIMES
            );
            let page: ImageTimesPage = self.session.get_json(&url).await?;
            let times = page.times;

            // Without an end bound a single page is all the caller asked for.
            let Some(end) = end else {
                image_times.extend(times);
                break;
            };

            let Some(last_raw) = times.last().cloned() else {
                break;
            };
            let last = parse_image_time(&last_raw)?;

            if last < end {
                // The newest image is still before the end bound; keep the
                // last time as the next page's cursor so pages overlap by
                // one and nothing is skipped.
                if times.len() > 1 {
                    image_times.extend_from_slice(&times[..times.len() - 1]);
                    cursor = last_raw;
                } else {
                    image_times.extend(times);
                    break;
                }
            } else if last > end {
                // The end bound falls inside this page.
                for time in &times {
                    if parse_image_time(time)? < end {
                        image_times.push(time.clone());
                    }
                }
                break;
            } else {
                image_times.extend(times);
                break;
            }
        }

        if image_times.is_empty() {
            warn!(
                camera_id,
                start_time,
                end_time = end_time.unwrap_or("-"),
                "No images found in the requested range"
            );
        }

        Ok(image_times)
    }

    /// Download the images closest to the given times, concurrently.
    ///
    /// When `out_dir` is set the images are written there; `keep_bytes`
    /// additionally retains the raw bytes in each returned record.
    pub async fn show_image(
        &self,
        camera_id: &str,
        times: &[String],
        out_dir: Option<&Path>,
        keep_bytes: bool,
    ) -> Result<BatchOutcome<String, ImageRecord>> {
        prepare_out_dir(out_dir).await?;

        let times = times.to_vec();
        let outcome = batch::run(times, self.session.max_concurrency(), None, |time| {
            let url = format!(
                "{}/{}/{}/images/{}",
                self.session.api_url(),
                RESOURCE,
                camera_id,
                time
            );
            async move { download_image(self.session, url, out_dir, keep_bytes).await }
        })
        .await;

        Ok(outcome)
    }
}

/// Parse an ISO 8601 UTC timestamp, allowing a bare date.
fn parse_image_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(Error::InvalidResponse(format!(
        "unparseable image time {value:?}"
    )))
}
