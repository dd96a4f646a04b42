//! Client for sensor observations produced by the analytics pipeline.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::{download_image, paginated_index, params::Params, prepare_out_dir};
use crate::auth::Session;
use crate::batch::{self, BatchFailure, BatchOutcome};
use crate::error::Result;
use crate::models::feature::FeaturePage;
use crate::models::{Feature, FeatureCollection, ImageRecord};

const RESOURCE: &str = "observations";

/// Typed view of an observation feature's properties.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationProperties {
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
    pub time: Option<String>,
    #[serde(default)]
    pub prev_id: Option<String>,
    /// Per-sensor measurement block, keyed by sensor name.
    #[serde(default)]
    pub sensors: Map<String, Value>,
}

/// One sensor measurement flattened out of a feature's `sensors` block.
///
/// Missing `data`/`prev` values are reported as -1, matching the API's
/// convention for "no reading".
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub sensor: String,
    pub time: Option<String>,
    pub data: i64,
    pub prev: i64,
    pub id: Option<String>,
    pub prev_id: Option<String>,
}

pub struct Observations<'a> {
    session: &'a Session,
}

impl<'a> Observations<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Observations matching the provided spatial, text, or metadata
    /// filters. Sensor filters pass through, e.g.
    /// `sensors[visibility][min]=0`.
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

    /// Attributes for the given observation ids, fetched concurrently.
    pub async fn show(&self, ids: &[&str]) -> BatchOutcome<String, Feature> {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        batch::run(ids, self.session.max_concurrency(), None, |id| {
            let url = format!("{}/{}/{}", self.session.api_url(), RESOURCE, id);
            async move { self.session.get_json(&url).await }
        })
        .await
    }

    /// Download preview images for the given observation ids, concurrently.
    pub async fn preview(
        &self,
        ids: &[&str],
        out_dir: Option<&Path>,
        keep_bytes: bool,
    ) -> Result<BatchOutcome<String, ImageRecord>> {
        prepare_out_dir(out_dir).await?;

        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        let outcome = batch::run(ids, self.session.max_concurrency(), None, |id| {
            let url = format!("{}/{}/{}/preview", self.session.api_url(), RESOURCE, id);
            async move { download_image(self.session, url, out_dir, keep_bytes).await }
        })
        .await;

        Ok(outcome)
    }
}

/// Flatten every feature's sensor block into per-sensor reading lists.
pub fn sensor_readings(collection: &FeatureCollection) -> HashMap<String, Vec<SensorReading>> {
    let mut readings: HashMap<String, Vec<SensorReading>> = HashMap::new();

    for feature in &collection.features {
        let Ok(props) = feature.properties_as::<ObservationProperties>() else {
            continue;
        };
        for (sensor, block) in &props.sensors {
            let data = block.get("data").and_then(Value::as_i64).unwrap_or(-1);
            let prev = block.get("prev").and_then(Value::as_i64).unwrap_or(-1);
            readings.entry(sensor.clone()).or_default().push(SensorReading {
                sensor: sensor.clone(),
                time: props.time.clone(),
                data,
                prev,
                id: feature.id.clone(),
                prev_id: props.prev_id.clone(),
            });
        }
    }

    readings
}
