//! Client for severe-weather alerts.
//!
//! Alerts cover both national weather service bulletins and alerts derived
//! from sensor observations (road wetness, poor visibility, heavy precip).

use serde::Deserialize;

use crate::api::{paginated_index, params::Params};
use crate::auth::Session;
use crate::batch::{self, BatchFailure, BatchOutcome};
use crate::error::Result;
use crate::models::feature::FeaturePage;
use crate::models::{Feature, FeatureCollection};

const RESOURCE: &str = "alerts";

/// Typed view of an alert feature's properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertProperties {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub certainty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "areaDesc")]
    pub area_description: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub states: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub effective: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
}

pub struct Alerts<'a> {
    session: &'a Session,
}

impl<'a> Alerts<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Alerts matching the provided spatial, text, or metadata filters.
    ///
    /// Returns the merged feature collection and per-page failures; check
    /// `FeatureCollection::truncated` for the server-side skip cap.
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

    /// Attributes for the given alert ids, fetched concurrently.
    pub async fn show(&self, ids: &[&str]) -> BatchOutcome<String, Feature> {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        batch::run(ids, self.session.max_concurrency(), None, |id| {
            let url = format!("{}/{}/{}", self.session.api_url(), RESOURCE, id);
            async move { self.session.get_json(&url).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_properties_parse() {
        let feature: Feature = serde_json::from_str(
            r#"{
                "id": "alert-1",
                "bbox": [-77.5, 38.8, -76.9, 39.1],
                "properties": {
                    "event": "Flood Warning",
                    "severity": "Severe",
                    "areaDesc": "Montgomery County",
                    "states": ["MD"],
                    "effective": "2024-03-01T12:00:00Z"
                }
            }"#,
        )
        .unwrap();

        let props: AlertProperties = feature.properties_as().unwrap();
        assert_eq!(props.event.as_deref(), Some("Flood Warning"));
        assert_eq!(props.area_description.as_deref(), Some("Montgomery County"));
        assert_eq!(props.states.as_deref(), Some(&["MD".to_string()][..]));
        assert!(props.expires.is_none());
    }
}
