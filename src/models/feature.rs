//! GeoJSON-shaped response types shared by the resource clients.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// GeoJSON geometry, kept structural; consumers mostly want coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Value,
}

/// A single GeoJSON feature with open properties.
///
/// Resource-specific property shapes are obtained with
/// [`Feature::properties_as`] rather than ad hoc key lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Deserialize this feature's properties into a typed shape.
    pub fn properties_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.properties.clone()))
            .map_err(|e| Error::InvalidResponse(format!("feature properties: {e}")))
    }

    /// Raw property lookup for one-off access.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// One page of a feature index response.
///
/// The feature total lives either in `properties.total` or at the top level
/// depending on the resource.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturePage {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    properties: Option<PageProperties>,
}

#[derive(Debug, Clone, Deserialize)]
struct PageProperties {
    #[serde(default)]
    total: Option<u64>,
}

impl FeaturePage {
    pub fn total(&self) -> Option<u64> {
        self.properties
            .as_ref()
            .and_then(|p| p.total)
            .or(self.total)
    }
}

/// Features merged from all pages of an index query.
#[derive(Debug, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Total matching features reported by the server, which can exceed
    /// `features.len()` when pages failed or results were truncated.
    pub total: u64,
    /// Set when the server-side skip cap was hit and further results exist
    /// but cannot be paged to. Callers should refine their query.
    pub truncated: bool,
}

impl FeatureCollection {
    pub(crate) fn from_pages(pages: Vec<FeaturePage>, total: u64, truncated: bool) -> Self {
        let features = pages.into_iter().flat_map(|p| p.features).collect();
        Self {
            features,
            total,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Typed properties for every feature, in order. Stops at the first
    /// feature whose properties do not match the expected shape.
    pub fn properties_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.features.iter().map(Feature::properties_as).collect()
    }
}

/// One page of a plain-record index response (collections resource).
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Records merged from all pages of a collections index query.
#[derive(Debug, Default)]
pub struct RecordCollection {
    pub results: Vec<Value>,
    pub total: u64,
    pub truncated: bool,
}

impl RecordCollection {
    pub(crate) fn from_pages(pages: Vec<RecordPage>, total: u64, truncated: bool) -> Self {
        let results = pages.into_iter().flat_map(|p| p.results).collect();
        Self {
            results,
            total,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
