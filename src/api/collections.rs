//! Client for user-curated collections of imagery.
//!
//! Collections are short-lived resources: they group individual image frames
//! and expire together with their imagery after a server-defined retention
//! window.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::{download_image, paginated_index, params::Params, prepare_out_dir};
use crate::auth::Session;
use crate::batch::{self, BatchFailure, BatchOutcome};
use crate::error::{Error, Result};
use crate::models::feature::RecordPage;
use crate::models::{ImageRecord, RecordCollection};

const RESOURCE: &str = "collections";

/// Image-name page size cap for `show`.
const MAX_SHOW_LIMIT: u32 = 200;

/// Attributes and image listing for a single collection.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Image names in this page of the listing, capped at 200 per query;
    /// pass the last name back as `marker` to continue.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedCollection {
    collection_id: String,
}

/// A source asset to copy into a collection.
#[derive(Debug, Clone)]
pub enum CollectionAsset {
    /// A frame from the camera media cache, optionally at a specific time.
    CameraImage {
        camera_id: String,
        time: Option<String>,
    },
    /// An observation's preview image.
    ObservationPreview { observation_id: String },
    /// An image already held by another collection.
    CollectionImage {
        collection_id: String,
        image: String,
    },
}

impl CollectionAsset {
    fn form_params(&self) -> Vec<(String, String)> {
        match self {
            CollectionAsset::CameraImage { camera_id, time } => {
                let mut params = vec![("camera_id".to_string(), camera_id.clone())];
                if let Some(time) = time {
                    params.push(("time".to_string(), time.clone()));
                }
                params
            }
            CollectionAsset::ObservationPreview { observation_id } => {
                vec![("observation_id".to_string(), observation_id.clone())]
            }
            CollectionAsset::CollectionImage {
                collection_id,
                image,
            } => vec![
                ("collection_id".to_string(), collection_id.clone()),
                ("image".to_string(), image.clone()),
            ],
        }
    }
}

pub struct Collections<'a> {
    session: &'a Session,
}

impl<'a> Collections<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Collections matching the provided text or metadata filters.
    pub async fn index(
        &self,
        filters: Params,
    ) -> Result<(RecordCollection, Vec<BatchFailure<u64>>)> {
        let pages = paginated_index::<RecordPage>(self.session, RESOURCE, filters).await?;
        Ok((
            RecordCollection::from_pages(pages.pages, pages.total, pages.truncated),
            pages.failures,
        ))
    }

    /// Attributes and one page of image names for a collection.
    ///
    /// `marker` continues a listing: the page starts after the first image
    /// matching it (partial names match their first image).
    pub async fn show(
        &self,
        collection_id: &str,
        limit: Option<u32>,
        marker: Option<&str>,
    ) -> Result<CollectionDetails> {
        let limit = limit.unwrap_or(MAX_SHOW_LIMIT).min(MAX_SHOW_LIMIT);
        let query = Params::new()
            .set("limit", limit)
            .set_opt("marker", marker)
            .query_string();
        let url = format!(
            "{}/{}/{}?{}",
            self.session.api_url(),
            RESOURCE,
            collection_id,
            query
        );
        self.session.get_json(&url).await
    }

    /// Create a new collection; returns its id.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        tags: &[&str],
    ) -> Result<String> {
        let mut params = vec![
            ("name".to_string(), name.to_string()),
            ("description".to_string(), description.to_string()),
        ];
        if !tags.is_empty() {
            params.push(("tags".to_string(), tags.join(",")));
        }

        let url = format!("{}/{}", self.session.api_url(), RESOURCE);
        let created: CreatedCollection = self.session.post_form_json(&url, &params).await?;
        Ok(created.collection_id)
    }

    /// Update a collection's name, description, or tags.
    pub async fn update(
        &self,
        collection_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        tags: Option<&[&str]>,
    ) -> Result<()> {
        if name.is_none() && description.is_none() && tags.is_none() {
            return Err(Error::Configuration(
                "update requires at least one field to change".to_string(),
            ));
        }

        let mut params = Vec::new();
        if let Some(name) = name {
            params.push(("name".to_string(), name.to_string()));
        }
        if let Some(description) = description {
            params.push(("description".to_string(), description.to_string()));
        }
        if let Some(tags) = tags {
            params.push(("tags".to_string(), tags.join(",")));
        }

        let url = format!("{}/{}/{}", self.session.api_url(), RESOURCE, collection_id);
        self.session.patch_form(&url, &params).await
    }

    /// All image names in a collection, following the pagination markers.
    ///
    /// With `camera` set, only images whose name prefix (up to the first
    /// underscore) matches are returned; the prefix doubles as the starting
    /// marker so the walk begins at that camera's first image. Stored names
    /// carry a service-assigned leading hash (`ab12-cam-17_...`), so pass
    /// the prefix exactly as it appears in the names, not the bare camera
    /// id.
    pub async fn images(
        &self,
        collection_id: &str,
        camera: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut marker = camera.map(|c| c.to_string());
        let mut names: Vec<String> = Vec::new();

        loop {
            let page = self
                .show(collection_id, None, marker.as_deref())
                .await?;
            let found = page.images;

            let matching: Vec<String> = match camera {
                Some(camera) => found
                    .iter()
                    .filter(|name| name.split('_').next() == Some(camera))
                    .cloned()
                    .collect(),
                None => found.clone(),
            };

            if matching.is_empty() {
                break;
            }

            let walked_past_camera = matching.len() < found.len();
            names.extend(matching);

            if walked_past_camera || found.len() < MAX_SHOW_LIMIT as usize {
                break;
            }
            marker = names.last().cloned();
        }

        Ok(names)
    }

    /// Download images from a collection, concurrently.
    pub async fn show_image(
        &self,
        collection_id: &str,
        names: &[String],
        out_dir: Option<&Path>,
        keep_bytes: bool,
    ) -> Result<BatchOutcome<String, ImageRecord>> {
        prepare_out_dir(out_dir).await?;

        let names = names.to_vec();
        let outcome = batch::run(names, self.session.max_concurrency(), None, |name| {
            let url = format!(
                "{}/{}/{}/images/{}",
                self.session.api_url(),
                RESOURCE,
                collection_id,
                name
            );
            async move { download_image(self.session, url, out_dir, keep_bytes).await }
        })
        .await;

        Ok(outcome)
    }

    /// Copy assets into a collection, one POST per asset, concurrently.
    pub async fn add_image(
        &self,
        collection_id: &str,
        assets: Vec<CollectionAsset>,
    ) -> BatchOutcome<CollectionAsset, ()> {
        let url = format!(
            "{}/{}/{}/images",
            self.session.api_url(),
            RESOURCE,
            collection_id
        );
        batch::run(assets, self.session.max_concurrency(), None, |asset| {
            let url = url.clone();
            let params = asset.form_params();
            async move { self.session.post_form(&url, &params).await }
        })
        .await
    }

    /// Remove images from a collection, one delete per name, concurrently.
    pub async fn remove_image(
        &self,
        collection_id: &str,
        names: &[String],
    ) -> BatchOutcome<String, ()> {
        let names = names.to_vec();
        batch::run(names, self.session.max_concurrency(), None, |name| {
            let url = format!(
                "{}/{}/{}/images/{}",
                self.session.api_url(),
                RESOURCE,
                collection_id,
                name
            );
            async move { self.session.delete(&url).await }
        })
        .await
    }

    /// Copy a collection: create a new one under `new_name` carrying the
    /// source's description, then enqueue a server-side copy of every image.
    ///
    /// Returns the new collection's id and the per-image copy outcome.
    pub async fn copy(
        &self,
        collection_id: &str,
        new_name: &str,
    ) -> Result<(String, BatchOutcome<CollectionAsset, ()>)> {
        let source = self.show(collection_id, None, None).await?;
        let description = source.description.unwrap_or_default();
        let new_id = self.create(new_name, &description, &[]).await?;

        let assets: Vec<CollectionAsset> = self
            .images(collection_id, None)
            .await?
            .into_iter()
            .map(|image| CollectionAsset::CollectionImage {
                collection_id: collection_id.to_string(),
                image,
            })
            .collect();
        let outcome = self.add_image(&new_id, assets).await;
        Ok((new_id, outcome))
    }
}
