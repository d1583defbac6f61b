//! Beacon API HTTP Client
//!
//! Fetches headers, blob sidecars, block commitments and validators from a
//! beacon node.

use crate::chunk::{parse_hex_array, Root};
use crate::sidecar::BlobSidecars;
use crate::types::{quoted_u64, Gwei, KzgCommitment, SignedBeaconBlockHeader, ValidatorIndex};
use crate::validator::{Validator, ValidatorStatus};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

/// Errors from beacon API operations
#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// A header as returned by `/eth/v1/beacon/headers/{block_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderResponse {
    #[serde(with = "crate::types::hex_bytes")]
    pub root: Root,
    #[serde(default)]
    pub canonical: bool,
    pub header: SignedBeaconBlockHeader,
}

/// A validator as returned by `/eth/v1/beacon/states/{state_id}/validators/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidatorResponse {
    #[serde(with = "quoted_u64")]
    pub index: ValidatorIndex,
    #[serde(with = "quoted_u64")]
    pub balance: Gwei,
    pub status: ValidatorStatus,
    pub validator: Validator,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for interacting with the Beacon API
#[derive(Debug, Clone)]
pub struct BeaconClient {
    client: Client,
    base_url: String,
}

impl BeaconClient {
    /// Create a new beacon client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the beacon node (e.g., `http://localhost:5052`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a signed block header
    ///
    /// # Arguments
    /// * `block_id` - Block identifier (slot number, root, "head", "finalized", etc.)
    ///
    /// # Errors
    /// Returns error if the request fails or the header is not found
    #[instrument(skip(self))]
    pub async fn get_header(&self, block_id: &str) -> Result<HeaderResponse, BeaconClientError> {
        let url = format!("{}/eth/v1/beacon/headers/{block_id}", self.base_url);
        self.get_data(&url, || format!("header {block_id}")).await
    }

    /// Fetch every blob sidecar of a block
    ///
    /// # Errors
    /// Returns error if the request fails or the block is not found
    #[instrument(skip(self))]
    pub async fn get_blob_sidecars(
        &self,
        block_id: &str,
    ) -> Result<BlobSidecars, BeaconClientError> {
        let url = format!("{}/eth/v1/beacon/blob_sidecars/{block_id}", self.base_url);
        self.get_data(&url, || format!("blob sidecars {block_id}")).await
    }

    /// Fetch the `blob_kzg_commitments` listed in a block body
    ///
    /// # Errors
    /// Returns error if the request fails, the block is not found or a
    /// commitment is not 48 bytes of hex
    #[instrument(skip(self))]
    pub async fn get_block_commitments(
        &self,
        block_id: &str,
    ) -> Result<Vec<KzgCommitment>, BeaconClientError> {
        #[derive(Deserialize)]
        struct Block {
            message: Message,
        }

        #[derive(Deserialize)]
        struct Message {
            body: Body,
        }

        #[derive(Deserialize)]
        struct Body {
            #[serde(default)]
            blob_kzg_commitments: Vec<String>,
        }

        let url = format!("{}/eth/v2/beacon/blocks/{block_id}", self.base_url);
        let block: Block = self.get_data(&url, || format!("block {block_id}")).await?;

        block
            .message
            .body
            .blob_kzg_commitments
            .iter()
            .map(|c| {
                parse_hex_array(c).map_err(|e| {
                    BeaconClientError::InvalidResponse(format!("Invalid commitment: {e}"))
                })
            })
            .collect()
    }

    /// Fetch a validator from a state
    ///
    /// # Arguments
    /// * `state_id` - State identifier ("head", "finalized", slot, root)
    /// * `validator_id` - Validator index or `0x`-prefixed pubkey
    ///
    /// # Errors
    /// Returns error if the request fails or the validator is not found
    #[instrument(skip(self))]
    pub async fn get_validator(
        &self,
        state_id: &str,
        validator_id: &str,
    ) -> Result<ValidatorResponse, BeaconClientError> {
        let url = format!(
            "{}/eth/v1/beacon/states/{state_id}/validators/{validator_id}",
            self.base_url
        );
        self.get_data(&url, || format!("validator {validator_id} at {state_id}"))
            .await
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        url: &str,
        what: impl FnOnce() -> String,
    ) -> Result<T, BeaconClientError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, what)?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

fn check_status(
    response: Response,
    what: impl FnOnce() -> String,
) -> Result<Response, BeaconClientError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(BeaconClientError::NotFound(what()));
    }

    if !response.status().is_success() {
        return Err(BeaconClientError::InvalidResponse(format!(
            "Unexpected status: {}",
            response.status()
        )));
    }

    Ok(response)
}
