//! The handler behind `Custom::CrossRegionStringParameterReader`.
//!
//! Reads one SSM parameter from the region named in the resource properties
//! and answers CloudFormation with its value under `stringValue`.

pub mod event;
pub mod store;

use thiserror::Error;
use tracing::{error, info};

use edgestack::cross_region::channel::READER_ATTRIBUTE;

pub use event::{CustomResourceRequest, CustomResourceResponse, ReaderProperties, RequestType, ResponseStatus};
pub use store::{MemoryParameterStore, ParameterStore, SsmParameterStore};

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Missing resource property {0:?}")]
    MissingProperty(&'static str),

    #[error("Parameter {name} not found in {region}")]
    ParameterNotFound { region: String, name: String },

    #[error("Parameter {name} in {region} has no value")]
    EmptyParameter { region: String, name: String },

    #[error("Failed to read parameter\n{0}")]
    Sdk(String),

    #[error("Failed to send response to CloudFormation\n{0}")]
    Respond(String),
}

/// `{region}:{parameterName}`. changing either replaces the resource.
pub fn physical_id(props: &ReaderProperties) -> Result<String, ReaderError> {
    let region = props.region.as_deref().ok_or(ReaderError::MissingProperty("region"))?;
    let name = props.parameter_name.as_deref().ok_or(ReaderError::MissingProperty("parameterName"))?;
    Ok(format!("{region}:{name}"))
}

async fn read(request: &CustomResourceRequest, store: &dyn ParameterStore) -> Result<(String, String), ReaderError> {
    let props = &request.resource_properties;
    let physical_id = physical_id(props)?;
    let region = props.region.as_deref().ok_or(ReaderError::MissingProperty("region"))?;
    let name = props.parameter_name.as_deref().ok_or(ReaderError::MissingProperty("parameterName"))?;
    let value = store.get_parameter(region, name).await?;
    Ok((physical_id, value))
}

/// Builds the response for one request. Never fails: errors become a
/// FAILED response so CloudFormation does not wait for the timeout.
pub async fn handle(request: &CustomResourceRequest, store: &dyn ParameterStore) -> CustomResourceResponse {
    if request.request_type == RequestType::Delete {
        // nothing was created, so nothing to delete.
        let physical_id = request.physical_resource_id.clone()
            .unwrap_or_else(|| request.logical_resource_id.clone());
        return CustomResourceResponse::success(request, physical_id);
    }
    match read(request, store).await {
        Ok((physical_id, value)) => {
            info!("{:?} {} read {physical_id}", request.request_type, request.logical_resource_id);
            CustomResourceResponse::success(request, physical_id).with_data(READER_ATTRIBUTE, value)
        }
        Err(e) => {
            error!("{} failed: {e}", request.logical_resource_id);
            let physical_id = request.physical_resource_id.clone()
                .or_else(|| physical_id(&request.resource_properties).ok())
                .unwrap_or_else(|| request.logical_resource_id.clone());
            CustomResourceResponse::failed(request, physical_id, e.to_string())
        }
    }
}

/// PUTs the response to the presigned url CloudFormation gave us.
pub async fn send_response(url: &str, response: &CustomResourceResponse) -> Result<(), ReaderError> {
    let body = serde_json::to_string(response).map_err(|e| ReaderError::Respond(e.to_string()))?;
    let url = url.to_string();
    // the presigned url is signed without a content type.
    let res = tokio::task::spawn_blocking(move || {
        ureq::put(&url)
            .set("content-type", "")
            .send_string(&body)
    }).await.map_err(|e| ReaderError::Respond(e.to_string()))?;
    match res {
        Ok(_) => Ok(()),
        Err(e) => Err(ReaderError::Respond(format!("{:?}", e))),
    }
}

/// Handles the request and reports the outcome back to CloudFormation.
pub async fn respond(request: CustomResourceRequest, store: &dyn ParameterStore) -> Result<(), ReaderError> {
    let response = handle(&request, store).await;
    send_response(&request.response_url, &response).await
}
