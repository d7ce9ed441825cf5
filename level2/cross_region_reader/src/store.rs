use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::ReaderError;

/// Where the reader fetches parameters from.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, region: &str, name: &str) -> Result<String, ReaderError>;
}

/// SSM Parameter Store, with one client per region, built on first use.
#[derive(Default)]
pub struct SsmParameterStore {
    clients: tokio::sync::Mutex<HashMap<String, aws_sdk_ssm::Client>>,
}

impl SsmParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, region: &str) -> aws_sdk_ssm::Client {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(region) {
            return client.clone();
        }
        debug!("creating ssm client for {region}");
        let sdk_config = aws_config::from_env()
            .region(aws_sdk_ssm::config::Region::new(region.to_string()))
            .load().await;
        let client = aws_sdk_ssm::Client::new(&sdk_config);
        clients.insert(region.to_string(), client.clone());
        client
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_parameter(&self, region: &str, name: &str) -> Result<String, ReaderError> {
        let client = self.client(region).await;
        match client.get_parameter().name(name).send().await {
            Ok(out) => match out.parameter().and_then(|p| p.value()) {
                Some(value) => Ok(value.to_string()),
                None => Err(ReaderError::EmptyParameter { region: region.to_string(), name: name.to_string() }),
            },
            Err(e) => {
                let e_str = format!("{:?}", e);
                if e_str.contains("ParameterNotFound") {
                    return Err(ReaderError::ParameterNotFound { region: region.to_string(), name: name.to_string() });
                }
                Err(ReaderError::Sdk(e_str))
            }
        }
    }
}

/// An in-process store keyed by (region, name).
#[derive(Default)]
pub struct MemoryParameterStore {
    values: std::sync::Mutex<HashMap<(String, String), String>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, region: &str, name: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert((region.to_string(), name.to_string()), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get_parameter(&self, region: &str, name: &str) -> Result<String, ReaderError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(&(region.to_string(), name.to_string())).cloned()
            .ok_or_else(|| ReaderError::ParameterNotFound { region: region.to_string(), name: name.to_string() })
    }
}
