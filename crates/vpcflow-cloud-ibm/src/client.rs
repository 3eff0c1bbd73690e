//! reqwest-based [`ProviderClient`] for IBM Cloud VPC

use crate::context::ProviderContext;
use crate::error::Result;
use crate::iam;
use crate::wire::{self, Service};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use vpcflow_cloud::{
    ApiDialect, AttachedFloatingIp, CreateRequest, ProviderClient, ProviderError, ProviderResult,
    RegionInfo, RemoteResource, ResourceKind, Scope,
};

const OK: &[u16] = &[200];
const CREATED: &[u16] = &[200, 201];
const DELETED: &[u16] = &[204];

const PAGE_LIMIT: u32 = 100;

/// Endpoints and credentials needed to open a session
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub api_key: String,
    pub region: String,
    pub dialect: ApiDialect,
    pub iam_endpoint: String,
    pub iaas_endpoint: String,
    pub resource_controller_endpoint: String,
    pub api_version: String,
    pub timeout: Duration,
}

pub struct IbmVpcClient {
    http: reqwest::Client,
    context: ProviderContext,
}

impl IbmVpcClient {
    pub fn new(context: ProviderContext, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, context })
    }

    /// Exchange the API key, then pick the endpoint for the dialect
    ///
    /// Gen1 switches to the endpoint the region lookup reports.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;
        let token = iam::exchange_api_key(&http, &options.iam_endpoint, &options.api_key).await?;

        let context = ProviderContext::new(
            &options.iaas_endpoint,
            &options.resource_controller_endpoint,
            &options.api_version,
            options.dialect,
            token.access_token,
        );
        let mut client = Self { http, context };

        if options.dialect == ApiDialect::Gen1 {
            let region = client.region(&options.region).await?;
            let endpoint = options
                .dialect
                .endpoint(region.endpoint.as_deref(), &options.iaas_endpoint)
                .to_string();
            if endpoint != client.context.endpoint {
                info!(endpoint = %endpoint, region = %region.name, "Using regional endpoint");
                client.context = client.context.with_endpoint(endpoint);
            }
        }
        Ok(client)
    }

    pub fn context(&self) -> &ProviderContext {
        &self.context
    }

    fn url(&self, service: Service, path: &str) -> String {
        match service {
            Service::Iaas => self.context.url(path),
            Service::ResourceController => {
                format!("{}{}", self.context.resource_controller, path)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        expected: &[u16],
    ) -> ProviderResult<Value> {
        debug!(method = %method, url, "Request");
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.context.token())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ProviderError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ProviderError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            message: e.to_string(),
        })?;
        debug!(method = %method, url, status, "Response");

        if !expected.contains(&status) {
            return Err(ProviderError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn decode(kind: ResourceKind, url: &str, value: &Value) -> ProviderResult<RemoteResource> {
        wire::decode(kind, value).map_err(|message| ProviderError::Decode {
            url: url.to_string(),
            message,
        })
    }

    fn decode_page(kind: ResourceKind, url: &str, page: &Value) -> ProviderResult<Vec<RemoteResource>> {
        page.get(wire::collection_key(kind))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(|item| Self::decode(kind, url, item)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Page links do not always repeat the version query
    fn with_query(&self, href: String) -> String {
        if href.contains("version=") {
            href
        } else if href.contains('?') {
            format!("{}&{}", href, self.context.query())
        } else {
            format!("{}?{}", href, self.context.query())
        }
    }

    fn first_url(&self, kind: ResourceKind, scope: &Scope) -> ProviderResult<String> {
        let (service, path) = wire::collection_path(kind, scope)?;
        let mut url = self.url(service, &path);
        if service == Service::Iaas {
            url.push_str(&format!("&limit={}", PAGE_LIMIT));
            for (key, value) in wire::list_filters(kind, scope) {
                url.push_str(&format!("&{}={}", key, value));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ProviderClient for IbmVpcClient {
    fn name(&self) -> &str {
        "ibm"
    }

    async fn region(&self, name: &str) -> ProviderResult<RegionInfo> {
        let url = self.context.url(&format!("/v1/regions/{}", name));
        let doc = self.send(Method::GET, &url, None, OK).await?;
        let field = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(RegionInfo {
            name: field("name").unwrap_or_else(|| name.to_string()),
            status: field("status").unwrap_or_default(),
            endpoint: field("endpoint"),
        })
    }

    async fn list(&self, kind: ResourceKind, scope: &Scope) -> ProviderResult<Vec<RemoteResource>> {
        let mut next = Some(self.first_url(kind, scope)?);
        let mut resources = Vec::new();
        while let Some(url) = next {
            let page = self.send(Method::GET, &url, None, OK).await?;
            resources.extend(Self::decode_page(kind, &url, &page)?);
            next = wire::next_page(&page).map(|href| self.with_query(href));
        }
        debug!(kind = %kind, count = resources.len(), "Listed");
        Ok(resources)
    }

    async fn get(&self, kind: ResourceKind, id: &str, scope: &Scope) -> ProviderResult<RemoteResource> {
        let (service, path) = wire::collection_path(kind, scope)?;
        let url = self.url(service, &format!("{}/{}", path, id));
        let doc = self.send(Method::GET, &url, None, OK).await?;
        Self::decode(kind, &url, &doc)
    }

    async fn create(&self, request: &CreateRequest) -> ProviderResult<RemoteResource> {
        let (path, body) = wire::create_body(request, self.context.dialect)?;
        let url = self.context.url(&path);
        let doc = self.send(Method::POST, &url, Some(&body), CREATED).await?;
        Self::decode(request.kind(), &url, &doc)
    }

    async fn delete(&self, kind: ResourceKind, id: &str, scope: &Scope) -> ProviderResult<()> {
        let (service, path) = wire::collection_path(kind, scope)?;
        let url = self.url(service, &format!("{}/{}", path, id));
        self.send(Method::DELETE, &url, None, DELETED).await?;
        Ok(())
    }

    async fn attach_public_gateway(
        &self,
        subnet_id: &str,
        gateway_id: &str,
    ) -> ProviderResult<RemoteResource> {
        let url = self
            .context
            .url(&format!("/v1/subnets/{}/public_gateway", subnet_id));
        let body = json!({ "id": gateway_id });
        let doc = self.send(Method::PUT, &url, Some(&body), CREATED).await?;
        Self::decode(ResourceKind::PublicGateway, &url, &doc)
    }

    async fn detach_public_gateway(&self, subnet_id: &str) -> ProviderResult<()> {
        let url = self
            .context
            .url(&format!("/v1/subnets/{}/public_gateway", subnet_id));
        self.send(Method::DELETE, &url, None, DELETED).await?;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> ProviderResult<()> {
        let url = self
            .context
            .url(&format!("/v1/instances/{}/actions", instance_id));
        let body = json!({ "type": "stop" });
        self.send(Method::POST, &url, Some(&body), CREATED).await?;
        Ok(())
    }

    async fn instance_floating_ips(
        &self,
        instance_id: &str,
    ) -> ProviderResult<Vec<AttachedFloatingIp>> {
        let url = self
            .context
            .url(&format!("/v1/instances/{}/network_interfaces", instance_id));
        let doc = self.send(Method::GET, &url, None, OK).await?;
        let interfaces: Vec<String> = doc
            .get("network_interfaces")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|nic| nic.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut attached = Vec::new();
        for interface_id in interfaces {
            let url = self.context.url(&format!(
                "/v1/instances/{}/network_interfaces/{}/floating_ips",
                instance_id, interface_id
            ));
            let page = self.send(Method::GET, &url, None, OK).await?;
            for floating_ip in Self::decode_page(ResourceKind::FloatingIp, &url, &page)? {
                attached.push(AttachedFloatingIp {
                    instance_id: instance_id.to_string(),
                    interface_id: interface_id.clone(),
                    floating_ip,
                });
            }
        }
        Ok(attached)
    }

    async fn detach_floating_ip(&self, attached: &AttachedFloatingIp) -> ProviderResult<()> {
        let url = self.context.url(&format!(
            "/v1/instances/{}/network_interfaces/{}/floating_ips/{}",
            attached.instance_id, attached.interface_id, attached.floating_ip.id
        ));
        self.send(Method::DELETE, &url, None, DELETED).await?;
        Ok(())
    }
}
