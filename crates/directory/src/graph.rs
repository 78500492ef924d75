//! Microsoft Graph adapter.
//!
//! Talks to the Graph v1.0 REST API with an app-only token obtained through
//! the OAuth2 client-credentials flow. HTTP failures are classified through
//! [`DirectoryError::from_status`].

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

use idforge_core::{AccountHandle, GroupHandle, SecretString, SkuId, SubscribedSku};

use crate::client::{AccountAttributes, DirectoryClient, NewAccount};
use crate::error::{DirectoryError, DirectoryResult, ErrorKind};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// Refresh the token this long before Graph says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub const ENV_TENANT_ID: &str = "IDFORGE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "IDFORGE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "IDFORGE_CLIENT_SECRET";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
}

/// App registration used to authenticate against the tenant.
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl GraphCredentials {
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_vars(std::env::vars())
    }

    /// Read credentials from `IDFORGE_TENANT_ID`, `IDFORGE_CLIENT_ID` and
    /// `IDFORGE_CLIENT_SECRET`. Blank values count as missing.
    pub fn from_vars<I>(vars: I) -> Result<Self, CredentialsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let (mut tenant_id, mut client_id, mut client_secret) = (None, None, None);
        for (key, value) in vars {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                ENV_TENANT_ID => tenant_id = Some(value),
                ENV_CLIENT_ID => client_id = Some(value),
                ENV_CLIENT_SECRET => client_secret = Some(SecretString::new(value)),
                _ => {}
            }
        }

        Ok(Self {
            tenant_id: tenant_id.ok_or(CredentialsError::Missing(ENV_TENANT_ID))?,
            client_id: client_id.ok_or(CredentialsError::Missing(ENV_CLIENT_ID))?,
            client_secret: client_secret.ok_or(CredentialsError::Missing(ENV_CLIENT_SECRET))?,
        })
    }
}

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

pub struct GraphDirectory {
    http: Client,
    credentials: GraphCredentials,
    graph_url: String,
    login_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GraphDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDirectory")
            .field("graph_url", &self.graph_url)
            .field("tenant_id", &self.credentials.tenant_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphSku {
    sku_id: String,
    sku_part_number: String,
    #[serde(default)]
    prepaid_units: Option<PrepaidUnits>,
    #[serde(default)]
    consumed_units: u32,
}

#[derive(Deserialize)]
struct PrepaidUnits {
    #[serde(default)]
    enabled: u32,
}

#[derive(Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    #[serde(default)]
    user_principal_name: Option<String>,
}

#[derive(Deserialize)]
struct GraphObject {
    id: String,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Deserialize)]
struct GraphErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl GraphDirectory {
    pub fn new(credentials: GraphCredentials) -> DirectoryResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("idforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(map_transport_error)?;

        Ok(Self {
            http,
            credentials,
            graph_url: GRAPH_BASE_URL.to_string(),
            login_url: LOGIN_BASE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the adapter at different endpoints (national clouds, test servers).
    pub fn with_base_urls(mut self, graph_url: impl Into<String>, login_url: impl Into<String>) -> Self {
        self.graph_url = graph_url.into().trim_end_matches('/').to_string();
        self.login_url = login_url.into().trim_end_matches('/').to_string();
        self
    }

    fn token(&self) -> DirectoryResult<SecretString> {
        let mut cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!(tenant_id = %self.credentials.tenant_id, "requesting graph access token");
        let url = format!("{}/{}/oauth2/v2.0/token", self.login_url, self.credentials.tenant_id);
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.expose().as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .map_err(map_transport_error)?;
        let body: TokenResponse = check_status(response)?.json().map_err(map_transport_error)?;

        let value = SecretString::new(body.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(value)
    }

    fn send(&self, request: RequestBuilder) -> DirectoryResult<Response> {
        let token = self.token()?;
        let response = request
            .bearer_auth(token.expose())
            .send()
            .map_err(map_transport_error)?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> DirectoryResult<T> {
        self.send(request)?.json().map_err(map_transport_error)
    }

    fn users_url(&self) -> String {
        format!("{}/users", self.graph_url)
    }
}

impl DirectoryClient for GraphDirectory {
    fn subscribed_skus(&self) -> DirectoryResult<Vec<SubscribedSku>> {
        let page: Page<GraphSku> =
            self.get_json(self.http.get(format!("{}/subscribedSkus", self.graph_url)))?;

        Ok(page
            .value
            .into_iter()
            .map(|sku| SubscribedSku {
                part_number: sku.sku_part_number,
                sku_id: SkuId::new(sku.sku_id),
                enabled_units: sku.prepaid_units.map(|units| units.enabled).unwrap_or(0),
                consumed_units: sku.consumed_units,
            })
            .collect())
    }

    fn list_existing_principals(&self) -> DirectoryResult<HashSet<String>> {
        let mut principals = HashSet::new();
        let mut request = self
            .http
            .get(self.users_url())
            .query(&[("$select", "userPrincipalName"), ("$top", "999")]);

        loop {
            let page: Page<GraphUser> = self.get_json(request)?;
            principals.extend(
                page.value
                    .into_iter()
                    .filter_map(|user| user.user_principal_name)
                    .map(|upn| upn.to_ascii_lowercase()),
            );
            match page.next_link {
                Some(next) => request = self.http.get(next),
                None => break,
            }
        }

        debug!(count = principals.len(), "listed existing principals");
        Ok(principals)
    }

    fn create_account(
        &self,
        account: &NewAccount,
        secret: &SecretString,
        force_change: bool,
    ) -> DirectoryResult<AccountHandle> {
        let body = create_user_body(account, secret, force_change);
        let created: GraphObject = self.get_json(self.http.post(self.users_url()).json(&body))?;
        Ok(AccountHandle::new(created.id))
    }

    fn delete_account(&self, handle: &AccountHandle) -> DirectoryResult<()> {
        self.send(self.http.delete(format!("{}/{}", self.users_url(), handle)))?;
        Ok(())
    }

    fn assign_entitlement(&self, handle: &AccountHandle, sku: &SkuId) -> DirectoryResult<()> {
        let url = format!("{}/{}/assignLicense", self.users_url(), handle);
        self.send(self.http.post(url).json(&assign_license_body(sku)))?;
        Ok(())
    }

    fn find_group(&self, name: &str) -> DirectoryResult<Option<GroupHandle>> {
        let filter = format!("displayName eq {}", odata_quote(name));
        let page: Page<GraphObject> = self.get_json(
            self.http
                .get(format!("{}/groups", self.graph_url))
                .query(&[("$filter", filter.as_str()), ("$select", "id")]),
        )?;
        Ok(page.value.into_iter().next().map(|group| GroupHandle::new(group.id)))
    }

    fn add_group_member(&self, group: &GroupHandle, handle: &AccountHandle) -> DirectoryResult<()> {
        let url = format!("{}/groups/{}/members/$ref", self.graph_url, group);
        let body = member_ref_body(&self.graph_url, handle);
        match self.send(self.http.post(url).json(&body)) {
            Ok(_) => Ok(()),
            Err(err) if is_already_member(&err) => {
                info!(group = %group, account = %handle, "account already a group member");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn update_attributes(
        &self,
        handle: &AccountHandle,
        attributes: &AccountAttributes,
    ) -> DirectoryResult<()> {
        let url = format!("{}/{}/mailboxSettings", self.users_url(), handle);
        self.send(self.http.patch(url).json(&mailbox_settings_body(attributes)))?;

        // Graph has no mailbox delegation endpoint; the workflow records the
        // delegate as an operator follow-up instead.
        if let Some(delegate) = attributes.delegate.as_deref() {
            info!(account = %handle, delegate, "mailbox delegation left for the mail admin center");
        }
        Ok(())
    }
}

fn check_status(response: Response) -> DirectoryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = match serde_json::from_str::<GraphErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            format!("{}: {}", parsed.error.code, parsed.error.message)
        }
        _ if body.is_empty() => status.to_string(),
        _ => body,
    };
    Err(DirectoryError::from_status(status.as_u16(), message))
}

fn map_transport_error(err: reqwest::Error) -> DirectoryError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        ErrorKind::Network
    } else if let Some(status) = err.status() {
        ErrorKind::from_status(status.as_u16())
    } else {
        ErrorKind::Other
    };
    DirectoryError::classify(kind, err.to_string())
}

/// Quote a string literal for an OData `$filter` expression.
fn odata_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_already_member(err: &DirectoryError) -> bool {
    err.kind() == ErrorKind::BadRequest && err.message().to_ascii_lowercase().contains("already exist")
}

fn create_user_body(account: &NewAccount, secret: &SecretString, force_change: bool) -> JsonValue {
    let mut body = json!({
        "accountEnabled": account.enabled,
        "displayName": account.display_name,
        "givenName": account.given_name,
        "surname": account.family_name,
        "userPrincipalName": account.principal_name,
        "mailNickname": account.mail_nickname,
        "usageLocation": account.usage_location,
        "passwordProfile": {
            "forceChangePasswordNextSignIn": force_change,
            "password": secret.expose(),
        },
    });
    if let Some(department) = &account.department {
        body["department"] = json!(department);
    }
    if let Some(title) = &account.title {
        body["jobTitle"] = json!(title);
    }
    body
}

fn assign_license_body(sku: &SkuId) -> JsonValue {
    json!({
        "addLicenses": [{ "skuId": sku.as_str(), "disabledPlans": [] }],
        "removeLicenses": [],
    })
}

fn member_ref_body(graph_url: &str, handle: &AccountHandle) -> JsonValue {
    json!({ "@odata.id": format!("{graph_url}/directoryObjects/{handle}") })
}

fn mailbox_settings_body(attributes: &AccountAttributes) -> JsonValue {
    json!({ "timeZone": attributes.mailbox_timezone })
}
