//! One function per remote call made by the monitored flows.
//!
//! Every operation returns `(payload, ProbeResult)`. The payload is `None`
//! whenever the call did not succeed: transport failure, non-2xx status, or
//! a 2xx body that could not be decoded. Callers check the payload, never an
//! error, to detect failure.

use crate::config::{ConfigSnapshot, SecretString};
use crate::probe::{ObjectUri, ProbeFailure, ProbeFailureKind, ProbeResult, Probed};
use crate::probe_engine::{ClientOptions, Exchange, HttpClient, HttpResponse, Method, ProbeRequest};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, SystemTime};
use tracing::warn;
use url::Url;

const LINK_SCOPES: [&str; 4] = ["openid", "google_credentials", "data", "user"];
const LINK_REDIRECT_URI: &str = "https://app.terra.bio/#fence-callback";
const LINK_STATE: &str = "eyJwcm92aWRlciI6ImZlbmNlIn0=";

/// Fields requested from the resolver, the same set a workflow localizer asks for.
pub const RESOLVER_FIELDS: [&str; 4] = ["gsUri", "googleServiceAccount", "accessUrl", "hashes"];

#[derive(Clone, Debug, Deserialize)]
pub struct DrsObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub access_methods: Vec<AccessMethod>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccessMethod {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub access_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenBody {
    token: Option<String>,
}

#[derive(Deserialize)]
struct KeyBody {
    data: Option<Value>,
}

#[derive(Deserialize)]
struct AccessUrlBody {
    url: Option<String>,
}

/// Returns the access id of the first access method using `scheme`.
pub fn access_id_for_scheme(object: &DrsObject, scheme: &str) -> Option<String> {
    object
        .access_methods
        .iter()
        .find(|method| method.kind == scheme)
        .and_then(|method| method.access_id.clone())
}

/// Issues probe requests against the services named by one snapshot.
pub struct ProbeSession<'a> {
    config: &'a ConfigSnapshot,
    client: HttpClient,
}

impl<'a> ProbeSession<'a> {
    pub fn new(config: &'a ConfigSnapshot, options: ClientOptions) -> Result<Self, curl::Error> {
        Ok(Self {
            config,
            client: HttpClient::new(options)?,
        })
    }

    pub fn identity_link_url(&mut self) -> Probed<String> {
        let base = self.broker_url("/authorization-url");
        let exchange = match base {
            Some(mut url) => {
                {
                    let mut query = url.query_pairs_mut();
                    for scope in LINK_SCOPES {
                        query.append_pair("scopes", scope);
                    }
                    query.append_pair("redirect_uri", LINK_REDIRECT_URI);
                    query.append_pair("state", LINK_STATE);
                }
                self.client
                    .send(&ProbeRequest::new(Method::Options, url).content_type("*/*"))
            }
            None => return invalid_url("identity_link_url"),
        };
        let Exchange { response, result } = exchange;
        let payload = response
            .filter(HttpResponse::is_success)
            .and_then(|response| response.effective_url);
        (payload, result)
    }

    pub fn identity_link_status(&mut self, caller: &SecretString) -> Probed<Value> {
        let Some(url) = self.broker_url("") else {
            return invalid_url("identity_link_status");
        };
        let exchange = self
            .client
            .send(&ProbeRequest::new(Method::Get, url).bearer(Some(caller)));
        decode("identity_link_status", exchange, |value: Value| Some(value))
    }

    pub fn delegated_access_token(&mut self, caller: &SecretString) -> Probed<SecretString> {
        let Some(url) = self.broker_url("/accesstoken") else {
            return invalid_url("delegated_access_token");
        };
        let exchange = self
            .client
            .send(&ProbeRequest::new(Method::Get, url).bearer(Some(caller)));
        decode("delegated_access_token", exchange, |body: TokenBody| {
            body.token.map(SecretString::new)
        })
    }

    pub fn service_account_key(&mut self, caller: &SecretString) -> Probed<Value> {
        let Some(url) = self.broker_url("/serviceaccount/key") else {
            return invalid_url("service_account_key");
        };
        let exchange = self
            .client
            .send(&ProbeRequest::new(Method::Get, url).bearer(Some(caller)));
        decode("service_account_key", exchange, |body: KeyBody| body.data)
    }

    pub fn resolve_metadata(&mut self, object: &ObjectUri) -> Probed<DrsObject> {
        let path = format!("/ga4gh/drs/v1/objects/{}", object.object_id());
        let Some(url) = self.service_url(&self.config.object_service_host, &path) else {
            return invalid_url("resolve_metadata");
        };
        let exchange = self.client.send(&ProbeRequest::new(Method::Get, url));
        decode("resolve_metadata", exchange, |object: DrsObject| Some(object))
    }

    pub fn signed_access_url(
        &mut self,
        delegated: Option<&SecretString>,
        object: &ObjectUri,
        access_id: &str,
    ) -> Probed<SecretString> {
        let path = format!(
            "/ga4gh/drs/v1/objects/{}/access/{access_id}",
            object.object_id()
        );
        let Some(url) = self.service_url(&self.config.object_service_host, &path) else {
            return invalid_url("signed_access_url");
        };
        let exchange = self
            .client
            .send(&ProbeRequest::new(Method::Get, url).bearer(delegated));
        decode("signed_access_url", exchange, |body: AccessUrlBody| {
            body.url.map(SecretString::new)
        })
    }

    pub fn resolver_lookup(&mut self, caller: &SecretString, object: &ObjectUri) -> Probed<Value> {
        let Some(url) = self.service_url(&self.config.resolver_host, "/martha_v3/") else {
            return invalid_url("resolver_lookup");
        };
        let body = json!({ "url": object.as_str(), "fields": RESOLVER_FIELDS });
        let exchange = self.client.send(
            &ProbeRequest::new(Method::Post, url)
                .bearer(Some(caller))
                .body(body.to_string().into_bytes()),
        );
        decode("resolver_lookup", exchange, |value: Value| Some(value))
    }

    /// `delegated` may be absent; the request then goes out unauthenticated
    /// and the endpoint's rejection is what gets measured.
    pub fn user_info(&mut self, delegated: Option<&SecretString>) -> Probed<Value> {
        let Some(url) = self.service_url(&self.config.object_service_host, "/user/user/") else {
            return invalid_url("user_info");
        };
        let exchange = self.client.send(
            &ProbeRequest::new(Method::Get, url)
                .bearer(delegated)
                .accept("*/*"),
        );
        decode("user_info", exchange, |value: Value| Some(value))
    }

    fn broker_url(&self, suffix: &str) -> Option<Url> {
        let path = format!(
            "/api/link/v1/{}{suffix}",
            self.config.identity_provider_key
        );
        self.service_url(&self.config.identity_broker_host, &path)
    }

    fn service_url(&self, host: &str, path: &str) -> Option<Url> {
        Url::parse(&format!("{}{path}", self.config.base_url(host))).ok()
    }
}

fn decode<B, T>(
    operation: &'static str,
    exchange: Exchange,
    extract: impl FnOnce(B) -> Option<T>,
) -> Probed<T>
where
    B: serde::de::DeserializeOwned,
{
    let Exchange { response, result } = exchange;
    let Some(response) = response.filter(HttpResponse::is_success) else {
        return (None, result);
    };
    match response.json::<B>() {
        Ok(body) => (extract(body), result),
        Err(err) => {
            warn!(operation, error = %err, truncated = response.truncated, "undecodable response body");
            (None, result)
        }
    }
}

fn invalid_url<T>(operation: &'static str) -> Probed<T> {
    let failure = ProbeFailure {
        kind: ProbeFailureKind::IoError,
        message: format!("could not build request URL for {operation}"),
    };
    (
        None,
        ProbeResult::from_failure(SystemTime::now(), Duration::ZERO, &failure),
    )
}

#[cfg(test)]
mod tests;
