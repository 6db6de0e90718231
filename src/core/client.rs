use super::{account::Account, auth::Session, user_agent::random_user_agent};
use crate::{
    config::{Delays, Endpoints},
    error::{Error::Sign, Result},
};
use alloy::{
    hex::encode_prefixed,
    primitives::Address,
    signers::{Signer, local::PrivateKeySigner},
};
use alloy_chains::{Chain, NamedChain};
use reqwest::{
    Client, Method, Proxy, RequestBuilder,
    header::{ACCEPT, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, USER_AGENT},
    redirect::Policy,
};
use uuid::Uuid;

/// Per-account handle: the wallet, one proxied transport, and the platform endpoints.
pub struct QuestClient<'a> {
    pub signer: PrivateKeySigner,
    pub external_user_id: Uuid,
    pub chain: Chain,
    pub proxy: Option<String>,
    pub endpoints: &'a Endpoints,
    pub delays: &'a Delays,
    http: Client,
}

impl<'a> QuestClient<'a> {
    pub fn new(
        account: &Account,
        proxy: Option<&str>,
        endpoints: &'a Endpoints,
        delays: &'a Delays,
    ) -> Result<Self> {
        let mut builder = Client::builder().redirect(Policy::none());
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            signer: account.signer.clone(),
            external_user_id: account.external_user_id,
            chain: Chain::from_named(NamedChain::BinanceSmartChain),
            proxy: proxy.map(str::to_string),
            endpoints,
            delays,
            http: builder.build()?,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(Sign)?;
        let signature = encode_prefixed(signature.as_bytes());
        Ok(signature)
    }

    /// Request against the enso API with the search page headers.
    pub fn enso(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoints.enso.join(path)?;
        let origin = self.endpoints.enso_origin();
        Ok(self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "*/*")
            .header(USER_AGENT, random_user_agent())
            .header(ORIGIN, &origin)
            .header(REFERER, format!("{origin}/search?userId={}", self.address())))
    }

    pub fn enso_authed(
        &self,
        method: Method,
        path: &str,
        session: &Session,
    ) -> Result<RequestBuilder> {
        Ok(self
            .enso(method, path)?
            .header(COOKIE, session.cookie_header()))
    }

    /// Request against the speedrun API with browser fetch headers.
    pub fn speedrun(
        &self,
        method: Method,
        path: &str,
        referer_path: &str,
    ) -> Result<RequestBuilder> {
        let url = self.endpoints.speedrun.join(path)?;
        let referer = self.endpoints.speedrun.join(referer_path)?;
        Ok(self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header("accept-language", "en-US,en;q=0.7")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, random_user_agent())
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", "\"Windows\"")
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .header(REFERER, referer.as_str()))
    }
}
