//! Hardware device transport.
//!
//! A session is opened against a local bridge daemon that owns the USB/HID connection to the
//! device. Requests are JSON-RPC over HTTP; the bridge answers with raw `{v, r, s}` signatures
//! where `v` is the single byte the device produced.

use std::time::Duration;

use alloy::hex;
use alloy::primitives::Address;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::signer::types::{RawSignature, SignerError, SignerResult, TypedDataHash};

/// Opens device sessions.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Open a new exclusive session. Fails with `DeviceUnavailable` when the device cannot be reached.
    async fn open(&self) -> SignerResult<Box<dyn DeviceSession>>;
}

/// An open, exclusively owned device session.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    async fn address(&mut self, path: &str) -> SignerResult<Address>;

    /// Sign the unsigned transaction payload (RLP / EIP-2718 signing bytes).
    async fn sign_transaction(&mut self, path: &str, payload: &[u8]) -> SignerResult<RawSignature>;

    /// Sign an EIP-191 personal message.
    async fn sign_message(&mut self, path: &str, message: &[u8]) -> SignerResult<RawSignature>;

    /// Sign EIP-712 data in hashed mode.
    async fn sign_typed_data(
        &mut self,
        path: &str,
        payload: &TypedDataHash,
    ) -> SignerResult<RawSignature>;

    /// Release the device.
    async fn close(&mut self) -> SignerResult<()>;
}

/// Transport talking to a device bridge daemon over HTTP.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    client: reqwest::Client,
    bridge_url: String,
}

impl BridgeTransport {
    /// Create a transport for the bridge at `bridge_url`.
    pub fn new(bridge_url: impl Into<String>, timeout: Duration) -> SignerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignerError::DeviceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            bridge_url: bridge_url.into(),
        })
    }
}

#[async_trait]
impl DeviceTransport for BridgeTransport {
    async fn open(&self) -> SignerResult<Box<dyn DeviceSession>> {
        let no_params: Vec<String> = Vec::new();
        let opened: OpenedSession = call(&self.client, &self.bridge_url, "device_open", no_params)
            .await
            .map_err(|e| match e {
                SignerError::Device(msg) => SignerError::DeviceUnavailable(msg),
                other => other,
            })?;

        tracing::debug!(session = %opened.session, "Device session opened");

        Ok(Box::new(BridgeSession {
            client: self.client.clone(),
            bridge_url: self.bridge_url.clone(),
            session: opened.session,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct OpenedSession {
    session: String,
}

struct BridgeSession {
    client: reqwest::Client,
    bridge_url: String,
    session: String,
}

#[async_trait]
impl DeviceSession for BridgeSession {
    async fn address(&mut self, path: &str) -> SignerResult<Address> {
        call(&self.client, &self.bridge_url, "device_address", (&self.session, path)).await
    }

    async fn sign_transaction(&mut self, path: &str, payload: &[u8]) -> SignerResult<RawSignature> {
        let payload = hex::encode_prefixed(payload);
        call(
            &self.client,
            &self.bridge_url,
            "device_signTransaction",
            (&self.session, path, payload),
        )
        .await
    }

    async fn sign_message(&mut self, path: &str, message: &[u8]) -> SignerResult<RawSignature> {
        let message = hex::encode_prefixed(message);
        call(
            &self.client,
            &self.bridge_url,
            "device_signMessage",
            (&self.session, path, message),
        )
        .await
    }

    async fn sign_typed_data(
        &mut self,
        path: &str,
        payload: &TypedDataHash,
    ) -> SignerResult<RawSignature> {
        call(
            &self.client,
            &self.bridge_url,
            "device_signTypedData",
            (&self.session, path, payload.domain_separator, payload.struct_hash),
        )
        .await
    }

    async fn close(&mut self) -> SignerResult<()> {
        let _: bool = call(&self.client, &self.bridge_url, "device_close", (&self.session,)).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u32,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

async fn call<P: Serialize + Send, R: DeserializeOwned + Send>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: P,
) -> SignerResult<R> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        method,
        params,
        id: 1,
    };

    let response = client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| SignerError::DeviceUnavailable(format!("bridge unreachable: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        return Err(SignerError::Device(format!("bridge returned {status}: {body}")));
    }

    let rpc: JsonRpcResponse<R> = response
        .json()
        .await
        .map_err(|e| SignerError::Device(format!("malformed bridge response: {e}")))?;

    match rpc.result {
        Some(result) => Ok(result),
        None => {
            let error = rpc.error.unwrap_or(JsonRpcError {
                code: -1,
                message: "unknown error".to_string(),
            });
            Err(SignerError::Device(format!(
                "{} failed ({}): {}",
                method, error.code, error.message
            )))
        }
    }
}
