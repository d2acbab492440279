//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{eip191_hash_message, keccak256, Address, Bytes, TxHash, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use chain_ops::signer::{
    DeviceSession, DeviceTransport, RawSignature, SignerError, SignerResult, TypedDataHash,
};
use chain_ops::transaction::{Confirmation, NodeClient, TransactionError, TransactionResult};

/// Anvil's first account.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// A running mock HTTP backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a mock backend on an ephemeral port. `handler` maps a request body to (status, body).
pub async fn start_mock_backend<F>(handler: F) -> MockBackend
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let captured = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    let captured = captured.clone();
                    tokio::spawn(async move {
                        let body = match read_request_body(&mut socket).await {
                            Some(body) => body,
                            None => return,
                        };
                        captured.lock().unwrap().push(body.clone());

                        let (status, response) = handler(&body);
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, requests }
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = (header_end + content_length).min(buf.len());
    Some(String::from_utf8_lossy(&buf[header_end..end]).into_owned())
}

/// In-process signing device. Behaves like real firmware: legacy transactions come back with
/// `v = 2*chainId + 35 + parity` truncated to one byte.
#[derive(Clone)]
pub struct MockDevice {
    key: PrivateKeySigner,
    chain_id: u64,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl MockDevice {
    pub fn new(private_key: &str, chain_id: u64) -> Self {
        Self {
            key: private_key.parse().unwrap(),
            chain_id,
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }
}

#[async_trait]
impl DeviceTransport for MockDevice {
    async fn open(&self) -> SignerResult<Box<dyn DeviceSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

impl MockDevice {
    fn sign(&self, hash: B256) -> SignerResult<(B256, B256, bool)> {
        let sig = self
            .key
            .sign_hash_sync(&hash)
            .map_err(|e| SignerError::Device(e.to_string()))?;
        Ok((
            B256::from(sig.r().to_be_bytes::<32>()),
            B256::from(sig.s().to_be_bytes::<32>()),
            sig.v(),
        ))
    }
}

#[async_trait]
impl DeviceSession for MockDevice {
    async fn address(&mut self, _path: &str) -> SignerResult<Address> {
        Ok(self.key.address())
    }

    async fn sign_transaction(&mut self, _path: &str, payload: &[u8]) -> SignerResult<RawSignature> {
        let (r, s, parity) = self.sign(keccak256(payload))?;
        let v = if payload[0] >= 0xc0 {
            // Legacy RLP list: EIP-155 v, truncated by the device.
            ((2 * self.chain_id as u128 + 35 + parity as u128) % 256) as u8
        } else {
            parity as u8
        };
        Ok(RawSignature { v, r, s })
    }

    async fn sign_message(&mut self, _path: &str, message: &[u8]) -> SignerResult<RawSignature> {
        let (r, s, parity) = self.sign(eip191_hash_message(message))?;
        Ok(RawSignature {
            v: 27 + parity as u8,
            r,
            s,
        })
    }

    async fn sign_typed_data(
        &mut self,
        _path: &str,
        payload: &TypedDataHash,
    ) -> SignerResult<RawSignature> {
        let (r, s, parity) = self.sign(payload.signing_hash())?;
        Ok(RawSignature {
            v: 27 + parity as u8,
            r,
            s,
        })
    }

    async fn close(&mut self) -> SignerResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-process node recording every submission.
pub struct MockNode {
    pub chain_id: u64,
    pub submit_error: Option<String>,
    pub calls: AtomicUsize,
    pub submitted: Mutex<Vec<Bytes>>,
}

impl MockNode {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            submit_error: None,
            calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(chain_id: u64, error: &str) -> Self {
        Self {
            submit_error: Some(error.to_string()),
            ..Self::new(chain_id)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_chain_id(&self) -> TransactionResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain_id)
    }

    async fn get_transaction_count(&self, _address: Address) -> TransactionResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn get_gas_price(&self) -> TransactionResult<u128> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(1_000_000_000)
    }

    async fn send_raw_transaction(&self, raw: &Bytes) -> TransactionResult<TxHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.submit_error {
            return Err(TransactionError::Submission(error.clone()));
        }
        self.submitted.lock().unwrap().push(raw.clone());
        Ok(keccak256(raw))
    }

    async fn wait_for_confirmation(&self, _hash: TxHash) -> TransactionResult<Confirmation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Confirmation {
            block_number: 1,
            confirmations: 1,
        })
    }
}
