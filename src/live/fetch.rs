use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
}

//an upstream http proxy used for indicator fetches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proxy {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Proxy {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

//source of a published indicator value
//
//Ok(None) means the value is not yet available (or did not parse), which is
//distinct from a transport failure; the scraping itself lives behind this
//trait in a protocol adapter
pub trait IndicatorSource {
    fn fetch(&mut self, proxy: Option<&Proxy>) -> Result<Option<f64>, FetchError>;
}

//round-robin rotation over the configured proxy list
//
//an empty list means proxyless operation; the rotation wraps around
//indefinitely
#[derive(Debug, Clone, Default)]
pub struct ProxyRotation {
    proxies: Vec<Proxy>,
    next: usize,
}

impl ProxyRotation {
    pub fn new(proxies: Vec<Proxy>) -> Self {
        ProxyRotation { proxies, next: 0 }
    }

    pub fn proxyless() -> Self {
        ProxyRotation::default()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    //the next proxy in rotation, or none when operating proxyless
    pub fn next_proxy(&mut self) -> Option<&Proxy> {
        if self.proxies.is_empty() {
            return None;
        }

        let index = self.next % self.proxies.len();
        self.next = (self.next + 1) % self.proxies.len();
        Some(&self.proxies[index])
    }
}
