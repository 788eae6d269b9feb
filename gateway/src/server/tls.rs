//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! TLS acceptors for encrypted listeners

use crate::error::ConfigError;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// Build an acceptor from a PEM certificate chain and a PEM private key
pub fn load_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, ConfigError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ConfigError::TlsMaterial {
            path: cert_path.to_string(),
            reason: e.to_string(),
        })?;

    tracing::debug!(cert = cert_path, key = key_path, "Loaded TLS context");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &str) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ConfigError::TlsMaterial {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::TlsMaterial {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    if certs.is_empty() {
        return Err(ConfigError::TlsMaterial {
            path: path.to_string(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ConfigError::TlsMaterial {
            path: path.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| ConfigError::TlsMaterial {
            path: path.to_string(),
            reason: "no private key found".to_string(),
        })
}
