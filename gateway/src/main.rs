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

use clap::Parser;
use portcullis_common::InboundEvent;
use portcullis_gateway::NetworkService;
use portcullis_gateway::config::{Arguments, Configuration};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config: Configuration = Configuration::load(&arguments.config_file)
        .inspect_err(|err| eprintln!("Configuration load error: {}", err))
        .expect("Unable to load configuration file");

    debug!("Configuration loaded: {:?}", config);
    info!("Starting Portcullis Gateway...");

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let mut service = NetworkService::setup(&config, inbound_tx)
        .inspect_err(|err| eprintln!("Network setup error: {}", err))
        .expect("Unable to set up listeners");

    service
        .start()
        .await
        .inspect_err(|err| eprintln!("Listener start error: {}", err))
        .expect("Unable to start listeners");

    for listener in service.listeners() {
        if let Some(addr) = listener.local_addr() {
            info!("Listener {} accepting on {}", listener.name(), addr);
        }
    }

    // Stand-in application: log everything the network core delivers
    let consumer = tokio::spawn(async move {
        while let Some(event) = inbound_rx.recv().await {
            match event {
                InboundEvent::Connect { connection } => {
                    info!(connection = %connection.id, remote = %connection.remote_addr, "Connect");
                }
                InboundEvent::Line { connection, text } => {
                    info!(connection = %connection, line = %text, "Line");
                }
                InboundEvent::Update {
                    connection,
                    capabilities,
                } => {
                    debug!(connection = %connection, ?capabilities, "Update");
                }
                InboundEvent::Disconnect { connection, reason } => {
                    info!(connection = %connection, reason = %reason, "Disconnect");
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .expect("Unable to listen for shutdown signal");

    info!("Shutting down Portcullis Gateway...");
    service.stop().await;
    consumer.abort();
}
