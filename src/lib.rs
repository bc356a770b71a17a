// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club-Dashboard: live data layer for a dance-club administration dashboard.
//!
//! This crate subscribes to club data in Firestore (or an in-process store),
//! maps raw documents into validated entities, joins references into
//! extended rows and exposes the results as reactive state.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::{Config, DataSourceKind};
use db::{FirestoreDb, MemoryDb};
use error::AppError;
use services::{AuthProvider, FileSelectionStore, SelectionStore, SharedSource, StaticAuth};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub source: SharedSource,
    pub auth: Arc<dyn AuthProvider>,
    pub selection_store: Arc<dyn SelectionStore>,
}

impl AppState {
    /// Connect the configured data source and build the shared state.
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let source: SharedSource = match config.data_source {
            DataSourceKind::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
            DataSourceKind::Memory => match &config.seed_file {
                Some(path) => Arc::new(MemoryDb::load_from_file(path)?),
                None => {
                    tracing::warn!("No SEED_FILE set; starting with an empty in-memory store");
                    Arc::new(MemoryDb::new())
                }
            },
        };

        Ok(Self {
            auth: Arc::new(StaticAuth::new(Some(config.dashboard_user_id.clone()))),
            selection_store: Arc::new(FileSelectionStore::new(&config.selection_store_path)),
            source,
            config,
        })
    }
}
