//! The lead lifecycle engine: tag registry, lead CRUD, bulk import, and conversion.
//!
//! Primary data goes through the [`Store`]; everything else is handed to the
//! [`Dispatcher`] and never affects the outcome returned to the caller.

mod convert;
mod import;
mod leads;
mod tags;

use std::sync::Arc;

pub use convert::{Conversion, ConvertOptions};
pub use import::{BulkImport, BulkLeadRow, IMPORT_MARKER, MAX_BULK_ROWS, parse_bulk_rows};
pub use leads::{LeadInput, LeadPatch};
pub use tags::{MAX_TAG_NAME_LEN, normalize_tag_names, parse_tag_filter};

use crate::config::LifecycleConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::store::Store;
use crate::types::{Lead, LeadWithTags};

pub struct LeadEngine {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    settings: LifecycleConfig,
}

impl LeadEngine {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher, settings: LifecycleConfig) -> Self {
        Self {
            store,
            dispatcher,
            settings,
        }
    }

    fn with_tags(&self, lead: Lead) -> Result<LeadWithTags> {
        let tags = self
            .store
            .list_lead_tags(&lead.id)?
            .into_iter()
            .map(|t| t.name)
            .collect();
        Ok(LeadWithTags { lead, tags })
    }
}

/// Trims, lowercases, and drops empty addresses so customer lookups by email are stable.
pub(crate) fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Trims optional free-text fields, treating blank as absent.
pub(crate) fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
