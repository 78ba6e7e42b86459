use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::leads::{validate_lead_name, validate_value};
use super::tags::normalize_tag_names;
use super::{LeadEngine, normalize_email, normalize_text};
use crate::auth::Actor;
use crate::dispatch::org_channel;
use crate::error::{Error, Result};
use crate::store::TaggedLead;
use crate::types::{DEFAULT_LEAD_STATUS, Lead, LeadSource};

/// Most rows a single import may carry.
pub const MAX_BULK_ROWS: usize = 500;

/// Appended to the notes of every imported lead.
pub const IMPORT_MARKER: &str = "[Importado]";

/// One row of an import payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkLeadRow {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub value: Option<Decimal>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkImport {
    pub count: usize,
    pub ids: Vec<String>,
}

/// Validates the shape of an import payload without touching storage.
pub fn parse_bulk_rows(payload: &Value) -> Result<Vec<BulkLeadRow>> {
    let Some(items) = payload.as_array() else {
        return Err(Error::validation("leads must be an array"));
    };
    if items.len() > MAX_BULK_ROWS {
        return Err(Error::validation(format!(
            "Cannot import more than {MAX_BULK_ROWS} leads at once (got {})",
            items.len()
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let row: BulkLeadRow = serde_json::from_value(item.clone())
                .map_err(|e| Error::validation(format!("Row {index}: {e}")))?;
            validate_lead_name(&row.name)
                .map_err(|_| Error::validation(format!("Row {index}: name is required")))?;
            Ok(row)
        })
        .collect()
}

/// Prefixes a validation message with the index of the row that caused it.
fn row_error(index: usize, err: Error) -> Error {
    match err {
        Error::Validation(message) => Error::validation(format!("Row {index}: {message}")),
        other => other,
    }
}

fn import_status(status: Option<String>) -> String {
    match normalize_text(status) {
        Some(s) if s.eq_ignore_ascii_case("NEW") => DEFAULT_LEAD_STATUS.to_string(),
        Some(s) => s,
        None => DEFAULT_LEAD_STATUS.to_string(),
    }
}

fn import_notes(notes: Option<String>) -> String {
    match normalize_text(notes) {
        Some(notes) => format!("{notes}\n{IMPORT_MARKER}"),
        None => IMPORT_MARKER.to_string(),
    }
}

impl LeadEngine {
    /// Creates every row in one transaction. Either all leads exist afterwards or none do.
    /// Rows are checked like single creates before anything is written.
    pub fn bulk_create(&self, actor: &Actor, rows: Vec<BulkLeadRow>) -> Result<BulkImport> {
        if rows.len() > MAX_BULK_ROWS {
            return Err(Error::validation(format!(
                "Cannot import more than {MAX_BULK_ROWS} leads at once (got {})",
                rows.len()
            )));
        }

        let now = Utc::now();
        let mut known_assignees = HashSet::new();
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let name = validate_lead_name(&row.name)
                    .map_err(|_| Error::validation(format!("Row {index}: name is required")))?;
                let tags = normalize_tag_names(&row.tags).map_err(|e| row_error(index, e))?;
                let value = validate_value(row.value.unwrap_or_default())
                    .map_err(|e| row_error(index, e))?;
                let assigned_to_id = normalize_text(row.assigned_to_id);
                if let Some(assignee_id) = &assigned_to_id {
                    if !known_assignees.contains(assignee_id) {
                        self.resolve_assignee(&actor.organization_id, assignee_id)
                            .map_err(|e| row_error(index, e))?;
                        known_assignees.insert(assignee_id.clone());
                    }
                }

                Ok(TaggedLead {
                    lead: Lead {
                        id: Uuid::new_v4().to_string(),
                        organization_id: actor.organization_id.clone(),
                        name,
                        email: normalize_email(row.email),
                        phone: normalize_text(row.phone),
                        company: normalize_text(row.company),
                        value,
                        status: import_status(row.status),
                        source: LeadSource::Manual,
                        notes: Some(import_notes(row.notes)),
                        assigned_to_id,
                        created_by_id: actor.user_id.clone(),
                        converted_at: None,
                        converted_to_id: None,
                        created_at: now,
                        updated_at: now,
                    },
                    tags,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.store
            .create_leads(&records, &self.settings.default_tag_color)?;

        let ids: Vec<String> = records.iter().map(|r| r.lead.id.clone()).collect();
        info!(
            organization_id = %actor.organization_id,
            count = ids.len(),
            "leads imported"
        );

        self.dispatcher.broadcast(
            org_channel(&actor.organization_id),
            "leads_bulk_created",
            json!({ "count": ids.len(), "ids": ids }),
        );
        for record in &records {
            self.dispatcher
                .evaluate_automations(&record.lead.id, &record.lead.status);
        }

        Ok(BulkImport {
            count: ids.len(),
            ids,
        })
    }
}
