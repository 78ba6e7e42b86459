use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::tags::normalize_tag_names;
use super::{LeadEngine, normalize_email, normalize_text};
use crate::auth::Actor;
use crate::dispatch::{EmailTemplate, org_channel, user_channel};
use crate::error::{Error, Result};
use crate::store::{LeadChanges, TaggedLead};
use crate::types::{DEFAULT_LEAD_STATUS, Lead, LeadSource, LeadWithTags, User, WON_STATUS};

/// Fields accepted when creating a lead.
#[derive(Debug, Clone, Default)]
pub struct LeadInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub value: Option<Decimal>,
    pub status: Option<String>,
    pub source: Option<LeadSource>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<String>,
    pub tags: Vec<String>,
}

/// A partial update. `None` leaves a field untouched; `tags: Some(vec![])` clears the
/// tag set and an empty `assigned_to_id` unassigns the lead.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub value: Option<Decimal>,
    pub status: Option<String>,
    pub source: Option<LeadSource>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub(crate) fn validate_lead_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Lead name cannot be empty"));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_value(value: Decimal) -> Result<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::validation("Lead value cannot be negative"));
    }
    Ok(value)
}

impl LeadEngine {
    pub fn list_leads(&self, organization_id: &str, tag_filter: &[String]) -> Result<Vec<LeadWithTags>> {
        self.store.list_leads(organization_id, tag_filter)
    }

    pub fn get_lead(&self, organization_id: &str, id: &str) -> Result<LeadWithTags> {
        let lead = self
            .store
            .get_lead(organization_id, id)?
            .ok_or(Error::NotFound)?;
        self.with_tags(lead)
    }

    pub fn create_lead(&self, actor: &Actor, input: LeadInput) -> Result<LeadWithTags> {
        let name = validate_lead_name(&input.name)?;
        let tags = normalize_tag_names(&input.tags)?;
        let value = validate_value(input.value.unwrap_or_default())?;
        let assigned_to_id = normalize_text(input.assigned_to_id);
        let assignee = match &assigned_to_id {
            Some(id) => Some(self.resolve_assignee(&actor.organization_id, id)?),
            None => None,
        };

        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            organization_id: actor.organization_id.clone(),
            name,
            email: normalize_email(input.email),
            phone: normalize_text(input.phone),
            company: normalize_text(input.company),
            value,
            status: normalize_text(input.status).unwrap_or_else(|| DEFAULT_LEAD_STATUS.to_string()),
            source: input.source.unwrap_or_default(),
            notes: normalize_text(input.notes),
            assigned_to_id,
            created_by_id: actor.user_id.clone(),
            converted_at: None,
            converted_to_id: None,
            created_at: now,
            updated_at: now,
        };

        self.store.create_lead(
            &TaggedLead {
                lead: lead.clone(),
                tags,
            },
            &self.settings.default_tag_color,
        )?;

        let created = self.with_tags(lead)?;
        info!(
            organization_id = %actor.organization_id,
            lead_id = %created.lead.id,
            "lead created"
        );

        self.dispatcher
            .evaluate_automations(&created.lead.id, &created.lead.status);
        if let Some(assignee) = assignee.filter(|u| u.id != actor.user_id) {
            self.announce_assignment(&created, &assignee);
        }
        self.dispatcher.broadcast(
            org_channel(&actor.organization_id),
            "lead_created",
            json!(created),
        );

        Ok(created)
    }

    /// Applies a partial update. Only the fields present in `patch` are written, and a
    /// converted lead refuses any status other than WON.
    pub fn update_lead(&self, actor: &Actor, id: &str, patch: LeadPatch) -> Result<LeadWithTags> {
        let current = self
            .store
            .get_lead(&actor.organization_id, id)?
            .ok_or(Error::NotFound)?;

        let status = normalize_text(patch.status);
        if let Some(status) = &status {
            if current.is_converted() && status != WON_STATUS {
                return Err(Error::validation("Status of a converted lead cannot change"));
            }
        }

        let assigned_to_id = patch.assigned_to_id.map(|raw| normalize_text(Some(raw)));
        let mut new_assignee = None;
        if let Some(Some(assignee_id)) = &assigned_to_id {
            if current.assigned_to_id.as_deref() != Some(assignee_id.as_str()) {
                new_assignee = Some(self.resolve_assignee(&actor.organization_id, assignee_id)?);
            }
        }

        let changes = LeadChanges {
            name: patch.name.as_deref().map(validate_lead_name).transpose()?,
            email: patch.email.map(|email| normalize_email(Some(email))),
            phone: patch.phone.map(|phone| normalize_text(Some(phone))),
            company: patch.company.map(|company| normalize_text(Some(company))),
            value: patch.value.map(validate_value).transpose()?,
            status: status.clone(),
            source: patch.source,
            notes: patch.notes.map(|notes| normalize_text(Some(notes))),
            assigned_to_id,
            tags: patch.tags.as_deref().map(normalize_tag_names).transpose()?,
        };

        self.store.update_lead(
            &actor.organization_id,
            id,
            &changes,
            Utc::now(),
            &self.settings.default_tag_color,
        )?;

        let updated = self.get_lead(&actor.organization_id, id)?;
        info!(
            organization_id = %actor.organization_id,
            lead_id = %updated.lead.id,
            "lead updated"
        );

        if status.is_some() {
            self.dispatcher
                .evaluate_automations(&updated.lead.id, &updated.lead.status);
        }
        if let Some(assignee) = new_assignee.filter(|u| u.id != actor.user_id) {
            self.announce_assignment(&updated, &assignee);
        }
        self.dispatcher.broadcast(
            org_channel(&actor.organization_id),
            "lead_updated",
            json!(updated),
        );

        Ok(updated)
    }

    pub fn delete_lead(&self, actor: &Actor, id: &str) -> Result<()> {
        if !self.store.delete_lead(&actor.organization_id, id)? {
            return Err(Error::NotFound);
        }

        info!(organization_id = %actor.organization_id, lead_id = id, "lead deleted");
        self.dispatcher.broadcast(
            org_channel(&actor.organization_id),
            "lead_deleted",
            json!({ "id": id }),
        );
        Ok(())
    }

    pub(super) fn resolve_assignee(&self, organization_id: &str, user_id: &str) -> Result<User> {
        self.store
            .get_user(organization_id, user_id)?
            .ok_or_else(|| Error::validation(format!("Assignee {user_id} is not a member of this organization")))
    }

    fn announce_assignment(&self, lead: &LeadWithTags, assignee: &User) {
        let lead_ref = &lead.lead;

        self.dispatcher.notify(
            &assignee.id,
            &lead_ref.organization_id,
            "lead_assigned",
            "New lead assigned",
            format!("The lead \"{}\" was assigned to you", lead_ref.name),
            json!({ "leadId": lead_ref.id }),
        );

        match assignee.email.as_deref() {
            Some(to) => {
                let vars = HashMap::from([
                    ("leadName".to_string(), lead_ref.name.clone()),
                    ("assigneeName".to_string(), assignee.name.clone()),
                    (
                        "leadCompany".to_string(),
                        lead_ref.company.clone().unwrap_or_else(|| "-".to_string()),
                    ),
                    ("leadStatus".to_string(), lead_ref.status.clone()),
                ]);
                self.dispatcher
                    .send_email(to, EmailTemplate::LeadAssigned, &vars);
            }
            None => warn!(user_id = %assignee.id, "assignee has no email, skipping assignment mail"),
        }

        self.dispatcher
            .broadcast(user_channel(&assignee.id), "lead_assigned", json!(lead));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ConvertOptions;
    use crate::lifecycle::testing::{actor, eventually, harness, settle};
    use crate::store::Store;

    fn input(name: &str, tags: &[&str]) -> LeadInput {
        LeadInput {
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..LeadInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_lead_applies_defaults() {
        let h = harness();
        let lead = h
            .engine
            .create_lead(
                &actor("org-a", "alice"),
                LeadInput {
                    email: Some("  Jane@Example.COM ".to_string()),
                    ..input(" Jane ", &["vip", "hot", "vip"])
                },
            )
            .unwrap();

        assert_eq!(lead.lead.name, "Jane");
        assert_eq!(lead.lead.email.as_deref(), Some("jane@example.com"));
        assert_eq!(lead.lead.status, DEFAULT_LEAD_STATUS);
        assert_eq!(lead.lead.source, LeadSource::Manual);
        assert_eq!(lead.lead.value, Decimal::ZERO);
        assert_eq!(lead.lead.created_by_id, "alice");
        assert_eq!(lead.tags, vec!["hot", "vip"]);

        eventually(|| h.recorder.events_named("lead_created").len() == 1).await;
        eventually(|| h.recorder.automations.lock().unwrap().len() == 1).await;
        assert_eq!(
            h.recorder.automations.lock().unwrap()[0],
            (lead.lead.id.clone(), DEFAULT_LEAD_STATUS.to_string())
        );
    }

    #[tokio::test]
    async fn test_create_lead_rejects_blank_name() {
        let h = harness();
        let err = h
            .engine
            .create_lead(&actor("org-a", "alice"), input("   ", &[]))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.engine.list_leads("org-a", &[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tags_shared_across_leads_not_organizations() {
        let h = harness();
        h.engine
            .create_lead(&actor("org-a", "alice"), input("One", &["vip"]))
            .unwrap();
        h.engine
            .create_lead(&actor("org-a", "alice"), input("Two", &["vip"]))
            .unwrap();
        h.engine
            .create_lead(&actor("org-b", "carol"), input("Three", &["vip"]))
            .unwrap();

        let a = h.engine.list_tags("org-a").unwrap();
        let b = h.engine.list_tags("org-b").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_ne!(a[0].id, b[0].id);
    }

    #[tokio::test]
    async fn test_update_tags_full_replace() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h.engine.create_lead(&alice, input("Acme", &["a", "b"])).unwrap();
        let id = lead.lead.id;

        let updated = h
            .engine
            .update_lead(
                &alice,
                &id,
                LeadPatch {
                    tags: Some(vec!["c".to_string()]),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.tags, vec!["c"]);

        let untouched = h
            .engine
            .update_lead(
                &alice,
                &id,
                LeadPatch {
                    company: Some("Acme Inc".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        assert_eq!(untouched.tags, vec!["c"]);
        assert_eq!(untouched.lead.company.as_deref(), Some("Acme Inc"));

        let cleared = h
            .engine
            .update_lead(
                &alice,
                &id,
                LeadPatch {
                    tags: Some(vec![]),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let h = harness();
        let lead = h
            .engine
            .create_lead(&actor("org-a", "alice"), input("Acme", &[]))
            .unwrap();
        let id = lead.lead.id;
        let outsider = actor("org-b", "carol");

        assert!(matches!(h.engine.get_lead("org-b", &id), Err(Error::NotFound)));
        assert!(matches!(
            h.engine.update_lead(
                &outsider,
                &id,
                LeadPatch {
                    name: Some("Hijacked".to_string()),
                    ..LeadPatch::default()
                }
            ),
            Err(Error::NotFound)
        ));
        assert!(matches!(h.engine.delete_lead(&outsider, &id), Err(Error::NotFound)));
        assert!(h.engine.list_leads("org-b", &[]).unwrap().is_empty());

        assert_eq!(h.engine.get_lead("org-a", &id).unwrap().lead.name, "Acme");
    }

    #[tokio::test]
    async fn test_delete_lead() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h.engine.create_lead(&alice, input("Acme", &[])).unwrap();

        h.engine.delete_lead(&alice, &lead.lead.id).unwrap();
        assert!(matches!(
            h.engine.delete_lead(&alice, &lead.lead.id),
            Err(Error::NotFound)
        ));
        eventually(|| h.recorder.events_named("lead_deleted").len() == 1).await;
    }

    #[tokio::test]
    async fn test_assignment_notifies_and_emails() {
        let h = harness();
        let lead = h
            .engine
            .create_lead(
                &actor("org-a", "bob"),
                LeadInput {
                    assigned_to_id: Some("alice".to_string()),
                    ..input("Acme", &[])
                },
            )
            .unwrap();

        eventually(|| h.store.list_notifications("org-a", "alice").unwrap().len() == 1).await;
        eventually(|| h.recorder.emails.lock().unwrap().len() == 1).await;
        eventually(|| h.recorder.events_named("lead_assigned").len() == 1).await;

        let notification = &h.store.list_notifications("org-a", "alice").unwrap()[0];
        assert_eq!(notification.kind, "lead_assigned");
        assert_eq!(notification.data["leadId"], lead.lead.id.as_str());

        let email = h.recorder.emails.lock().unwrap()[0].clone();
        assert_eq!(email.to, "alice@example.com");
        assert_eq!(email.template, EmailTemplate::LeadAssigned);

        let (channel, _) = h.recorder.events_named("lead_assigned")[0].clone();
        assert_eq!(channel, "user_alice");
    }

    #[tokio::test]
    async fn test_assignment_without_email_skips_mail() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h.engine.create_lead(&alice, input("Acme", &[])).unwrap();

        h.engine
            .update_lead(
                &alice,
                &lead.lead.id,
                LeadPatch {
                    assigned_to_id: Some("bob".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();

        eventually(|| h.store.list_notifications("org-a", "bob").unwrap().len() == 1).await;
        settle().await;
        assert!(h.recorder.emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_assignment_is_silent() {
        let h = harness();
        let alice = actor("org-a", "alice");
        h.engine
            .create_lead(
                &alice,
                LeadInput {
                    assigned_to_id: Some("alice".to_string()),
                    ..input("Acme", &[])
                },
            )
            .unwrap();

        eventually(|| h.recorder.events_named("lead_created").len() == 1).await;
        settle().await;
        assert!(h.store.list_notifications("org-a", "alice").unwrap().is_empty());
        assert!(h.recorder.events_named("lead_assigned").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_assignee_rejected() {
        let h = harness();
        let err = h
            .engine
            .create_lead(
                &actor("org-b", "carol"),
                LeadInput {
                    assigned_to_id: Some("alice".to_string()),
                    ..input("Acme", &[])
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_evaluates_automations_only_with_status() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h.engine.create_lead(&alice, input("Acme", &[])).unwrap();
        eventually(|| h.recorder.automations.lock().unwrap().len() == 1).await;

        h.engine
            .update_lead(
                &alice,
                &lead.lead.id,
                LeadPatch {
                    notes: Some("called".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        h.engine
            .update_lead(
                &alice,
                &lead.lead.id,
                LeadPatch {
                    status: Some("Contactado".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();

        eventually(|| h.recorder.events_named("lead_updated").len() == 2).await;
        eventually(|| h.recorder.automations.lock().unwrap().len() == 2).await;
        settle().await;
        let calls = h.recorder.automations.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, "Contactado");
    }

    #[tokio::test]
    async fn test_list_filters_by_any_tag() {
        let h = harness();
        let alice = actor("org-a", "alice");
        h.engine.create_lead(&alice, input("A", &["red"])).unwrap();
        h.engine.create_lead(&alice, input("B", &["blue"])).unwrap();
        h.engine.create_lead(&alice, input("C", &["green"])).unwrap();

        let filter = vec!["red".to_string(), "blue".to_string()];
        let mut names: Vec<String> = h
            .engine
            .list_leads("org-a", &filter)
            .unwrap()
            .into_iter()
            .map(|l| l.lead.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(h.engine.list_leads("org-a", &[]).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_converted_lead_keeps_won_status() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h.engine.create_lead(&alice, input("Acme", &[])).unwrap();
        let id = lead.lead.id;
        let conversion = h
            .engine
            .convert_lead("org-a", &id, ConvertOptions::default())
            .unwrap();

        let err = h
            .engine
            .update_lead(
                &alice,
                &id,
                LeadPatch {
                    status: Some(DEFAULT_LEAD_STATUS.to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let noted = h
            .engine
            .update_lead(
                &alice,
                &id,
                LeadPatch {
                    notes: Some("renewal in May".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        assert_eq!(noted.lead.status, WON_STATUS);
        assert_eq!(noted.lead.notes.as_deref(), Some("renewal in May"));
        assert_eq!(
            noted.lead.converted_to_id.as_deref(),
            Some(conversion.customer_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_update_leaves_unpatched_fields() {
        let h = harness();
        let alice = actor("org-a", "alice");
        let lead = h
            .engine
            .create_lead(
                &alice,
                LeadInput {
                    phone: Some("600 000 000".to_string()),
                    value: Some(Decimal::new(700, 0)),
                    ..input("Acme", &[])
                },
            )
            .unwrap();

        let updated = h
            .engine
            .update_lead(
                &alice,
                &lead.lead.id,
                LeadPatch {
                    phone: Some("  ".to_string()),
                    ..LeadPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.lead.phone, None);
        assert_eq!(updated.lead.value, Decimal::new(700, 0));
        assert_eq!(updated.lead.name, "Acme");
        assert_eq!(updated.lead.status, DEFAULT_LEAD_STATUS);
    }
}
