use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::LeadEngine;
use crate::dispatch::org_channel;
use crate::error::{Error, Result};
use crate::store::ConversionClaim;
use crate::types::{
    Activity, Contact, ContactKind, Customer, CustomerStatus, Invoice, InvoiceKind, Lead,
};

/// Status of the invoice generated on conversion.
const GENERATED_INVOICE_STATUS: &str = "PENDING";

const CONVERSION_ACTIVITY: &str = "Lead converted to customer";

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub plan: Option<String>,
    pub generate_invoice: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub customer_id: String,
    pub customer: Customer,
}

impl LeadEngine {
    /// Turns a lead into a customer.
    ///
    /// The customer lookup-or-insert and the `converted_to_id` write commit together;
    /// everything after that is best-effort and safe to repeat. Calling this on a lead
    /// that is already converted returns [`Error::AlreadyConverted`].
    pub fn convert_lead(
        &self,
        organization_id: &str,
        lead_id: &str,
        options: ConvertOptions,
    ) -> Result<Conversion> {
        let lead = self
            .store
            .get_lead(organization_id, lead_id)?
            .ok_or(Error::NotFound)?;

        if let Some(customer_id) = lead.converted_to_id.clone() {
            // A retry after an interrupted conversion lands here; finish the relink.
            self.relink(&lead.id, &customer_id);
            return Err(Error::AlreadyConverted { customer_id });
        }

        let candidate = self.candidate_customer(&lead, options.plan);
        let (customer, created) =
            match self
                .store
                .claim_conversion(organization_id, &lead.id, &candidate, Utc::now())?
            {
                ConversionClaim::Claimed { customer, created } => (customer, created),
                ConversionClaim::AlreadyConverted { customer_id } => {
                    info!(lead_id, customer_id = %customer_id, "lead converted concurrently");
                    return Err(Error::AlreadyConverted { customer_id });
                }
            };

        info!(
            organization_id,
            lead_id,
            customer_id = %customer.id,
            created,
            "lead converted"
        );

        if created {
            self.dispatcher.sync_external(customer.clone(), organization_id);
        }

        self.relink(&lead.id, &customer.id);
        self.bootstrap_contact(&lead, &customer);
        if options.generate_invoice {
            self.generate_invoice(&lead, &customer);
        }
        self.record_conversion_activity(&lead, &customer);

        self.dispatcher.broadcast(
            org_channel(organization_id),
            "lead_converted",
            json!({
                "leadId": lead.id,
                "customerId": customer.id,
                "customer": customer,
            }),
        );

        Ok(Conversion {
            customer_id: customer.id.clone(),
            customer,
        })
    }

    fn candidate_customer(&self, lead: &Lead, plan: Option<String>) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4().to_string(),
            organization_id: lead.organization_id.clone(),
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            notes: lead.notes.clone(),
            plan: plan
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| self.settings.default_customer_plan.clone()),
            status: CustomerStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn relink(&self, lead_id: &str, customer_id: &str) {
        match self.store.relink_invoices(lead_id, customer_id) {
            Ok(n) => debug!(lead_id, customer_id, invoices = n, "invoices relinked"),
            Err(e) => error!(lead_id, customer_id, "Failed to relink invoices: {e}"),
        }
        match self.store.relink_activities(lead_id, customer_id) {
            Ok(n) => debug!(lead_id, customer_id, activities = n, "activities relinked"),
            Err(e) => error!(lead_id, customer_id, "Failed to relink activities: {e}"),
        }
    }

    fn bootstrap_contact(&self, lead: &Lead, customer: &Customer) {
        let (kind, value) = match (&lead.phone, &lead.email) {
            (Some(phone), _) => (ContactKind::Phone, phone.clone()),
            (None, Some(email)) => (ContactKind::Email, email.clone()),
            (None, None) => return,
        };

        // A merged customer keeps the primary contact it already has.
        let has_primary = match self.store.list_contacts(&customer.id) {
            Ok(contacts) => contacts.iter().any(|c| c.is_primary),
            Err(e) => {
                warn!(customer_id = %customer.id, "Failed to list contacts: {e}");
                return;
            }
        };

        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            kind,
            value,
            is_primary: !has_primary,
            created_at: Utc::now(),
        };

        match self.store.create_contact(&contact) {
            Ok(()) => {}
            Err(Error::AlreadyExists) => {
                debug!(customer_id = %customer.id, kind = %kind, "contact already present");
            }
            Err(e) => warn!(customer_id = %customer.id, "Failed to create primary contact: {e}"),
        }
    }

    fn generate_invoice(&self, lead: &Lead, customer: &Customer) {
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            organization_id: lead.organization_id.clone(),
            kind: InvoiceKind::Invoice,
            lead_id: Some(lead.id.clone()),
            customer_id: Some(customer.id.clone()),
            amount: lead.value,
            status: GENERATED_INVOICE_STATUS.to_string(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.create_invoice(&invoice) {
            error!(lead_id = %lead.id, customer_id = %customer.id, "Failed to generate invoice: {e}");
        }
    }

    fn record_conversion_activity(&self, lead: &Lead, customer: &Customer) {
        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            organization_id: lead.organization_id.clone(),
            lead_id: Some(lead.id.clone()),
            customer_id: Some(customer.id.clone()),
            description: CONVERSION_ACTIVITY.to_string(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.create_activity(&activity) {
            error!(lead_id = %lead.id, "Failed to record conversion activity: {e}");
        }
    }
}
