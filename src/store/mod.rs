mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::types::*;

/// A lead together with the tag names it should be linked to.
#[derive(Debug, Clone)]
pub struct TaggedLead {
    pub lead: Lead,
    pub tags: Vec<String>,
}

/// Columns to write in a lead update. `None` leaves a column untouched and
/// `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct LeadChanges {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub value: Option<Decimal>,
    pub status: Option<String>,
    pub source: Option<LeadSource>,
    pub notes: Option<Option<String>>,
    pub assigned_to_id: Option<Option<String>>,
    /// Replaces the tag set when present.
    pub tags: Option<Vec<String>>,
}

/// Outcome of the conditional write that marks a lead as converted.
#[derive(Debug, Clone)]
pub enum ConversionClaim {
    /// This call set `converted_to_id`. `created` is true when the customer row was
    /// inserted by this call rather than found by email.
    Claimed { customer: Customer, created: bool },
    /// Another call got there first.
    AlreadyConverted { customer_id: String },
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Organization operations
    fn create_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization(&self, id: &str) -> Result<Option<Organization>>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, organization_id: &str, id: &str) -> Result<Option<User>>;

    // Tag operations
    /// Inserts the tag, or returns the existing row when the name is already taken
    /// in the organization. Relies on the UNIQUE(organization_id, name) constraint.
    fn find_or_create_tag(&self, organization_id: &str, name: &str, color: &str) -> Result<Tag>;
    fn list_tags(&self, organization_id: &str) -> Result<Vec<Tag>>;

    // Lead operations
    fn create_lead(&self, record: &TaggedLead, tag_color: &str) -> Result<()>;
    /// Creates every lead in a single transaction: all rows persist or none do.
    fn create_leads(&self, records: &[TaggedLead], tag_color: &str) -> Result<()>;
    fn get_lead(&self, organization_id: &str, id: &str) -> Result<Option<Lead>>;
    /// Lists leads, keeping those with at least one tag in `tag_filter` when it is non-empty.
    fn list_leads(&self, organization_id: &str, tag_filter: &[String])
    -> Result<Vec<LeadWithTags>>;
    /// Writes only the columns present in `changes`. A status change never applies to a
    /// lead that is already converted.
    fn update_lead(
        &self,
        organization_id: &str,
        id: &str,
        changes: &LeadChanges,
        updated_at: DateTime<Utc>,
        tag_color: &str,
    ) -> Result<()>;
    fn delete_lead(&self, organization_id: &str, id: &str) -> Result<bool>;
    fn list_lead_tags(&self, lead_id: &str) -> Result<Vec<Tag>>;

    // Customer operations
    fn create_customer(&self, customer: &Customer) -> Result<()>;
    fn get_customer(&self, organization_id: &str, id: &str) -> Result<Option<Customer>>;
    fn list_customers(&self, organization_id: &str) -> Result<Vec<Customer>>;

    // Conversion operations
    /// Resolves the customer by email (inserting `candidate` when none exists) and sets
    /// `converted_to_id` only if it is still NULL, in one transaction.
    fn claim_conversion(
        &self,
        organization_id: &str,
        lead_id: &str,
        candidate: &Customer,
        converted_at: DateTime<Utc>,
    ) -> Result<ConversionClaim>;
    fn relink_invoices(&self, lead_id: &str, customer_id: &str) -> Result<usize>;
    fn relink_activities(&self, lead_id: &str, customer_id: &str) -> Result<usize>;

    // Contact operations
    fn create_contact(&self, contact: &Contact) -> Result<()>;
    fn list_contacts(&self, customer_id: &str) -> Result<Vec<Contact>>;

    // Invoice and activity operations
    fn create_invoice(&self, invoice: &Invoice) -> Result<()>;
    fn list_customer_invoices(&self, customer_id: &str) -> Result<Vec<Invoice>>;
    fn create_activity(&self, activity: &Activity) -> Result<()>;
    fn list_customer_activities(&self, customer_id: &str) -> Result<Vec<Activity>>;

    // Notification operations
    fn create_notification(&self, notification: &Notification) -> Result<()>;
    fn list_notifications(&self, organization_id: &str, user_id: &str)
    -> Result<Vec<Notification>>;
}
