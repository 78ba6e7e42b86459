use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::schema::SCHEMA;
use super::{ConversionClaim, LeadChanges, Store, TaggedLead};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn invalid_column(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unexpected value '{value}'").into(),
    )
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|_| invalid_column(idx, &raw))
}

fn enum_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| invalid_column(idx, &raw))
}

const LEAD_SELECT: &str = "SELECT l.id, l.organization_id, l.name, l.email, l.phone, l.company,
        l.value, l.status, l.source, l.notes, l.assigned_to_id, l.created_by_id,
        l.converted_at, l.converted_to_id, l.created_at, l.updated_at
     FROM leads l";

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        company: row.get(5)?,
        value: decimal_column(row, 6)?,
        status: row.get(7)?,
        source: enum_column(row, 8, LeadSource::parse)?,
        notes: row.get(9)?,
        assigned_to_id: row.get(10)?,
        created_by_id: row.get(11)?,
        converted_at: row.get::<_, Option<String>>(12)?.map(|s| parse_datetime(&s)),
        converted_to_id: row.get(13)?,
        created_at: parse_datetime(&row.get::<_, String>(14)?),
        updated_at: parse_datetime(&row.get::<_, String>(15)?),
    })
}

const TAG_SELECT: &str = "SELECT t.id, t.organization_id, t.name, t.color, t.created_at FROM tags t";

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

const CUSTOMER_SELECT: &str = "SELECT id, organization_id, name, email, phone, company, notes,
        plan, status, created_at, updated_at
     FROM customers";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        company: row.get(5)?,
        notes: row.get(6)?,
        plan: row.get(7)?,
        status: enum_column(row, 8, CustomerStatus::parse)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

const INVOICE_SELECT: &str =
    "SELECT id, organization_id, kind, lead_id, customer_id, amount, status, created_at FROM invoices";

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        kind: enum_column(row, 2, InvoiceKind::parse)?,
        lead_id: row.get(3)?,
        customer_id: row.get(4)?,
        amount: decimal_column(row, 5)?,
        status: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const ACTIVITY_SELECT: &str =
    "SELECT id, organization_id, lead_id, customer_id, description, created_at FROM activities";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        lead_id: row.get(2)?,
        customer_id: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn select_tag_by_name(conn: &Connection, organization_id: &str, name: &str) -> Result<Option<Tag>> {
    conn.query_row(
        &format!("{TAG_SELECT} WHERE t.organization_id = ?1 AND t.name = ?2"),
        params![organization_id, name],
        tag_from_row,
    )
    .optional()
    .map_err(Error::from)
}

/// Insert first, re-select on a uniqueness violation. Works inside an open transaction
/// because SQLite only aborts the failing statement.
fn find_or_create_tag_in(
    conn: &Connection,
    organization_id: &str,
    name: &str,
    color: &str,
) -> Result<Tag> {
    let tag = Tag {
        id: Uuid::new_v4().to_string(),
        organization_id: organization_id.to_string(),
        name: name.to_string(),
        color: Some(color.to_string()),
        created_at: Utc::now(),
    };

    let result = conn.execute(
        "INSERT INTO tags (id, organization_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tag.id,
            tag.organization_id,
            tag.name,
            tag.color,
            format_datetime(&tag.created_at),
        ],
    );

    match result {
        Ok(_) => Ok(tag),
        Err(e) if Error::is_unique_violation(&e) => {
            select_tag_by_name(conn, organization_id, name)?.ok_or(Error::NotFound)
        }
        Err(e) => Err(Error::from(e)),
    }
}

fn link_lead_tags(
    conn: &Connection,
    organization_id: &str,
    lead_id: &str,
    tags: &[String],
    color: &str,
) -> Result<()> {
    for name in tags {
        let tag = find_or_create_tag_in(conn, organization_id, name, color)?;
        conn.execute(
            "INSERT OR IGNORE INTO lead_tags (lead_id, tag_id) VALUES (?1, ?2)",
            params![lead_id, tag.id],
        )?;
    }
    Ok(())
}

fn nullable_text(value: &Option<String>) -> SqlValue {
    match value {
        Some(text) => SqlValue::Text(text.clone()),
        None => SqlValue::Null,
    }
}

fn insert_lead(conn: &Connection, lead: &Lead) -> Result<()> {
    conn.execute(
        "INSERT INTO leads (id, organization_id, name, email, phone, company, value, status, source,
                            notes, assigned_to_id, created_by_id, converted_at, converted_to_id,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            lead.id,
            lead.organization_id,
            lead.name,
            lead.email,
            lead.phone,
            lead.company,
            lead.value.to_string(),
            lead.status,
            lead.source.as_str(),
            lead.notes,
            lead.assigned_to_id,
            lead.created_by_id,
            lead.converted_at.as_ref().map(format_datetime),
            lead.converted_to_id,
            format_datetime(&lead.created_at),
            format_datetime(&lead.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_customer(conn: &Connection, customer: &Customer) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO customers (id, organization_id, name, email, phone, company, notes, plan,
                                status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            customer.id,
            customer.organization_id,
            customer.name,
            customer.email,
            customer.phone,
            customer.company,
            customer.notes,
            customer.plan,
            customer.status.as_str(),
            format_datetime(&customer.created_at),
            format_datetime(&customer.updated_at),
        ],
    )?;
    Ok(())
}

fn select_customer_by_email(
    conn: &Connection,
    organization_id: &str,
    email: &str,
) -> Result<Option<Customer>> {
    conn.query_row(
        &format!("{CUSTOMER_SELECT} WHERE organization_id = ?1 AND email = ?2"),
        params![organization_id, email],
        customer_from_row,
    )
    .optional()
    .map_err(Error::from)
}

/// Returns the customer sharing the candidate's email, or inserts the candidate.
fn resolve_customer_in(
    conn: &Connection,
    organization_id: &str,
    candidate: &Customer,
) -> Result<(Customer, bool)> {
    if let Some(email) = candidate.email.as_deref() {
        if let Some(existing) = select_customer_by_email(conn, organization_id, email)? {
            return Ok((existing, false));
        }
    }

    match insert_customer(conn, candidate) {
        Ok(()) => Ok((candidate.clone(), true)),
        Err(e) if Error::is_unique_violation(&e) => {
            let email = candidate.email.as_deref().ok_or(Error::AlreadyExists)?;
            let existing =
                select_customer_by_email(conn, organization_id, email)?.ok_or(Error::AlreadyExists)?;
            Ok((existing, false))
        }
        Err(e) => Err(Error::from(e)),
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Organization operations

    fn create_organization(&self, org: &Organization) -> Result<()> {
        self.conn().execute(
            "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![org.id, org.name, format_datetime(&org.created_at)],
        )?;
        Ok(())
    }

    fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at FROM organizations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Organization {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, organization_id, name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.organization_id,
                user.name,
                user.email,
                format_datetime(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, organization_id: &str, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, organization_id, name, email, created_at
             FROM users WHERE id = ?1 AND organization_id = ?2",
            params![id, organization_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    organization_id: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Tag operations

    fn find_or_create_tag(&self, organization_id: &str, name: &str, color: &str) -> Result<Tag> {
        let conn = self.conn();
        find_or_create_tag_in(&conn, organization_id, name, color)
    }

    fn list_tags(&self, organization_id: &str) -> Result<Vec<Tag>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("{TAG_SELECT} WHERE t.organization_id = ?1 ORDER BY t.name"))?;

        let rows = stmt.query_map(params![organization_id], tag_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Lead operations

    fn create_lead(&self, record: &TaggedLead, tag_color: &str) -> Result<()> {
        self.create_leads(std::slice::from_ref(record), tag_color)
    }

    fn create_leads(&self, records: &[TaggedLead], tag_color: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for record in records {
            insert_lead(&tx, &record.lead)?;
            link_lead_tags(
                &tx,
                &record.lead.organization_id,
                &record.lead.id,
                &record.tags,
                tag_color,
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_lead(&self, organization_id: &str, id: &str) -> Result<Option<Lead>> {
        let conn = self.conn();
        conn.query_row(
            &format!("{LEAD_SELECT} WHERE l.id = ?1 AND l.organization_id = ?2"),
            params![id, organization_id],
            lead_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_leads(
        &self,
        organization_id: &str,
        tag_filter: &[String],
    ) -> Result<Vec<LeadWithTags>> {
        let conn = self.conn();

        let leads = if tag_filter.is_empty() {
            let mut stmt = conn.prepare(&format!(
                "{LEAD_SELECT} WHERE l.organization_id = ?1 ORDER BY l.created_at DESC, l.rowid DESC"
            ))?;
            let rows = stmt.query_map(params![organization_id], lead_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            // ANY-of: one matching tag is enough
            let mut stmt = conn.prepare(&format!(
                "{LEAD_SELECT}
                 WHERE l.organization_id = ?1
                   AND EXISTS (
                       SELECT 1 FROM lead_tags lt
                       JOIN tags t ON t.id = lt.tag_id
                       WHERE lt.lead_id = l.id
                         AND t.name IN (SELECT value FROM json_each(?2))
                   )
                 ORDER BY l.created_at DESC, l.rowid DESC"
            ))?;
            let filter = serde_json::to_string(tag_filter)?;
            let rows = stmt.query_map(params![organization_id, filter], lead_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut stmt = conn.prepare(
            "SELECT lt.lead_id, t.name
             FROM lead_tags lt
             JOIN tags t ON t.id = lt.tag_id
             WHERE t.organization_id = ?1
             ORDER BY t.name",
        )?;
        let pairs = stmt.query_map(params![organization_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags_by_lead: HashMap<String, Vec<String>> = HashMap::new();
        for pair in pairs {
            let (lead_id, name) = pair?;
            tags_by_lead.entry(lead_id).or_default().push(name);
        }

        Ok(leads
            .into_iter()
            .map(|lead| {
                let tags = tags_by_lead.remove(&lead.id).unwrap_or_default();
                LeadWithTags { lead, tags }
            })
            .collect())
    }

    fn update_lead(
        &self,
        organization_id: &str,
        id: &str,
        changes: &LeadChanges,
        updated_at: DateTime<Utc>,
        tag_color: &str,
    ) -> Result<()> {
        let mut columns: Vec<(&str, SqlValue)> = Vec::new();
        if let Some(name) = &changes.name {
            columns.push(("name = ?", SqlValue::Text(name.clone())));
        }
        if let Some(email) = &changes.email {
            columns.push(("email = ?", nullable_text(email)));
        }
        if let Some(phone) = &changes.phone {
            columns.push(("phone = ?", nullable_text(phone)));
        }
        if let Some(company) = &changes.company {
            columns.push(("company = ?", nullable_text(company)));
        }
        if let Some(value) = &changes.value {
            columns.push(("value = ?", SqlValue::Text(value.to_string())));
        }
        if let Some(status) = &changes.status {
            columns.push((
                "status = CASE WHEN converted_to_id IS NULL THEN ? ELSE status END",
                SqlValue::Text(status.clone()),
            ));
        }
        if let Some(source) = changes.source {
            columns.push(("source = ?", SqlValue::Text(source.as_str().to_string())));
        }
        if let Some(notes) = &changes.notes {
            columns.push(("notes = ?", nullable_text(notes)));
        }
        if let Some(assigned_to_id) = &changes.assigned_to_id {
            columns.push(("assigned_to_id = ?", nullable_text(assigned_to_id)));
        }
        columns.push(("updated_at = ?", SqlValue::Text(format_datetime(&updated_at))));

        let assignments = columns
            .iter()
            .map(|(column, _)| *column)
            .collect::<Vec<_>>()
            .join(", ");
        let mut values: Vec<SqlValue> = columns.into_iter().map(|(_, value)| value).collect();
        values.push(SqlValue::Text(id.to_string()));
        values.push(SqlValue::Text(organization_id.to_string()));

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            &format!("UPDATE leads SET {assignments} WHERE id = ? AND organization_id = ?"),
            params_from_iter(values),
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }

        if let Some(tags) = &changes.tags {
            tx.execute("DELETE FROM lead_tags WHERE lead_id = ?1", params![id])?;
            link_lead_tags(&tx, organization_id, id, tags, tag_color)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_lead(&self, organization_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM leads WHERE id = ?1 AND organization_id = ?2",
            params![id, organization_id],
        )?;
        Ok(rows > 0)
    }

    fn list_lead_tags(&self, lead_id: &str) -> Result<Vec<Tag>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{TAG_SELECT}
             JOIN lead_tags lt ON t.id = lt.tag_id
             WHERE lt.lead_id = ?1
             ORDER BY t.name"
        ))?;

        let rows = stmt.query_map(params![lead_id], tag_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Customer operations

    fn create_customer(&self, customer: &Customer) -> Result<()> {
        match insert_customer(&self.conn(), customer) {
            Ok(()) => Ok(()),
            Err(e) if Error::is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_customer(&self, organization_id: &str, id: &str) -> Result<Option<Customer>> {
        let conn = self.conn();
        conn.query_row(
            &format!("{CUSTOMER_SELECT} WHERE id = ?1 AND organization_id = ?2"),
            params![id, organization_id],
            customer_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_customers(&self, organization_id: &str) -> Result<Vec<Customer>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{CUSTOMER_SELECT} WHERE organization_id = ?1 ORDER BY name, id"
        ))?;

        let rows = stmt.query_map(params![organization_id], customer_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Conversion operations

    fn claim_conversion(
        &self,
        organization_id: &str,
        lead_id: &str,
        candidate: &Customer,
        converted_at: DateTime<Utc>,
    ) -> Result<ConversionClaim> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let (customer, created) = resolve_customer_in(&tx, organization_id, candidate)?;

        let rows = tx.execute(
            "UPDATE leads SET status = ?1, converted_at = ?2, converted_to_id = ?3, updated_at = ?2
             WHERE id = ?4 AND organization_id = ?5 AND converted_to_id IS NULL",
            params![
                WON_STATUS,
                format_datetime(&converted_at),
                customer.id,
                lead_id,
                organization_id,
            ],
        )?;

        if rows == 0 {
            // Lost the race (or the lead vanished); dropping the transaction also
            // discards a customer this call may have inserted.
            let current: Option<Option<String>> = tx
                .query_row(
                    "SELECT converted_to_id FROM leads WHERE id = ?1 AND organization_id = ?2",
                    params![lead_id, organization_id],
                    |row| row.get(0),
                )
                .optional()?;

            return match current.flatten() {
                Some(customer_id) => Ok(ConversionClaim::AlreadyConverted { customer_id }),
                None => Err(Error::NotFound),
            };
        }

        tx.commit()?;
        Ok(ConversionClaim::Claimed { customer, created })
    }

    fn relink_invoices(&self, lead_id: &str, customer_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "UPDATE invoices SET customer_id = ?1 WHERE lead_id = ?2",
            params![customer_id, lead_id],
        )?;
        Ok(rows)
    }

    fn relink_activities(&self, lead_id: &str, customer_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "UPDATE activities SET customer_id = ?1 WHERE lead_id = ?2",
            params![customer_id, lead_id],
        )?;
        Ok(rows)
    }

    // Contact operations

    fn create_contact(&self, contact: &Contact) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO contacts (id, customer_id, kind, value, is_primary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                contact.id,
                contact.customer_id,
                contact.kind.as_str(),
                contact.value,
                contact.is_primary,
                format_datetime(&contact.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if Error::is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn list_contacts(&self, customer_id: &str) -> Result<Vec<Contact>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, customer_id, kind, value, is_primary, created_at
             FROM contacts WHERE customer_id = ?1 ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map(params![customer_id], |row| {
            Ok(Contact {
                id: row.get(0)?,
                customer_id: row.get(1)?,
                kind: enum_column(row, 2, ContactKind::parse)?,
                value: row.get(3)?,
                is_primary: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Invoice and activity operations

    fn create_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.conn().execute(
            "INSERT INTO invoices (id, organization_id, kind, lead_id, customer_id, amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                invoice.id,
                invoice.organization_id,
                invoice.kind.as_str(),
                invoice.lead_id,
                invoice.customer_id,
                invoice.amount.to_string(),
                invoice.status,
                format_datetime(&invoice.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_customer_invoices(&self, customer_id: &str) -> Result<Vec<Invoice>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{INVOICE_SELECT} WHERE customer_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![customer_id], invoice_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create_activity(&self, activity: &Activity) -> Result<()> {
        self.conn().execute(
            "INSERT INTO activities (id, organization_id, lead_id, customer_id, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity.id,
                activity.organization_id,
                activity.lead_id,
                activity.customer_id,
                activity.description,
                format_datetime(&activity.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_customer_activities(&self, customer_id: &str) -> Result<Vec<Activity>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{ACTIVITY_SELECT} WHERE customer_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![customer_id], activity_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Notification operations

    fn create_notification(&self, notification: &Notification) -> Result<()> {
        let data = serde_json::to_string(&notification.data)?;
        self.conn().execute(
            "INSERT INTO notifications (id, user_id, organization_id, kind, title, body, data, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                notification.id,
                notification.user_id,
                notification.organization_id,
                notification.kind,
                notification.title,
                notification.body,
                data,
                notification.read,
                format_datetime(&notification.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_notifications(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, organization_id, kind, title, body, data, read, created_at
             FROM notifications
             WHERE organization_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![organization_id, user_id], |row| {
            let raw: String = row.get(6)?;
            let data = serde_json::from_str(&raw).map_err(|_| invalid_column(6, &raw))?;
            Ok(Notification {
                id: row.get(0)?,
                user_id: row.get(1)?,
                organization_id: row.get(2)?,
                kind: row.get(3)?,
                title: row.get(4)?,
                body: row.get(5)?,
                data,
                read: row.get(7)?,
                created_at: parse_datetime(&row.get::<_, String>(8)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
