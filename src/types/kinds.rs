use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a lead came from. Bulk imports are recorded as `Manual` with a marker in the notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadSource {
    #[default]
    Manual,
    Web,
    Referral,
    Other,
}

impl LeadSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadSource::Manual => "MANUAL",
            LeadSource::Web => "WEB",
            LeadSource::Referral => "REFERRAL",
            LeadSource::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<LeadSource> {
        match s {
            "MANUAL" => Some(LeadSource::Manual),
            "WEB" => Some(LeadSource::Web),
            "REFERRAL" => Some(LeadSource::Referral),
            "OTHER" => Some(LeadSource::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

impl CustomerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::Active => "ACTIVE",
            CustomerStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<CustomerStatus> {
        match s {
            "ACTIVE" => Some(CustomerStatus::Active),
            "INACTIVE" => Some(CustomerStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceKind {
    Quote,
    Invoice,
}

impl InvoiceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            InvoiceKind::Quote => "QUOTE",
            InvoiceKind::Invoice => "INVOICE",
        }
    }

    pub fn parse(s: &str) -> Option<InvoiceKind> {
        match s {
            "QUOTE" => Some(InvoiceKind::Quote),
            "INVOICE" => Some(InvoiceKind::Invoice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactKind {
    Phone,
    Email,
}

impl ContactKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContactKind::Phone => "PHONE",
            ContactKind::Email => "EMAIL",
        }
    }

    pub fn parse(s: &str) -> Option<ContactKind> {
        match s {
            "PHONE" => Some(ContactKind::Phone),
            "EMAIL" => Some(ContactKind::Email),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(LeadSource, CustomerStatus, InvoiceKind, ContactKind);
