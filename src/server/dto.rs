use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::{BulkImport, Conversion, ConvertOptions, LeadInput, LeadPatch};
use crate::types::{Customer, LeadSource};

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsParams {
    /// Comma-separated tag names; a lead matches if it carries any of them.
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateLeadRequest {
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

impl From<CreateLeadRequest> for LeadInput {
    fn from(req: CreateLeadRequest) -> Self {
        LeadInput {
            name: req.name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            value: req.value,
            status: req.status,
            source: req.source,
            notes: req.notes,
            assigned_to_id: req.assigned_to_id,
            tags: req.tags,
        }
    }
}

/// Omitted fields are left unchanged. `tags: []` clears the tag set, while leaving
/// `tags` out keeps it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateLeadRequest {
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

impl From<UpdateLeadRequest> for LeadPatch {
    fn from(req: UpdateLeadRequest) -> Self {
        LeadPatch {
            name: req.name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            value: req.value,
            status: req.status,
            source: req.source,
            notes: req.notes,
            assigned_to_id: req.assigned_to_id,
            tags: req.tags,
        }
    }
}

/// `leads` stays untyped so a non-array payload is reported as a validation error.
#[derive(Debug, Default, Deserialize)]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub leads: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertLeadRequest {
    pub plan: Option<String>,
    pub generate_invoice: bool,
}

impl From<ConvertLeadRequest> for ConvertOptions {
    fn from(req: ConvertLeadRequest) -> Self {
        ConvertOptions {
            plan: req.plan,
            generate_invoice: req.generate_invoice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub success: bool,
    pub count: usize,
    pub ids: Vec<String>,
}

impl From<BulkImport> for BulkCreateResponse {
    fn from(import: BulkImport) -> Self {
        Self {
            success: true,
            count: import.count,
            ids: import.ids,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadResponse {
    pub success: bool,
    pub customer_id: String,
    pub customer: Customer,
}

impl From<Conversion> for ConvertLeadResponse {
    fn from(conversion: Conversion) -> Self {
        Self {
            success: true,
            customer_id: conversion.customer_id,
            customer: conversion.customer,
        }
    }
}
