use tracing::debug;

use super::LeadEngine;
use crate::error::{Error, Result};
use crate::types::Tag;

pub const MAX_TAG_NAME_LEN: usize = 50;

fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("Tag name cannot be empty"));
    }
    if name.chars().count() > MAX_TAG_NAME_LEN {
        return Err(Error::validation(format!(
            "Tag name cannot exceed {MAX_TAG_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Trims and validates tag names, dropping repeats while keeping first-seen order.
pub fn normalize_tag_names(names: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        validate_tag_name(name)?;
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

/// Parses the `?tags=a,b` query value. Blank and repeated entries are ignored.
pub fn parse_tag_filter(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

impl LeadEngine {
    /// Returns the organization's tag called `name`, creating it with `color` (or the
    /// configured default) if it does not exist yet.
    pub fn find_or_create_tag(
        &self,
        name: &str,
        organization_id: &str,
        color: Option<&str>,
    ) -> Result<Tag> {
        let name = name.trim();
        validate_tag_name(name)?;

        let color = color.unwrap_or(&self.settings.default_tag_color);
        let tag = self.store.find_or_create_tag(organization_id, name, color)?;
        debug!(organization_id, tag = %tag.name, "tag resolved");
        Ok(tag)
    }

    pub fn list_tags(&self, organization_id: &str) -> Result<Vec<Tag>> {
        self.store.list_tags(organization_id)
    }
}
