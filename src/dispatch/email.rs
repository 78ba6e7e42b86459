use std::collections::HashMap;

use serde::Serialize;

/// Templates in the email catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    LeadAssigned,
}

impl EmailTemplate {
    pub const fn name(self) -> &'static str {
        match self {
            EmailTemplate::LeadAssigned => "lead_assigned",
        }
    }

    const fn source(self) -> (&'static str, &'static str) {
        match self {
            EmailTemplate::LeadAssigned => (
                "New lead assigned: {{leadName}}",
                "Hi {{assigneeName}},\n\n\
                 The lead \"{{leadName}}\" ({{leadCompany}}) has been assigned to you.\n\
                 Current status: {{leadStatus}}.\n",
            ),
        }
    }

    /// Fills `{{key}}` placeholders from `vars`. Unknown placeholders are left as-is.
    #[must_use]
    pub fn render(self, to: &str, vars: &HashMap<String, String>) -> OutgoingEmail {
        let (subject, body) = self.source();
        OutgoingEmail {
            to: to.to_string(),
            template: self,
            subject: fill(subject, vars),
            body: fill(body, vars),
        }
    }
}

fn fill(source: &str, vars: &HashMap<String, String>) -> String {
    vars.iter().fold(source.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub template: EmailTemplate,
    pub subject: String,
    pub body: String,
}
