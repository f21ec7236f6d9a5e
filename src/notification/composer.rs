//! Builds the spike message sent to each subscriber.

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{
    models::{NotificationRequest, ReportAddedToIncident, SpikeDecision},
    notification::template::{TemplateService, TemplateServiceError},
};

fn default_subject() -> String {
    "Spike detected for {{ application_name }} ({{ todays_count }} reports)".to_string()
}

fn default_body() -> String {
    concat!(
        "We've detected a spike in incoming reports for application ",
        "<a href=\"{{ application_url }}\">{{ application_name }}</a>\r\n",
        "\r\n",
        "We've received {{ todays_count }} reports so far. Day average is {{ day_average }}\r\n",
        "\r\n",
        "No further spike emails will be sent today for that application."
    )
    .to_string()
}

/// Subject and body templates of the spike message.
///
/// Available variables: `application_id`, `application_name`,
/// `application_url`, `incident_id`, `account_id`, `todays_count`,
/// `day_average`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplates {
    /// Subject line template.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Body template.
    #[serde(default = "default_body")]
    pub body: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self { subject: default_subject(), body: default_body() }
    }
}

/// Renders spike messages with the configured templates and base URL.
pub struct MessageComposer {
    templates: MessageTemplates,
    base_url: Url,
    template_service: TemplateService,
}

impl MessageComposer {
    /// Creates a composer, rejecting templates that do not compile or that
    /// use variables the message does not provide.
    pub fn new(templates: MessageTemplates, base_url: Url) -> Result<Self, TemplateServiceError> {
        let template_service = TemplateService::new();
        template_service.validate(&templates.subject)?;
        template_service.validate(&templates.body)?;

        let composer = Self { templates, base_url, template_service };
        let sample_event = ReportAddedToIncident {
            incident_id: 1,
            application_id: 1,
            application_name: "sample".to_string(),
            report_timestamp: Default::default(),
        };
        let sample_decision = SpikeDecision { spike_count: 1, day_average: 1.0 };
        let sample = composer.context(&sample_event, &sample_decision, 1);
        composer.template_service.render(&composer.templates.subject, sample.clone())?;
        composer.template_service.render(&composer.templates.body, sample)?;
        Ok(composer)
    }

    /// Link to the application's page in the web front end.
    pub fn application_url(&self, application_id: i64) -> String {
        format!("{}/#/application/{}", self.base_url.as_str().trim_end_matches('/'), application_id)
    }

    /// Composes the message for one recipient.
    pub fn compose(
        &self,
        event: &ReportAddedToIncident,
        decision: &SpikeDecision,
        account_id: i64,
    ) -> Result<NotificationRequest, TemplateServiceError> {
        let context = self.context(event, decision, account_id);
        let subject = self.template_service.render(&self.templates.subject, context.clone())?;
        let body = self.template_service.render(&self.templates.body, context)?;

        Ok(NotificationRequest { recipient_account_id: account_id, subject, body })
    }

    fn context(
        &self,
        event: &ReportAddedToIncident,
        decision: &SpikeDecision,
        account_id: i64,
    ) -> serde_json::Value {
        json!({
            "application_id": event.application_id,
            "application_name": event.application_name,
            "application_url": self.application_url(event.application_id),
            "incident_id": event.incident_id,
            "account_id": account_id,
            "todays_count": decision.spike_count,
            "day_average": format_average(decision.day_average),
        })
    }
}

/// Whole averages are shown without decimals, others with two.
fn format_average(average: f64) -> String {
    if average.fract() == 0.0 { format!("{average:.0}") } else { format!("{average:.2}") }
}
