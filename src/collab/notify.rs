use crate::error::RustyEcrError;
use crate::form::model::FormModel;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_FIELD_LENGTH: usize = 100;

/// One notification address registered for a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: u64,
    /// Identifier of the form the address is registered for
    pub request_id: String,
    pub group: String,
    pub email: String,
}

/// Recipients keyed by their group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientGroups {
    groups: BTreeMap<String, Vec<Recipient>>,
}

impl RecipientGroups {
    pub fn new() -> Self {
        RecipientGroups::default()
    }

    pub fn add(&mut self, recipient: Recipient) {
        self.groups.entry(recipient.group.clone()).or_default().push(recipient);
    }

    pub fn group(&self, name: &str) -> &[Recipient] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// All recipients, group by group.
    pub fn recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.groups.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Recipient> for RecipientGroups {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let mut groups = RecipientGroups::new();
        for recipient in iter {
            groups.add(recipient);
        }
        groups
    }
}

/// Fire-and-report delivery of a form to its recipients.
pub trait Notifier {
    /// Notifies every recipient and returns the ones that could not be reached.
    fn notify(&mut self, recipients: &RecipientGroups, model: &FormModel) -> Vec<Recipient>;
}

/// Subject and body of one group's message.
///
/// `{id}`, `{link}` and `{deadline}` are replaced by the form identifier, the group's link
/// (itself formatted with `{id}`) and the notifier's deadline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTemplate {
    pub subject: String,
    pub body: String,
    pub link: Option<String>,
}

impl GroupTemplate {
    pub fn new(subject: &str, body: &str) -> Self {
        GroupTemplate {
            subject: subject.to_owned(),
            body: body.to_owned(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_owned());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that logs each message instead of sending it.
///
/// A recipient fails when its group or address is empty or too long, or when the address
/// is not shaped like a mailbox.
#[derive(Debug)]
pub struct LogNotifier {
    templates: BTreeMap<String, GroupTemplate>,
    deadline: String,
    mailbox: Regex,
    sent: Vec<Message>,
}

impl LogNotifier {
    pub fn new() -> Result<Self, RustyEcrError> {
        Ok(LogNotifier {
            templates: BTreeMap::new(),
            deadline: String::new(),
            mailbox: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$")?,
            sent: Vec::new(),
        })
    }

    pub fn with_template(mut self, group: &str, template: GroupTemplate) -> Self {
        self.templates.insert(group.to_owned(), template);
        self
    }

    pub fn with_deadline(mut self, deadline: &str) -> Self {
        self.deadline = deadline.to_owned();
        self
    }

    /// Messages delivered so far
    pub fn sent(&self) -> &[Message] {
        &self.sent
    }

    fn is_deliverable(&self, recipient: &Recipient) -> bool {
        !recipient.group.is_empty()
            && recipient.group.chars().count() <= MAX_FIELD_LENGTH
            && recipient.email.chars().count() <= MAX_FIELD_LENGTH
            && self.mailbox.is_match(&recipient.email)
    }

    pub fn compose(&self, recipient: &Recipient, id: &str) -> Message {
        let (subject, body, link) = match self.templates.get(&recipient.group) {
            Some(template) => (
                template.subject.clone(),
                template.body.clone(),
                template
                    .link
                    .as_deref()
                    .map_or_else(|| "[no link]".to_owned(), |link| link.replace("{id}", id)),
            ),
            None => (
                "Change Request No. {id} notification".to_owned(),
                format!("Group '{}' has no template", recipient.group),
                "[no link]".to_owned(),
            ),
        };
        let fill = |text: &str| {
            text.replace("{id}", id)
                .replace("{link}", &link)
                .replace("{deadline}", &self.deadline)
        };
        Message {
            to: recipient.email.clone(),
            subject: fill(&subject),
            body: fill(&body),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, recipients: &RecipientGroups, model: &FormModel) -> Vec<Recipient> {
        let id = model.identifier();
        let mut failed = Vec::new();
        for recipient in recipients.recipients() {
            if !self.is_deliverable(recipient) {
                log::warn!("Cannot notify '{}' of group '{}'", recipient.email, recipient.group);
                failed.push(recipient.clone());
                continue;
            }
            let message = self.compose(recipient, id);
            log::info!("Notified {} about {} '{}': {}", message.to, model.form(), id, message.subject);
            log::debug!("{}", message.body);
            self.sent.push(message);
        }
        if !failed.is_empty() {
            let addresses: Vec<&str> = failed.iter().map(|r| r.email.as_str()).collect();
            log::info!("Messages for {} not delivered, address does not exist", addresses.join(", "));
        }
        failed
    }
}
