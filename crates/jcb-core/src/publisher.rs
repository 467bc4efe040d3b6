use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info};

use crate::{
    domain::{ConversationId, IssueKey},
    errors::Error,
    formatting::{escape_html, markdown_to_html, truncate},
    issue::Issue,
    messaging::{port::ChatPort, types::TextItem},
    report::ReportBuckets,
    Result,
};

const SUBJECT_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 400;
const REPORT_SUMMARY_MAX_CHARS: usize = 78;

/// Public and internal Jira hosts used for `/browse/<key>` links.
#[derive(Clone, Debug)]
pub struct IssueLinks {
    pub public_domain: String,
    pub internal_domain: String,
}

impl IssueLinks {
    fn browse(domain: &str, key: &IssueKey) -> String {
        format!("{domain}/browse/{}", escape_html(&key.0))
    }

    pub fn public(&self, key: &IssueKey) -> String {
        Self::browse(&self.public_domain, key)
    }

    pub fn internal(&self, key: &IssueKey) -> String {
        Self::browse(&self.internal_domain, key)
    }
}

/// Turns issues and digests into Circuit messages.
pub struct Publisher {
    chat: Arc<dyn ChatPort>,
    conversation: ConversationId,
    links: IssueLinks,
    report_name: String,
}

impl Publisher {
    pub fn new(
        chat: Arc<dyn ChatPort>,
        conversation: ConversationId,
        links: IssueLinks,
        report_name: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            conversation,
            links,
            report_name: report_name.into(),
        }
    }

    /// Post one message per issue, all in flight at once.
    ///
    /// Every send is awaited; if any failed, the first failure is returned.
    /// Sends that already succeeded stay posted.
    pub async fn publish_new_issues(&self, issues: &[Issue]) -> Result<()> {
        let sends = issues.iter().map(|issue| {
            info!(issue = %issue.to_summary(), priority = %issue.priority, "posting issue");
            let item = TextItem::rich(
                truncate(&issue.summary, SUBJECT_MAX_CHARS),
                self.issue_content(issue),
            );
            async move {
                let res = self.chat.add_text_item(&self.conversation, item).await;
                (issue, res)
            }
        });

        let mut first_failure = None;
        for (issue, res) in join_all(sends).await {
            if let Err(e) = res {
                error!(key = %issue.key, error = %e, "failed to post issue");
                first_failure.get_or_insert_with(|| format!("{}: {e}", issue.key));
            }
        }

        match first_failure {
            Some(msg) => Err(Error::Publish(msg)),
            None => Ok(()),
        }
    }

    /// Post the whole digest as a single message.
    pub async fn publish_report(&self, report: &ReportBuckets) -> Result<()> {
        info!(
            p0 = report.p0.len(),
            p1 = report.p1.len(),
            "posting report"
        );

        let item = TextItem::rich(self.report_name.clone(), self.report_content(report));
        self.chat
            .add_text_item(&self.conversation, item)
            .await
            .map_err(|e| Error::Publish(format!("report: {e}")))?;
        Ok(())
    }

    /// Rich-text body of a new-issue message.
    pub fn issue_content(&self, issue: &Issue) -> String {
        let description = truncate(&markdown_to_html(&issue.description), DESCRIPTION_MAX_CHARS);
        let labels = issue
            .labels
            .iter()
            .map(|l| escape_html(l))
            .collect::<Vec<_>>()
            .join(", ");
        let key = escape_html(&issue.key.0);

        format!(
            "Version: <b>{version}</b><br>\
             Priority: <b>{priority}</b><br>\
             Reporter: <b>{reporter}</b><br>\
             Assignee: <b>{assignee}</b><br>\
             Labels: <b>{labels}</b><br>\
             <a href=\"{internal}\">{key}</a>&nbsp;(<a href=\"{public}\">public url</a>)<br>\
             ----------<br>\
             {description}",
            version = escape_html(&issue.affected_version),
            priority = escape_html(issue.priority.as_str()),
            reporter = escape_html(issue.reporter.as_deref().unwrap_or_default()),
            assignee = escape_html(issue.assignee.as_deref().unwrap_or_default()),
            internal = self.links.internal(&issue.key),
            public = self.links.public(&issue.key),
        )
    }

    /// Rich-text body of the digest message.
    ///
    /// A version header precedes the first P0 and every P0 whose version
    /// differs from the one before it.
    pub fn report_content(&self, report: &ReportBuckets) -> String {
        let mut content = format!(
            "<b>{} P0's</b> and <b>{} P1's</b><br>",
            report.p0.len(),
            report.p1.len()
        );

        let mut prev: Option<&Issue> = None;
        for issue in &report.p0 {
            let version_changed =
                prev.map_or(true, |p| p.affected_version != issue.affected_version);
            if version_changed {
                if issue.affected_version.is_empty() {
                    content.push_str(
                        "<br><span class=\"rich-text-highlight\">P0 for unassigned version:</span><br>",
                    );
                } else {
                    content.push_str(&format!(
                        "<br><span class=\"rich-text-highlight\">P0 for version {}:</span><br>",
                        escape_html(&issue.affected_version)
                    ));
                }
            }
            content.push_str(&self.report_entry(issue));
            prev = Some(issue);
        }

        content.push_str("<br><span class=\"rich-text-highlight\">P1:</span><br>");
        for issue in &report.p1 {
            content.push_str(&self.report_entry(issue));
        }

        content
    }

    fn report_entry(&self, issue: &Issue) -> String {
        let owner = match &issue.assignee {
            Some(name) => format!(" with <b>{}</b>", escape_html(name)),
            None => " unassigned".to_string(),
        };
        format!(
            "<a href=\"{internal}\">{key}</a>&nbsp;(<a href=\"{public}\">p</a>){owner}<br>{summary}<br>",
            internal = self.links.internal(&issue.key),
            public = self.links.public(&issue.key),
            key = escape_html(&issue.key.0),
            summary = escape_html(&truncate(&issue.summary, REPORT_SUMMARY_MAX_CHARS)),
        )
    }
}
