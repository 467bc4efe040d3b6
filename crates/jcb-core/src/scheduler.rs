//! Drives the two polling pipelines.
//!
//! - Bootstrapping: Circuit logon, then Jira login. Any failure is fatal.
//! - Running: the new-issue poll (every `issues_poll.interval`, fatal on
//!   failure) and the digest poll (every `report_poll.interval`, failures
//!   logged), plus one digest run at startup which is awaited and fatal.
//! - Terminated: periodic tasks are cancelled and `run()` returns the error.
//!
//! Each tick spawns its own run, so a slow cycle never delays the next tick
//! and runs of either poll may overlap.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    cache::IssueCache,
    config::Config,
    messaging::port::ChatPort,
    publisher::{IssueLinks, Publisher},
    report::build_report,
    tracker::{Credentials, QueryExecutor, SessionManager, TrackerTransport},
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Bootstrapping,
    Running,
    Terminated,
}

/// What a periodic task does with a failed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Escalation {
    /// Stop the bot; an external supervisor restarts the process.
    Fatal,
    /// Log and keep ticking.
    Logged,
}

impl Escalation {
    fn handle(self, job: Job, err: Error, fatal: &mpsc::UnboundedSender<Error>) {
        match self {
            Escalation::Fatal => {
                error!(job = job.name(), error = %err, "unrecoverable error");
                let _ = fatal.send(err);
            }
            Escalation::Logged => {
                error!(job = job.name(), error = %err, "run failed");
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Job {
    NewIssues,
    Report,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::NewIssues => "new-issues",
            Job::Report => "report",
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cfg: Arc<Config>,
    chat: Arc<dyn ChatPort>,
    session: Arc<SessionManager>,
    executor: QueryExecutor,
    cache: IssueCache,
    publisher: Publisher,
    phase: Mutex<Phase>,
}

impl Scheduler {
    pub fn new(
        cfg: Arc<Config>,
        chat: Arc<dyn ChatPort>,
        transport: Arc<dyn TrackerTransport>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            cfg.jira_domain.clone(),
            Credentials {
                username: cfg.jira_username.clone(),
                password: cfg.jira_password.clone(),
            },
        ));
        let executor = QueryExecutor::new(transport, session.clone(), cfg.jira_domain.clone());
        let publisher = Publisher::new(
            chat.clone(),
            cfg.circuit_conv_id.clone(),
            IssueLinks {
                public_domain: cfg.jira_domain.clone(),
                internal_domain: cfg.jira_internal_domain.clone(),
            },
            cfg.report_poll.name.clone(),
        );

        Self {
            inner: Arc::new(SchedulerInner {
                cfg,
                chat,
                session,
                executor,
                cache: IssueCache::new(),
                publisher,
                phase: Mutex::new(Phase::Bootstrapping),
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cache(&self) -> &IssueCache {
        &self.inner.cache
    }

    /// Run until a fatal error. Only returns `Err`.
    pub async fn run(&self) -> Result<()> {
        let res = self.run_until_fatal().await;
        self.set_phase(Phase::Terminated);
        res
    }

    /// Fetch issues, keep the unseen ones and post them.
    pub async fn poll_new_issues(&self) -> Result<usize> {
        let inner = &self.inner;
        let raw = inner.executor.search(&inner.cfg.issues_poll.query).await?;
        let fresh = inner.cache.filter_new(raw);
        inner.publisher.publish_new_issues(&fresh).await?;
        Ok(fresh.len())
    }

    /// Fetch, aggregate and post the digest.
    pub async fn run_report(&self) -> Result<()> {
        let inner = &self.inner;
        let raw = inner.executor.search(&inner.cfg.report_poll.query).await?;
        let report = build_report(raw);
        inner.publisher.publish_report(&report).await
    }

    async fn run_until_fatal(&self) -> Result<()> {
        let cfg = &self.inner.cfg;

        self.set_phase(Phase::Bootstrapping);
        let user = self
            .inner
            .chat
            .logon(&cfg.circuit_email, &cfg.circuit_password)
            .await?;
        info!(
            domain = %cfg.circuit_domain,
            email = %user.email_address,
            "logged on to circuit"
        );
        self.inner.session.login().await?;

        self.set_phase(Phase::Running);
        let cancel = CancellationToken::new();
        let _stop_on_exit = cancel.clone().drop_guard();
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();

        self.spawn_periodic(
            Job::NewIssues,
            cfg.issues_poll.interval,
            Escalation::Fatal,
            fatal_tx.clone(),
            cancel.clone(),
        );
        self.spawn_periodic(
            Job::Report,
            cfg.report_poll.interval,
            Escalation::Logged,
            fatal_tx,
            cancel.clone(),
        );

        // First digest right away; unlike later ticks its failure is fatal.
        self.run_report().await?;
        info!("Done. Press Ctrl-C to exit");

        match fatal_rx.recv().await {
            Some(err) => Err(err),
            None => Err(Error::External("periodic tasks stopped".to_string())),
        }
    }

    fn spawn_periodic(
        &self,
        job: Job,
        period: Duration,
        escalation: Escalation,
        fatal: mpsc::UnboundedSender<Error>,
        cancel: CancellationToken,
    ) {
        info!(job = job.name(), period_secs = period.as_secs(), "scheduling job");
        let Some(start) = Instant::now().checked_add(period) else {
            let err = Error::Config(format!("{} interval out of range: {period:?}", job.name()));
            Escalation::Fatal.handle(job, err, &fatal);
            return;
        };
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut tick = interval_at(start, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    let scheduler = scheduler.clone();
                    let fatal = fatal.clone();
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.run_job(job).await {
                            escalation.handle(job, e, &fatal);
                        }
                    });
                  }
                }
            }
        });
    }

    async fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::NewIssues => {
                let posted = self.poll_new_issues().await?;
                info!(posted, "new-issue poll finished");
                Ok(())
            }
            Job::Report => self.run_report().await,
        }
    }

    fn set_phase(&self, phase: Phase) {
        *self.inner.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        errors::{AuthError, QueryError, TransportError},
        messaging::port::fake::FakeChat,
        tracker::{transport::fake::ScriptedTransport, TrackerResponse},
    };

    type Reply = std::result::Result<TrackerResponse, TransportError>;

    const ISSUES_JQL: &str = r#"{"jql":"new"}"#;
    const REPORT_JQL: &str = r#"{"jql":"report"}"#;

    fn issues_query() -> Value {
        serde_json::from_str(ISSUES_JQL).unwrap()
    }

    fn report_query() -> Value {
        serde_json::from_str(REPORT_JQL).unwrap()
    }

    fn test_config() -> Arc<Config> {
        let vars = HashMap::from([
            ("JIRA_DOMAIN", "https://jira.test"),
            ("JIRA_USERNAME", "bot"),
            ("JIRA_PASSWORD", "pw"),
            ("JIRA_ISSUES_QUERY", ISSUES_JQL),
            ("JIRA_ISSUES_INTERVAL_MINUTES", "5"),
            ("JIRA_REPORT_QUERY", REPORT_JQL),
            ("JIRA_REPORT_INTERVAL_HOURS", "1"),
            ("JIRA_REPORT_NAME", "Report"),
            ("CIRCUIT_DOMAIN", "https://circuit.test"),
            ("CIRCUIT_EMAIL", "bot@test"),
            ("CIRCUIT_PASSWORD", "pw"),
            ("CIRCUIT_CLIENT_ID", "cid"),
            ("CIRCUIT_CONV_ID", "conv"),
        ]);
        Arc::new(Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap())
    }

    fn login_ok() -> Reply {
        Ok(TrackerResponse::new(
            200,
            json!({ "session": { "name": "JSESSIONID", "value": "v" } }).to_string(),
        ))
    }

    fn issues(items: &[(&str, &str)]) -> Reply {
        let issues: Vec<Value> = items
            .iter()
            .map(|(key, priority)| {
                json!({
                    "key": key,
                    "fields": {
                        "summary": format!("summary of {key}"),
                        "status": { "name": "Open" },
                        "priority": { "name": priority }
                    }
                })
            })
            .collect();
        Ok(TrackerResponse::new(200, json!({ "issues": issues }).to_string()))
    }

    fn status(code: u16) -> Reply {
        Ok(TrackerResponse::new(code, ""))
    }

    fn setup(
        transport: ScriptedTransport,
        chat: FakeChat,
    ) -> (Scheduler, Arc<ScriptedTransport>, Arc<FakeChat>) {
        let transport = Arc::new(transport);
        let chat = Arc::new(chat);
        let scheduler = Scheduler::new(test_config(), chat.clone(), transport.clone());
        (scheduler, transport, chat)
    }

    #[tokio::test(start_paused = true)]
    async fn chat_logon_failure_is_fatal_before_any_jira_call() {
        let (scheduler, transport, chat) = setup(
            ScriptedTransport::default(),
            FakeChat {
                fail_logon: true,
                ..FakeChat::default()
            },
        );

        assert!(matches!(scheduler.run().await, Err(Error::External(_))));
        assert_eq!(chat.logons(), 1);
        assert!(transport.calls().is_empty());
        assert_eq!(scheduler.phase(), Phase::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn jira_login_failure_is_fatal() {
        let (scheduler, transport, chat) = setup(
            ScriptedTransport::default().on("/session", status(401)),
            FakeChat::default(),
        );

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Rejected { status: 401 })));
        assert_eq!(transport.calls_to("/search"), 0);
        assert!(chat.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn initial_digest_failure_is_fatal() {
        let (scheduler, _transport, chat) = setup(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), status(500)),
            FakeChat::default(),
        );

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::Status { status: 500, .. })
        ));
        assert!(chat.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn posts_digest_at_startup_then_only_new_issues_each_poll() {
        let (scheduler, transport, chat) = setup(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), issues(&[("R1", "P0")]))
                .on_body("/search", issues_query(), issues(&[("X", "P1")]))
                .on_body("/search", issues_query(), issues(&[("X", "P1"), ("Y", "P1")])),
            FakeChat::default(),
        );

        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.phase(), Phase::Running);
        assert_eq!(chat.subjects(), vec!["Report".to_string()]);
        assert_eq!(transport.calls_with_body(&issues_query()), 0);

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(
            chat.subjects(),
            vec!["Report".to_string(), "summary of X".to_string()]
        );

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(
            chat.subjects(),
            vec![
                "Report".to_string(),
                "summary of X".to_string(),
                "summary of Y".to_string()
            ]
        );
        assert_eq!(scheduler.cache().len(), 2);
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_new_issue_poll_terminates() {
        let (scheduler, transport, _chat) = setup(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), issues(&[]))
                .on_body("/search", issues_query(), status(502)),
            FakeChat::default(),
        );

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::Status { status: 502, .. })
        ));
        assert_eq!(transport.calls_with_body(&issues_query()), 1);
        assert_eq!(scheduler.phase(), Phase::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_on_new_issue_poll_relogs_then_terminates() {
        let (scheduler, transport, _chat) = setup(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), issues(&[]))
                .on_body("/search", issues_query(), status(401)),
            FakeChat::default(),
        );

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::SessionRenewed)));
        assert_eq!(transport.calls_to("/session"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_periodic_digest_is_only_logged() {
        let (scheduler, transport, chat) = setup(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), issues(&[("A", "P0")]))
                .on_body("/search", report_query(), status(500))
                .on_body("/search", issues_query(), issues(&[])),
            FakeChat::default(),
        );

        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_secs(3 * 3600 + 60)).await;

        assert!(!handle.is_finished());
        assert_eq!(scheduler.phase(), Phase::Running);
        assert_eq!(transport.calls_with_body(&report_query()), 4);
        assert_eq!(chat.subjects(), vec!["Report".to_string()]);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_interval_terminates_instead_of_stalling() {
        let mut cfg = (*test_config()).clone();
        cfg.issues_poll.interval = Duration::MAX;
        let transport = Arc::new(
            ScriptedTransport::default()
                .on("/session", login_ok())
                .on_body("/search", report_query(), issues(&[])),
        );
        let scheduler = Scheduler::new(Arc::new(cfg), Arc::new(FakeChat::default()), transport.clone());

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("new-issues")));
        assert_eq!(transport.calls_with_body(&issues_query()), 0);
        assert_eq!(scheduler.phase(), Phase::Terminated);
    }
}
