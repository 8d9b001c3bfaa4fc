//! Integration tests for reply classification and processing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use quire_core::campaign::{NewTarget, TargetUpdate};
use quire_core::reply::{Intent, MailMessage, MailSource, Sentiment, PROCESSED_REPLIES_FILE};
use quire_core::{
    classify, CampaignStore, JsonMap, NewProspect, ProspectStore, QuireResult, ReplyProcessor,
    ReplyRequest, Stage, TargetsDocument,
};

/// Serves a fixed inbox and records the queries it receives.
struct Inbox {
    messages: Vec<MailMessage>,
    bodies: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
}

impl Inbox {
    fn new(messages: Vec<MailMessage>, bodies: &[(&str, &str)]) -> Self {
        Self {
            messages,
            bodies: bodies
                .iter()
                .map(|(id, body)| (id.to_string(), body.to_string()))
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MailSource for Inbox {
    async fn search(&self, query: &str, _max_results: usize) -> QuireResult<Vec<MailMessage>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.messages.clone())
    }

    async fn read_body(&self, id: &str) -> QuireResult<Option<String>> {
        Ok(self.bodies.get(id).cloned())
    }
}

fn message(id: &str, from: &str, snippet: &str) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        from: from.to_string(),
        subject: "Re: Quick question".to_string(),
        snippet: snippet.to_string(),
        body: None,
    }
}

#[test]
fn test_classifier_overlapping_keywords() {
    let analysis = classify("Not interested, please unsubscribe");
    assert_eq!(analysis.intent, Intent::NotInterested);
    assert_eq!(analysis.sentiment, Sentiment::Negative);
    assert_eq!(analysis.suggested_stage, Some(Stage::Lost));

    let analysis = classify("I'm out of office until Monday");
    assert_eq!(analysis.intent, Intent::OutOfOffice);
    assert_eq!(analysis.suggested_stage, None);

    let analysis = classify("Thanks");
    assert_eq!(analysis.intent, Intent::Unknown);
    assert!(analysis.keywords_matched.is_empty());
}

/// Two campaigns, one per targets schema, each with one contact.
fn seeded(dir: &std::path::Path) -> CampaignStore {
    let campaigns =
        CampaignStore::new(dir.join("campaigns"), ProspectStore::new(dir.join("prospects")));

    campaigns.create("Spring", &JsonMap::new()).unwrap();
    let jane = campaigns
        .prospects()
        .create(NewProspect::new("Jane Doe", "jane@acme.com"))
        .unwrap();
    campaigns.add_target_by_prospect("Spring", &jane.slug).unwrap();

    campaigns.create("Legacy", &JsonMap::new()).unwrap();
    let bob = campaigns
        .add_target(
            "Legacy",
            NewTarget {
                name: Some("Bob Ray".to_string()),
                email: Some("bob@corp.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    campaigns
        .update_target(
            "Legacy",
            &bob.id,
            &TargetUpdate {
                stage: Some(Stage::Contacted),
                ..Default::default()
            },
        )
        .unwrap();

    campaigns
}

fn inbox() -> Inbox {
    Inbox::new(
        vec![
            message("m1", "Jane Doe <Jane@Acme.com>", "Sounds good"),
            message("m2", "bob@corp.com", "Please take me off your list."),
            message("m3", "someone@else.org", "What is this?"),
        ],
        &[("m1", "Sounds good, can we schedule a call next week?")],
    )
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let campaigns = seeded(dir.path());
    let processor = ReplyProcessor::new(campaigns.clone(), dir.path().join("state"));
    let inbox = inbox();

    let report = processor
        .process(
            &inbox,
            &ReplyRequest {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.replies_found, 3);
    assert_eq!(report.processed, 2);
    assert!(report.details.iter().all(|d| d.stage_updated.is_none()));
    assert!(!dir.path().join("state").join(PROCESSED_REPLIES_FILE).exists());

    let prospect = campaigns.prospects().require("jane-doe").unwrap();
    assert_eq!(prospect.frontmatter.stage, Stage::Identified);

    let queries = inbox.queries.lock().unwrap();
    assert_eq!(
        queries[0],
        "newer_than:24h (from:bob@corp.com OR from:jane@acme.com)"
    );
}

#[tokio::test]
async fn test_replies_advance_stages_once() {
    let dir = tempfile::tempdir().unwrap();
    let campaigns = seeded(dir.path());
    let processor = ReplyProcessor::new(campaigns.clone(), dir.path().join("state"));
    let inbox = inbox();

    let report = processor
        .process(&inbox, &ReplyRequest::default())
        .await
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.positive, 1);
    assert_eq!(report.unsubscribes, 1);

    // The full body was classified, not the snippet.
    let jane = report.details.iter().find(|d| d.email_id == "m1").unwrap();
    assert_eq!(jane.analysis.intent, Intent::MeetingRequest);
    assert_eq!(jane.stage_updated, Some(true));
    assert_eq!(jane.new_stage, Some(Stage::Qualified));

    // Reference target and its prospect move together.
    let TargetsDocument::Reference(spring) = campaigns.load_targets("Spring").unwrap() else {
        panic!("expected reference targets");
    };
    assert_eq!(spring.target_references[0].campaign_stage, Stage::Qualified);
    let prospect = campaigns.prospects().require("jane-doe").unwrap();
    assert_eq!(prospect.frontmatter.stage, Stage::Qualified);

    // Legacy target is closed and unsubscribed.
    let TargetsDocument::Legacy(legacy) = campaigns.load_targets("Legacy").unwrap() else {
        panic!("expected legacy targets");
    };
    assert_eq!(legacy.targets[0].stage, Stage::Lost);
    assert!(legacy.targets[0].unsubscribed);

    // Already-processed messages are skipped on the next run.
    let again = processor
        .process(&inbox, &ReplyRequest::default())
        .await
        .unwrap();
    assert_eq!(again.replies_found, 3);
    assert_eq!(again.processed, 0);
}

#[tokio::test]
async fn test_no_targets_skips_search() {
    let dir = tempfile::tempdir().unwrap();
    let campaigns =
        CampaignStore::new(dir.path().join("campaigns"), ProspectStore::new(dir.path().join("p")));
    let processor = ReplyProcessor::new(campaigns, dir.path().join("state"));
    let inbox = inbox();

    let report = processor
        .process(&inbox, &ReplyRequest::default())
        .await
        .unwrap();
    assert_eq!(report.message.as_deref(), Some("No campaign targets found"));
    assert!(inbox.queries.lock().unwrap().is_empty());
}
