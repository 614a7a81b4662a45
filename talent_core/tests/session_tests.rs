use std::sync::{Arc, Mutex};
use talent_core::interaction_log::InteractionLog;
use talent_core::session::{FALLBACK_RESPONSE, NO_DATA_RESPONSE};
use talent_core::store::{SqliteTableStore, TableStore};
use talent_core::{
    ChartKind, ChatTurn, EngineConfig, NarrativeService, QueryError, RuleSet, ServiceError,
    Session, Value,
};

const TALENTS_CSV: &str = "\
Talent Name,Department,Deployment Status,Training Status,Email
talent_1,Engineering,On Bench,Completed SEER Training,t1@corp.com
talent_2,HR,Deployed in Project,Not Started,t2@corp.com
talent_3,Engineering,on bench,Training in Progress,t3@corp.com
talent_4,Sales,Rolling Off,Completed SEER Training,
talent_5,Engineering,Deployed in Project,Not Started,t5@corp.com
";

/// Records every prompt it receives and answers with a fixed reply
#[derive(Clone, Default)]
struct Recorder {
    prompts: Arc<Mutex<Vec<(String, Vec<ChatTurn>, String)>>>,
}

impl NarrativeService for Recorder {
    fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_prompt: &str,
    ) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push((
            system_prompt.to_string(),
            history.to_vec(),
            user_prompt.to_string(),
        ));
        Ok("Engineering is the largest department.".to_string())
    }
}

struct Unreachable;

impl NarrativeService for Unreachable {
    fn complete(&self, _: &str, _: &[ChatTurn], _: &str) -> Result<String, ServiceError> {
        Err(ServiceError("connection refused".to_string()))
    }
}

fn session_with(narrator: Box<dyn NarrativeService>) -> Session {
    Session::new(
        &EngineConfig::default(),
        RuleSet::default(),
        narrator,
        InteractionLog::in_memory(),
    )
}

fn loaded_session() -> Session {
    let mut session = session_with(Box::new(Recorder::default()));
    session.load_file("talents.csv", TALENTS_CSV.as_bytes()).unwrap();
    session
}

#[test]
fn test_on_bench_count_and_rows() {
    let mut session = loaded_session();
    let envelope = session.ask("How many talents are on bench?");

    assert_eq!(envelope.intent.as_deref(), Some("on_bench"));
    assert_eq!(envelope.narrative_text.as_deref(), Some("2 rows match on bench"));
    let table = envelope.result_table.unwrap();
    let names: Vec<String> = table
        .column("talent_name")
        .unwrap()
        .values
        .iter()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(names, vec!["talent_1", "talent_3"]);
}

#[test]
fn test_synonym_matches_same_rule() {
    let mut session = loaded_session();
    let envelope = session.ask("who is not deployed right now");
    assert_eq!(envelope.intent.as_deref(), Some("on_bench"));
}

#[test]
fn test_entity_department_lookup() {
    let mut session = loaded_session();
    let envelope = session.ask("What department is talent_3 in?");
    assert_eq!(envelope.intent.as_deref(), Some("entity_department"));
    assert_eq!(
        envelope.narrative_text.as_deref(),
        Some("Talent_3 is in the Engineering department.")
    );
}

#[test]
fn test_entity_joined_to_field_by_underscore() {
    let mut session = loaded_session();
    let envelope = session.ask("talent_3_department");
    assert_eq!(envelope.intent.as_deref(), Some("entity_department"));
    assert_eq!(
        envelope.narrative_text.as_deref(),
        Some("Talent_3 is in the Engineering department.")
    );
}

#[test]
fn test_entity_not_found_names_entity() {
    let mut session = loaded_session();
    let envelope = session.ask("department of talent_42");
    let text = envelope.narrative_text.unwrap();
    assert!(text.contains("talent_42"));
    assert!(text.contains("not found"));
}

#[test]
fn test_unmatched_query_gets_fallback() {
    let mut session = loaded_session();
    let envelope = session.ask("what is the weather like");
    assert_eq!(envelope.intent, None);
    assert_eq!(envelope.narrative_text.as_deref(), Some(FALLBACK_RESPONSE));
    assert_eq!(session.log().len(), 1);
}

#[test]
fn test_pie_chart_value_counts() {
    let mut session = loaded_session();
    let envelope = session.ask("show a pie chart of department");
    let chart = envelope.chart_spec.unwrap();
    assert_eq!(chart.kind, ChartKind::Pie);
    assert_eq!(chart.column, "department");
    assert_eq!(
        chart.value_counts,
        vec![
            ("Engineering".to_string(), 3),
            ("HR".to_string(), 1),
            ("Sales".to_string(), 1)
        ]
    );
}

#[test]
fn test_fuzzy_chart_column() {
    let mut session = loaded_session();
    let envelope = session.ask("graph the training status");
    let chart = envelope.chart_spec.unwrap();
    assert_eq!(chart.column, "training_status");
    assert_eq!(chart.value_counts.len(), 3);
}

#[test]
fn test_chart_with_unknown_column() {
    let mut session = loaded_session();
    let envelope = session.ask("pie of salaries");
    assert!(envelope.chart_spec.is_none());
    assert!(envelope.narrative_text.unwrap().contains("column"));
}

#[test]
fn test_narrative_gets_context_and_history() {
    let recorder = Recorder::default();
    let mut session = session_with(Box::new(recorder.clone()));
    session.load_file("talents.csv", TALENTS_CSV.as_bytes()).unwrap();

    session.ask("who is on bench");
    let envelope = session.ask("summarize the team");
    assert_eq!(
        envelope.narrative_text.as_deref(),
        Some("Engineering is the largest department.")
    );

    let prompts = recorder.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let (system, history, user) = &prompts[0];
    assert!(system.contains("Table with 5 rows and 5 columns"));
    assert!(system.contains("- department (categorical): Engineering: 3, HR: 1, Sales: 1"));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "who is on bench");
    assert_eq!(user, "summarize the team");
}

#[test]
fn test_unreachable_service_is_reported_and_logged() {
    let mut session = session_with(Box::new(Unreachable));
    session.load_file("talents.csv", TALENTS_CSV.as_bytes()).unwrap();
    let before = session.table().unwrap();

    let envelope = session.ask("give me an overview");
    let text = envelope.narrative_text.unwrap();
    assert!(!text.is_empty());
    assert!(text.contains("connection refused"));

    let records = session.log().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].query_text, "give me an overview");
    assert_eq!(records[0].response_text, text);
    assert_eq!(*session.table().unwrap(), *before);
}

#[test]
fn test_dashboard_metrics() {
    let session = loaded_session();
    let metrics: Vec<(String, usize)> = session
        .dashboard()
        .into_iter()
        .map(|m| (m.rule_id, m.count))
        .collect();
    assert_eq!(
        metrics,
        vec![
            ("on_bench".to_string(), 2),
            ("deployed".to_string(), 2),
            ("rolling_off".to_string(), 1),
            ("completed_seer".to_string(), 2),
            ("not_started".to_string(), 2),
            ("training_in_progress".to_string(), 1),
        ]
    );
}

#[test]
fn test_dashboard_agrees_with_filter_results() {
    let mut session = loaded_session();
    for metric in session.dashboard() {
        let rule = session.rules().get(&metric.rule_id).unwrap().clone();
        let query = rule.trigger_phrases[0].clone();
        let envelope = session.ask(&query);
        assert_eq!(envelope.intent.as_deref(), Some(rule.id.as_str()));
        assert_eq!(envelope.result_table.unwrap().row_count(), metric.count);
    }
}

#[test]
fn test_blank_headers_load() {
    let mut session = session_with(Box::new(Recorder::default()));
    let csv = "Talent Name,Department,,\ntalent_3,Engineering,,\n";
    session.load_file("t.csv", csv.as_bytes()).unwrap();

    let table = session.table().unwrap();
    assert_eq!(
        table.column_names(),
        vec!["talent_name", "department", "unnamed_2", "unnamed_3"]
    );
    let envelope = session.ask("talent_3 department");
    assert!(envelope.narrative_text.unwrap().contains("Engineering"));
}

#[test]
fn test_failed_load_keeps_previous_table() {
    let mut session = loaded_session();
    let before = session.table().unwrap();

    let err = session.load_file("broken.xlsx", b"definitely not a workbook");
    assert!(matches!(err, Err(QueryError::Load(_))));
    assert!(Arc::ptr_eq(&before, &session.table().unwrap()));
}

#[test]
fn test_schema_conflict_rejected() {
    let mut session = loaded_session();
    let csv = "Talent Name,talent_name\na,b\n";
    let err = session.load_file("dupes.csv", csv.as_bytes()).unwrap_err();
    match err {
        QueryError::SchemaConflict { normalized, .. } => assert_eq!(normalized, "talent_name"),
        other => panic!("Expected SchemaConflict, got {:?}", other),
    }
    assert_eq!(session.table().unwrap().row_count(), 5);
}

#[test]
fn test_document_session_uses_narrative() {
    let recorder = Recorder::default();
    let mut session = session_with(Box::new(recorder.clone()));
    session
        .load_file("resume.txt", b"Jane has ten years of Rust experience.")
        .unwrap();
    assert!(session.table().is_none());
    assert!(session.document().unwrap().starts_with("Jane"));

    // Filter phrases have nothing to filter in a document session
    session.ask("who is on bench");

    let prompts = recorder.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].0.contains("Jane has ten years of Rust experience."));
}

#[test]
fn test_ask_without_data() {
    let mut session = session_with(Box::new(Recorder::default()));
    let envelope = session.ask("who is on bench");
    assert_eq!(envelope.narrative_text.as_deref(), Some(NO_DATA_RESPONSE));
}

#[test]
fn test_store_round_trip_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("talent.db");

    let mut first = session_with(Box::new(Recorder::default()))
        .with_store(Box::new(SqliteTableStore::open(&path).unwrap()));
    first.load_file("talents.csv", TALENTS_CSV.as_bytes()).unwrap();
    assert!(SqliteTableStore::open(&path).unwrap().exists().unwrap());

    let mut second = session_with(Box::new(Recorder::default()))
        .with_store(Box::new(SqliteTableStore::open(&path).unwrap()));
    assert!(second.restore_from_store().unwrap());

    let table = second.table().unwrap();
    assert_eq!(table.row_count(), 5);
    assert_eq!(table.cell(3, "email"), Some(&Value::Missing));
    assert_eq!(second.ask("who is on bench").result_table.unwrap().row_count(), 2);
}

#[test]
fn test_interaction_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chat_log.txt");
    let mut session = Session::new(
        &EngineConfig::default(),
        RuleSet::default(),
        Box::new(Recorder::default()),
        InteractionLog::with_file(&path),
    );
    session.load_file("talents.csv", TALENTS_CSV.as_bytes()).unwrap();
    session.ask("who is on bench");
    session.ask("what is the weather");

    let log = session.chat_log().unwrap();
    assert!(log.contains("Q: who is on bench\nA: 2 rows match on bench\n\n"));
    assert!(log.contains(&format!("Q: what is the weather\nA: {}\n\n", FALLBACK_RESPONSE)));
}
