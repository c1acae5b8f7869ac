//! Top-level collection runs: submit, poll, enrich, assemble, save.

use std::time::Duration;

use serde_json::{json, Value};

use plotline_common::PlotlineError;
use plotline_pipeline::assemble::read_output;
use plotline_pipeline::manifest::{ManifestEntry, MANIFEST_FILE};
use plotline_pipeline::simulate::SimulatedAnalytics;
use plotline_pipeline::testing::{
    ai_failure, body_query, complete_narratives, complete_personas, narrative_json, pending,
    persona_json, MockAnalytics,
};
use plotline_pipeline::{default_query, Pipeline, PollPolicy, RunSettings};
use starscape_client::{Endpoint, SummaryStats};

fn settings(limit: usize) -> RunSettings {
    RunSettings {
        poll: PollPolicy {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            early_complete_min: None,
        },
        narrative_limit: limit,
        enrichment_delay: Duration::from_secs(1),
        dataset_id: None,
        volume_window_days: None,
    }
}

fn top_stats() -> SummaryStats {
    SummaryStats {
        total_count: Some(json!(48213)),
        positivity: Some(json!(0.42)),
        min_timestamp: Some(json!("2025-02-01T00:00:00Z")),
        max_timestamp: Some(json!("2025-02-21T23:59:59Z")),
    }
}

/// Top-level job returning the given narratives; each keyword gets working sub-jobs.
fn scripted(top_narratives: Vec<Value>, keywords: &[&str]) -> MockAnalytics {
    let mut api = MockAnalytics::new().on_job_with_stats(
        Endpoint::Summary,
        &default_query(),
        "top",
        top_stats(),
        vec![pending(), complete_narratives(top_narratives)],
    );
    for keyword in keywords {
        let query = body_query(keyword);
        api = api
            .on_job(
                Endpoint::Summary,
                &query,
                &format!("nested-{keyword}"),
                vec![complete_narratives(vec![narrative_json("child", None)])],
            )
            .on_job(
                Endpoint::Personas,
                &query,
                &format!("personas-{keyword}"),
                vec![complete_personas(vec![persona_json("Readers", 3, 2, 1)])],
            );
    }
    api
}

#[tokio::test(start_paused = true)]
async fn collect_merges_summary_and_enriched_narratives() {
    let api = scripted(
        vec![
            narrative_json("Tariffs", Some(body_query("tariff"))),
            narrative_json("Opinion pieces", None),
            narrative_json("Rent", Some(body_query("rent"))),
            narrative_json("Misc", None),
        ],
        &["tariff", "rent"],
    );

    let collected = Pipeline::new(&api, settings(5))
        .collect(&default_query())
        .await
        .unwrap();
    let output = &collected.document["output"];

    assert_eq!(output["total_count"], 48213);
    assert_eq!(output["positivity"], 0.42);
    assert_eq!(output["min_timestamp"], "2025-02-01T00:00:00Z");
    assert_eq!(output["max_timestamp"], "2025-02-21T23:59:59Z");

    let narratives = output["narratives"].as_array().unwrap();
    assert_eq!(narratives.len(), 4);
    assert_eq!(narratives[0]["personas"][0]["color"], "blue");
    assert_eq!(
        narratives[0]["personas"][0]["gender"],
        json!({ "m": 3, "f": 2, "n": 1 })
    );
    assert_eq!(narratives[0]["nested_narratives"][0]["title"], "child");
    assert!(narratives[1].get("personas").is_none());
    assert!(narratives[1].get("nested_narratives").is_none());
    assert!(!collected.timed_out);
}

#[tokio::test(start_paused = true)]
async fn malformed_records_do_not_stop_the_run() {
    let numeric_title = json!({ "title": 42, "summary": "numeric title" });
    let odd_shapes = json!({
        "title": "Odd shapes",
        "query": body_query("odd"),
        "nested_narratives": 7,
        "personas": "pending"
    });
    let api = scripted(
        vec![
            narrative_json("Tariffs", Some(body_query("tariff"))),
            numeric_title.clone(),
            json!("not a record"),
            odd_shapes,
        ],
        &["tariff", "odd"],
    );

    let collected = Pipeline::new(&api, settings(5))
        .collect(&default_query())
        .await
        .unwrap();

    let narratives = collected.document["output"]["narratives"].as_array().unwrap();
    assert_eq!(narratives.len(), 4);
    assert_eq!(narratives[0]["personas"][0]["title"], "Readers");
    assert_eq!(narratives[1], numeric_title);
    assert_eq!(narratives[2], "not a record");
    assert_eq!(narratives[3]["nested_narratives"][0]["title"], "child");
    assert_eq!(narratives[3]["personas"][0]["color"], "blue");
    assert_eq!(collected.report.without_query, 2);
}

#[tokio::test(start_paused = true)]
async fn only_the_first_narratives_are_kept() {
    let top: Vec<Value> = (0..8)
        .map(|i| narrative_json(&format!("Narrative {i}"), None))
        .collect();
    let api = scripted(top, &[]);

    let collected = Pipeline::new(&api, settings(5))
        .collect(&default_query())
        .await
        .unwrap();

    let narratives = collected.document["output"]["narratives"].as_array().unwrap();
    assert_eq!(narratives.len(), 5);
    assert_eq!(narratives[4]["title"], "Narrative 4");
    assert_eq!(api.submit_count(Endpoint::Personas), 0);
}

#[tokio::test(start_paused = true)]
async fn top_level_submission_failure_aborts() {
    let api = MockAnalytics::new().reject_submit(Endpoint::Summary, &default_query(), 401);

    let err = Pipeline::new(&api, settings(5))
        .collect(&default_query())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("401"));
}

#[tokio::test(start_paused = true)]
async fn top_level_ai_failure_aborts() {
    let api = MockAnalytics::new().on_job(
        Endpoint::Summary,
        &default_query(),
        "top",
        vec![ai_failure()],
    );

    let err = Pipeline::new(&api, settings(5))
        .collect(&default_query())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PlotlineError>(),
        Some(PlotlineError::TopLevelAiFailure(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn top_level_timeout_continues_with_partial_results() {
    let partial = json!({
        "complete": false,
        "output": { "narratives": [narrative_json("Early", Some(body_query("early")))] }
    });
    let api = MockAnalytics::new()
        .on_job(Endpoint::Summary, &default_query(), "top", vec![partial])
        .on_job(
            Endpoint::Summary,
            &body_query("early"),
            "nested-early",
            vec![complete_narratives(vec![])],
        )
        .on_job(
            Endpoint::Personas,
            &body_query("early"),
            "personas-early",
            vec![complete_personas(vec![])],
        );

    let mut run = settings(5);
    run.poll.timeout = Duration::from_secs(60);
    let collected = Pipeline::new(&api, run)
        .collect(&default_query())
        .await
        .unwrap();

    assert!(collected.timed_out);
    assert_eq!(collected.document["output"]["narratives"][0]["title"], "Early");
    assert_eq!(collected.report.nested_fetched, 1);
}

#[tokio::test(start_paused = true)]
async fn run_writes_document_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("plotline_data");
    let api = scripted(
        vec![narrative_json("Tariffs", Some(body_query("tariff")))],
        &["tariff"],
    );

    let summary = Pipeline::new(&api, settings(5))
        .run(&default_query(), &output_dir, "news_politics")
        .await
        .unwrap();

    assert_eq!(summary.output_path, output_dir.join("news_politics.json"));
    let saved = read_output(&summary.output_path).unwrap();
    let reparsed: Value =
        serde_json::from_str(&serde_json::to_string_pretty(&saved).unwrap()).unwrap();
    assert_eq!(saved, reparsed);
    assert_eq!(saved["output"]["narratives"][0]["personas"][0]["title"], "Readers");

    assert_eq!(summary.manifest_path, output_dir.join(MANIFEST_FILE));
    let manifest: Vec<ManifestEntry> =
        serde_json::from_str(&std::fs::read_to_string(&summary.manifest_path).unwrap()).unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].label, "news_politics");
}

#[tokio::test(start_paused = true)]
async fn simulated_run_produces_a_full_document() {
    let dir = tempfile::tempdir().unwrap();
    let api = SimulatedAnalytics::new(5, 3);

    let summary = Pipeline::new(&api, settings(5))
        .run(&default_query(), dir.path(), "simulated")
        .await
        .unwrap();

    let saved = read_output(&summary.output_path).unwrap();
    let narratives = saved["output"]["narratives"].as_array().unwrap();
    assert_eq!(narratives.len(), 5);
    for narrative in narratives {
        assert_eq!(narrative["nested_narratives"].as_array().unwrap().len(), 5);
        assert_eq!(narrative["personas"].as_array().unwrap().len(), 3);
    }
    assert!(saved["output"]["total_count"].is_number());
    assert_eq!(summary.report.personas_degraded, 0);
}
