use super::types::RunReport;
use crate::runner::state::{ScenarioStep, StepStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Generate JUnit XML report string from a run report.
///
/// Each step becomes a testcase; edge case probes are expanded into one
/// testcase each so CI dashboards show which payload regressed.
pub fn generate_junit_xml(report: &RunReport) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let cases = collect_cases(report);
    let tests = cases.len();
    let failures = cases
        .iter()
        .filter(|c| matches!(c.verdict, Verdict::Failed(_)))
        .count();
    let skipped = cases
        .iter()
        .filter(|c| matches!(c.verdict, Verdict::Skipped(_)))
        .count();
    let time = seconds(report.summary.duration_ms.unwrap_or(0));

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "regflow-tester-run"));
    suites_start.push_attribute(("tests", tests.to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("skipped", skipped.to_string().as_str()));
    suites_start.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", report.variant.as_str()));
    suite_start.push_attribute(("tests", tests.to_string().as_str()));
    suite_start.push_attribute(("failures", failures.to_string().as_str()));
    suite_start.push_attribute(("skipped", skipped.to_string().as_str()));
    suite_start.push_attribute(("id", report.run_id.as_str()));
    suite_start.push_attribute(("time", time.as_str()));
    suite_start.push_attribute(("timestamp", report.timestamp.as_str()));
    suite_start.push_attribute(("hostname", report.base_url.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for case in &cases {
        write_test_case(&mut writer, case)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

enum Verdict {
    Passed,
    Failed(String),
    Skipped(String),
}

struct JunitCase {
    name: String,
    classname: String,
    time: String,
    verdict: Verdict,
}

fn collect_cases(report: &RunReport) -> Vec<JunitCase> {
    let mut cases = Vec::new();
    for step in &report.steps {
        if step.probes.is_empty() {
            cases.push(step_case(step));
            continue;
        }
        for probe in &step.probes {
            let verdict = if probe.success {
                Verdict::Passed
            } else if let Some(err) = &probe.error {
                Verdict::Failed(err.clone())
            } else {
                Verdict::Failed(format!(
                    "expected message containing '{}'",
                    probe.expected_message
                ))
            };
            cases.push(JunitCase {
                name: probe.case.clone(),
                classname: format!("registration.{}", step.name),
                time: seconds(0),
                verdict,
            });
        }
    }
    cases
}

fn step_case(step: &ScenarioStep) -> JunitCase {
    let verdict = match &step.status {
        StepStatus::Passed => Verdict::Passed,
        StepStatus::Failed { error } => Verdict::Failed(error.clone()),
        StepStatus::Skipped { reason } => Verdict::Skipped(reason.clone()),
    };
    JunitCase {
        name: step.name.clone(),
        classname: "registration".to_string(),
        time: seconds(step.duration_ms.unwrap_or(0)),
        verdict,
    }
}

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, case: &JunitCase) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", case.name.as_str()));
    case_start.push_attribute(("classname", case.classname.as_str()));
    case_start.push_attribute(("time", case.time.as_str()));
    writer.write_event(Event::Start(case_start))?;

    match &case.verdict {
        Verdict::Passed => {}
        Verdict::Failed(message) => {
            let mut fail_start = BytesStart::new("failure");
            fail_start.push_attribute(("message", message.as_str()));
            fail_start.push_attribute(("type", "AssertionError"));
            writer.write_event(Event::Start(fail_start))?;
            writer.write_event(Event::Text(BytesText::new(message)))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        Verdict::Skipped(reason) => {
            let mut skip = BytesStart::new("skipped");
            skip.push_attribute(("message", reason.as_str()));
            writer.write_event(Event::Empty(skip))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `junit.xml` next to the JSON results
/// Write the JUnit file next to the results file: `<results stem>.junit.xml`
pub fn write_report(report: &RunReport, results_path: &Path) -> Result<PathBuf> {
    let xml = generate_junit_xml(report)?;
    let path = results_path.with_extension("junit.xml");
    std::fs::write(&path, xml)?;
    Ok(path)
}
