//! Built-in workflow templates

use crate::model::{
    AgentKind, Complexity, QualityGate, QualityGateKind, TemplateCategory, TemplateStep,
    WorkflowTemplate,
};
use chrono::Utc;

/// IDs of the templates every project can use
pub const BUILTIN_TEMPLATE_IDS: [&str; 4] =
    ["add-api-endpoint", "fix-bug", "add-feature", "refactor-component"];

fn step(
    id: &str,
    title: &str,
    description: &str,
    agent_kind: AgentKind,
    complexity: Complexity,
    dependencies: &[&str],
) -> TemplateStep {
    TemplateStep {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        agent_kind,
        estimated_complexity: complexity,
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        quality_gate: None,
    }
}

fn gate(kind: QualityGateKind, description: &str, required: bool) -> Option<QualityGate> {
    Some(QualityGate {
        kind,
        description: description.to_string(),
        required,
    })
}

fn template(
    id: &str,
    name: &str,
    description: &str,
    category: TemplateCategory,
    steps: Vec<TemplateStep>,
) -> WorkflowTemplate {
    let now = Utc::now();
    WorkflowTemplate {
        id: id.to_string(),
        project_id: None,
        name: name.to_string(),
        description: description.to_string(),
        category,
        steps,
        is_builtin: true,
        created_at: now,
        updated_at: now,
    }
}

/// The four built-in templates
#[must_use]
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![add_api_endpoint(), fix_bug(), add_feature(), refactor_component()]
}

fn add_api_endpoint() -> WorkflowTemplate {
    template(
        "add-api-endpoint",
        "Add API Endpoint",
        "Design, implement and test a new API endpoint following existing conventions.",
        TemplateCategory::Development,
        vec![
            step(
                "analyze-routes",
                "Analyze existing routes",
                "Find how current endpoints are declared, validated and wired up. \
                 Report the files and patterns the new endpoint should follow.",
                AgentKind::CodeAnalyst,
                Complexity::Low,
                &[],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::BuildPass, "Endpoint code is written", true),
                ..step(
                    "implement-endpoint",
                    "Implement the endpoint",
                    "Add the route, handler and request validation using the patterns found earlier.",
                    AgentKind::Implementer,
                    Complexity::Medium,
                    &["analyze-routes"],
                )
            },
            step(
                "write-tests",
                "Write endpoint tests",
                "Add tests covering the success path and the main error responses.",
                AgentKind::Implementer,
                Complexity::Medium,
                &["implement-endpoint"],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::TestPass, "Test suite passes", true),
                ..step(
                    "run-tests",
                    "Run tests",
                    "Run the test suite and report the results.",
                    AgentKind::TestRunner,
                    Complexity::Low,
                    &["write-tests"],
                )
            },
        ],
    )
}

fn fix_bug() -> WorkflowTemplate {
    template(
        "fix-bug",
        "Fix Bug",
        "Investigate a reported bug, fix the root cause and verify the fix.",
        TemplateCategory::Maintenance,
        vec![
            step(
                "investigate",
                "Investigate the bug",
                "Trace the code paths involved and identify the most likely root cause.",
                AgentKind::CodeAnalyst,
                Complexity::Medium,
                &[],
            ),
            step(
                "research-known-issues",
                "Research known issues",
                "Look for known issues or upstream reports matching the symptoms.",
                AgentKind::Researcher,
                Complexity::Low,
                &[],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::Custom, "Fix touches the faulty code", false),
                ..step(
                    "apply-fix",
                    "Apply the fix",
                    "Fix the root cause with the smallest change that resolves it, \
                     and add a regression test.",
                    AgentKind::Implementer,
                    Complexity::Medium,
                    &["investigate", "research-known-issues"],
                )
            },
            TemplateStep {
                quality_gate: gate(QualityGateKind::TestPass, "Regression test passes", true),
                ..step(
                    "verify-fix",
                    "Verify the fix",
                    "Run the tests, including the new regression test, and report the results.",
                    AgentKind::TestRunner,
                    Complexity::Low,
                    &["apply-fix"],
                )
            },
        ],
    )
}

fn add_feature() -> WorkflowTemplate {
    template(
        "add-feature",
        "Add Feature",
        "Plan, build and test a new feature.",
        TemplateCategory::Development,
        vec![
            step(
                "analyze-codebase",
                "Analyze the codebase",
                "Identify the modules the feature touches and the conventions they follow.",
                AgentKind::CodeAnalyst,
                Complexity::Medium,
                &[],
            ),
            step(
                "research-approach",
                "Research the approach",
                "Research libraries or techniques relevant to the feature and recommend one.",
                AgentKind::Researcher,
                Complexity::Low,
                &[],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::BuildPass, "Feature code is written", true),
                ..step(
                    "implement-feature",
                    "Implement the feature",
                    "Build the feature following the analysis and the recommended approach.",
                    AgentKind::Implementer,
                    Complexity::High,
                    &["analyze-codebase", "research-approach"],
                )
            },
            step(
                "write-tests",
                "Write tests",
                "Add tests covering the new behavior.",
                AgentKind::Implementer,
                Complexity::Medium,
                &["implement-feature"],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::TestPass, "Test suite passes", true),
                ..step(
                    "run-tests",
                    "Run tests",
                    "Run the test suite and report the results.",
                    AgentKind::TestRunner,
                    Complexity::Low,
                    &["write-tests"],
                )
            },
        ],
    )
}

fn refactor_component() -> WorkflowTemplate {
    template(
        "refactor-component",
        "Refactor Component",
        "Restructure a component without changing its behavior.",
        TemplateCategory::Maintenance,
        vec![
            step(
                "analyze-component",
                "Analyze the component",
                "Map the component's responsibilities, callers and problem areas.",
                AgentKind::CodeAnalyst,
                Complexity::Medium,
                &[],
            ),
            TemplateStep {
                quality_gate: gate(QualityGateKind::TestPass, "Baseline tests recorded", false),
                ..step(
                    "baseline-tests",
                    "Record baseline tests",
                    "Run the existing tests so behavior can be compared after the refactor.",
                    AgentKind::TestRunner,
                    Complexity::Low,
                    &[],
                )
            },
            TemplateStep {
                quality_gate: gate(QualityGateKind::LintPass, "Refactor is lint clean", false),
                ..step(
                    "refactor",
                    "Refactor",
                    "Restructure the component as planned, keeping its public behavior intact.",
                    AgentKind::Implementer,
                    Complexity::High,
                    &["analyze-component", "baseline-tests"],
                )
            },
            TemplateStep {
                quality_gate: gate(QualityGateKind::TestPass, "Behavior unchanged", true),
                ..step(
                    "verify-behavior",
                    "Verify behavior",
                    "Run the tests again and compare against the baseline.",
                    AgentKind::TestRunner,
                    Complexity::Low,
                    &["refactor"],
                )
            },
        ],
    )
}
