//! `retest plan`: dry run of test selection.
//!
//! Opens the cache read-only, reconciles it against the current build
//! output, discovers test modules, and reports which ones would run and
//! which would be skipped. The persisted cache is left untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use retest_cache::{discover_test_modules, DropReason, MemoryHistory, TestCache};
use retest_common::ContractId;
use retest_config::RunConfig;
use serde_json::json;

use crate::project::Project;
use crate::{GlobalArgs, PlanArgs, ReportFormat};

/// The decision for one discovered module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePlan {
    /// Project-relative module path.
    pub path: PathBuf,
    /// Whether the module can be skipped.
    pub skip: bool,
}

/// Everything `plan` found out.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Contracts whose bytecode changed since the last recorded run.
    pub changed: Vec<ContractId>,
    /// Cached modules invalidated by this build, with the reason.
    pub dropped: BTreeMap<PathBuf, DropReason>,
    /// Discovered modules in path order.
    pub modules: Vec<ModulePlan>,
}

impl Plan {
    fn skipped(&self) -> usize {
        self.modules.iter().filter(|m| m.skip).count()
    }
}

/// Runs the `retest plan` command.
pub fn run(args: &PlanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let plan = build_plan(&project, project.run_config(args.coverage))?;

    match args.format {
        ReportFormat::Text => {
            for module in &plan.modules {
                let action = if module.skip { "skip" } else { "run " };
                println!("{action} {}", module.path.display());
            }
            if !global.quiet {
                eprintln!(
                    "    Planned {} modules: {} to run, {} skipped ({} contracts changed)",
                    plan.modules.len(),
                    plan.modules.len() - plan.skipped(),
                    plan.skipped(),
                    plan.changed.len()
                );
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        }
    }
    Ok(0)
}

/// Computes the plan without writing the cache.
pub fn build_plan(
    project: &Project,
    run: RunConfig,
) -> Result<Plan, Box<dyn std::error::Error>> {
    let mut cache = TestCache::open(
        project.cache_options(run),
        &project.contracts(),
        MemoryHistory::new(),
    )?
    .read_only();

    let tests_dir = project.config.tests_dir(&project.root);
    let discovered = discover_test_modules(&tests_dir, &project.config.tests.pattern)?;
    let mut modules = Vec::with_capacity(discovered.len());
    for path in &discovered {
        let skip = cache.should_skip(path)?;
        modules.push(ModulePlan {
            path: project.relative(path).to_path_buf(),
            skip,
        });
    }

    let reconciliation = cache.reconciliation();
    Ok(Plan {
        changed: reconciliation.changed.iter().cloned().collect(),
        dropped: reconciliation.dropped.clone(),
        modules,
    })
}

fn plan_json(plan: &Plan) -> serde_json::Value {
    let modules: Vec<serde_json::Value> = plan
        .modules
        .iter()
        .map(|m| {
            json!({
                "path": m.path.to_string_lossy(),
                "action": if m.skip { "skip" } else { "run" },
            })
        })
        .collect();
    let dropped: serde_json::Map<String, serde_json::Value> = plan
        .dropped
        .iter()
        .map(|(path, reason)| (path.to_string_lossy().into_owned(), json!(reason.to_string())))
        .collect();
    json!({
        "changed": plan.changed.iter().map(ContractId::as_str).collect::<Vec<_>>(),
        "dropped": dropped,
        "modules": modules,
    })
}
