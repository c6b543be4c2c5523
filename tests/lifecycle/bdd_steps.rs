//! BDD step definitions for the benchmark lifecycle.

use std::fs;
use std::future::pending;

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use vastbench::lifecycle::{BenchmarkOrchestrator, RunContext, Teardown};
use vastbench::marketplace::{InstanceId, InstanceStatus};
use vastbench::offer::Offer;
use vastbench::test_support::SCRIPTED_INSTANCE_ID;
use vastbench::transport::{Transport, TransportSettings};

use super::test_helpers::{LifecycleWorld, RunResult};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a marketplace with a ready instance")]
fn ready_marketplace(lifecycle_world: LifecycleWorld) -> LifecycleWorld {
    lifecycle_world
        .market
        .push_status(InstanceStatus::Pending(String::from("loading")));
    lifecycle_world
        .market
        .push_status(InstanceStatus::Ready(String::from("running")));
    lifecycle_world
}

#[given("a marketplace whose instance reports \"{status}\"")]
fn failing_marketplace(lifecycle_world: LifecycleWorld, status: String) -> LifecycleWorld {
    lifecycle_world
        .market
        .push_status(InstanceStatus::Pending(String::from("loading")));
    lifecycle_world
        .market
        .push_status(InstanceStatus::Failed(status));
    lifecycle_world
}

#[given("a marketplace with only small-disk offers")]
fn small_disk_marketplace(lifecycle_world: LifecycleWorld) -> LifecycleWorld {
    lifecycle_world.market.set_offers(vec![Offer {
        offer_id: Some(String::from("1")),
        machine_id: Some(String::from("2")),
        price: Some(0.2),
        disk_gb: Some(16.0),
        ..Offer::default()
    }]);
    lifecycle_world
}

#[given("the payload runs and the results are read over ssh")]
fn payload_succeeds(lifecycle_world: LifecycleWorld) -> LifecycleWorld {
    // Two uploads and two remote commands.
    for _ in 0..4 {
        lifecycle_world.runner.push_success();
    }
    lifecycle_world
        .runner
        .push_output(Some(1), "", "scp: results.out.txt: No such file");
    lifecycle_world.runner.push_stdout("OK 42 tok/s");
    lifecycle_world
}

#[given("the setup script fails with exit code \"{code}\"")]
fn payload_fails(lifecycle_world: LifecycleWorld, code: i32) -> LifecycleWorld {
    for _ in 0..3 {
        lifecycle_world.runner.push_success();
    }
    lifecycle_world.runner.push_failure(code);
    lifecycle_world
}

#[given("the payload file \"{name}\" is missing")]
fn payload_file_missing(lifecycle_world: LifecycleWorld, name: String) -> LifecycleWorld {
    fs::remove_file(lifecycle_world.root.join(&name))
        .unwrap_or_else(|err| panic!("remove {name}: {err}"));
    lifecycle_world
}

#[given("termination fails")]
fn termination_fails(lifecycle_world: LifecycleWorld) -> LifecycleWorld {
    lifecycle_world.market.fail_on_terminate();
    lifecycle_world
}

#[given("cleanup is disabled")]
fn cleanup_disabled(mut lifecycle_world: LifecycleWorld) -> LifecycleWorld {
    lifecycle_world.cleanup = false;
    lifecycle_world
}

#[given("an existing instance \"{id}\"")]
fn existing_instance(mut lifecycle_world: LifecycleWorld, id: String) -> LifecycleWorld {
    lifecycle_world.existing_instance = Some(InstanceId::new(id));
    lifecycle_world
}

#[when("I run the benchmark")]
fn run_benchmark(lifecycle_world: LifecycleWorld) -> Result<LifecycleWorld, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = BenchmarkOrchestrator::new(
        lifecycle_world.market.clone(),
        Transport::new(TransportSettings::default(), lifecycle_world.runner.clone()),
        LifecycleWorld::poller(),
    );
    let plan = lifecycle_world.plan();
    let mut context = RunContext::new();

    let result = runtime.block_on(orchestrator.run(&plan, &mut context, pending()));
    let outcome = match result {
        Ok(report) => RunResult::Success(report.results.text().map(str::to_owned)),
        Err(err) => RunResult::Failure(err.to_string()),
    };

    Ok(LifecycleWorld {
        outcome: Some(outcome),
        teardown: Some(context.teardown),
        ..lifecycle_world
    })
}

#[then("the run succeeds with results \"{text}\"")]
fn run_succeeds(lifecycle_world: &LifecycleWorld, text: String) -> Result<(), StepError> {
    match &lifecycle_world.outcome {
        Some(RunResult::Success(Some(actual))) if *actual == text => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected success with results '{text}', got {other:?}"
        ))),
    }
}

#[then("the run fails mentioning \"{text}\"")]
fn run_fails(lifecycle_world: &LifecycleWorld, text: String) -> Result<(), StepError> {
    match &lifecycle_world.outcome {
        Some(RunResult::Failure(message)) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure mentioning '{text}', got {other:?}"
        ))),
    }
}

#[then("the instance is terminated exactly once")]
fn terminated_once(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let terminated = lifecycle_world.market.terminated();
    if terminated == vec![InstanceId::new(SCRIPTED_INSTANCE_ID)] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one termination of {SCRIPTED_INSTANCE_ID}, got {terminated:?}"
        )))
    }
}

#[then("instance \"{id}\" is terminated")]
fn instance_terminated(lifecycle_world: &LifecycleWorld, id: String) -> Result<(), StepError> {
    let terminated = lifecycle_world.market.terminated();
    if terminated == vec![InstanceId::new(id.as_str())] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected termination of {id}, got {terminated:?}"
        )))
    }
}

#[then("no instance is terminated")]
fn nothing_terminated(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let terminated = lifecycle_world.market.terminated();
    if terminated.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no termination, got {terminated:?}"
        )))
    }
}

#[then("no instance was created")]
fn nothing_created(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    if lifecycle_world.market.created().is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "create should not be called for an existing instance",
        )))
    }
}

#[then("no file transfer was attempted")]
fn no_transfer(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    let invocations = lifecycle_world.runner.invocations();
    if invocations.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no ssh/scp invocations, got {invocations:?}"
        )))
    }
}

#[then("teardown reports a failure")]
fn teardown_failed(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    match &lifecycle_world.teardown {
        Some(Teardown::Failed { .. }) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a failed teardown, got {other:?}"
        ))),
    }
}

#[then("teardown leaves the instance running")]
fn teardown_skipped(lifecycle_world: &LifecycleWorld) -> Result<(), StepError> {
    match &lifecycle_world.teardown {
        Some(Teardown::Skipped(_)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a skipped teardown, got {other:?}"
        ))),
    }
}
