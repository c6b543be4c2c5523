//! BDD scenarios for the benchmark lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleWorld, lifecycle_world};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Successful run releases the instance"
)]
fn scenario_successful_run(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Failed instance is still released"
)]
fn scenario_failed_instance(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Missing payload file aborts before any transfer"
)]
fn scenario_missing_payload(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Setup script failure is surfaced and the instance released"
)]
fn scenario_script_failure(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Teardown failure preserves a successful outcome"
)]
fn scenario_teardown_failure(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Cleanup can be disabled"
)]
fn scenario_cleanup_disabled(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Existing instance skips provisioning"
)]
fn scenario_existing_instance(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "No eligible offer leaves nothing to release"
)]
fn scenario_no_eligible_offer(lifecycle_world: LifecycleWorld) {
    let _ = lifecycle_world;
}
