//! Behaviour-driven step definitions for repository CLI scenarios.

use super::helpers::{Workspace, output};
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use std::cell::RefCell;

/// State shared by the steps of one scenario.
struct CommandWorld {
    workspace: Workspace,
    output: RefCell<Option<Value>>,
    failure: RefCell<Option<CliError>>,
}

impl CommandWorld {
    fn run(&self, args: &[&str]) {
        let mut invocation = vec!["trailstore"];
        invocation.extend_from_slice(args);
        invocation.extend(["--repo", self.workspace.repo().as_str()]);
        let mut buffer = Vec::new();
        let outcome = Cli::try_parse_from(invocation)
            .map_err(CliError::ArgumentParsing)
            .and_then(|cli| dispatch(cli.command, &mut buffer));
        match outcome {
            Ok(()) => {
                self.output.replace(Some(output(&buffer)));
                self.failure.replace(None);
            }
            Err(err) => {
                self.output.replace(None);
                self.failure.replace(Some(err));
            }
        }
    }

    fn printed(&self) -> Value {
        self.output.borrow().clone().unwrap_or_else(|| {
            panic!("command failed: {:?}", self.failure.borrow())
        })
    }
}

#[fixture]
fn world() -> CommandWorld {
    CommandWorld {
        workspace: Workspace::new(),
        output: RefCell::new(None),
        failure: RefCell::new(None),
    }
}

#[given("a repository with trail and media categories")]
fn repository_exists(#[from(world)] world: &CommandWorld) {
    assert!(world.workspace.repo().join("storage.toml").is_file());
}

#[given("the ride has been ingested")]
fn ride_ingested(#[from(world)] world: &CommandWorld) {
    let ride = world.workspace.ride();
    world.run(&["ingest", ride.as_str()]);
    assert!(world.failure.borrow().is_none(), "ingest failed");
}

#[when("I run \"ingest\" on the ride")]
fn run_ingest(#[from(world)] world: &CommandWorld) {
    let ride = world.workspace.ride();
    world.run(&["ingest", ride.as_str()]);
}

#[when("I run \"list\"")]
fn run_list(#[from(world)] world: &CommandWorld) {
    world.run(&["list"]);
}

#[when("I run \"move\" on \"trail/2024/01/ride.gpx\" into folder \"archive\"")]
fn run_move_to_archive(#[from(world)] world: &CommandWorld) {
    world.run(&["move", "trail/2024/01/ride.gpx", "--folder", "archive"]);
}

#[when("I run \"rename\" on \"trail/2024/01/ride.gpx\" without a new name")]
fn run_rename_without_name(#[from(world)] world: &CommandWorld) {
    world.run(&["rename", "trail/2024/01/ride.gpx"]);
}

#[then("the command prints the path \"trail/2024/01/ride.gpx\"")]
fn printed_stored_path(#[from(world)] world: &CommandWorld) {
    assert_eq!(world.printed()["path"], "trail/2024/01/ride.gpx");
}

#[then("the listing contains \"trail/2024/01/ride.gpx\"")]
fn listing_contains_ride(#[from(world)] world: &CommandWorld) {
    let listed = world.printed();
    let paths: Vec<_> = listed
        .as_array()
        .expect("listing is an array")
        .iter()
        .filter_map(|entry| entry["path"].as_str())
        .collect();
    assert_eq!(paths, ["trail/2024/01/ride.gpx"]);
}

#[then("the command prints the destination \"trail/archive/ride.gpx\"")]
fn printed_destination(#[from(world)] world: &CommandWorld) {
    assert_eq!(world.printed()["to"], "trail/archive/ride.gpx");
    assert!(world.workspace.repo().join("trail/archive/ride.gpx").is_file());
}

#[then("the CLI reports that the \"new-name\" argument is missing")]
fn reports_missing_name(#[from(world)] world: &CommandWorld) {
    match world.failure.borrow().as_ref() {
        Some(CliError::MissingArgument { field, .. }) => assert_eq!(*field, ARG_NEW_NAME),
        other => panic!("expected a missing argument, found {other:?}"),
    }
}

macro_rules! register_command_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/repository_commands.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CommandWorld) {
            let _ = world;
        }
    };
}

register_command_scenario!(ingest_and_list, "ingesting a track and listing it");
register_command_scenario!(move_into_folder, "moving a track into another folder");
register_command_scenario!(rename_needs_a_name, "rejecting a rename without a new name");
