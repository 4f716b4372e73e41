//! Commands run against scratch repositories.

use super::helpers::{Workspace, output};
use super::*;
use crate::ingest::{IngestConfig, run_ingest_with};
use crate::inspect::{GeojsonConfig, run_categories_with, run_geojson_with, run_list_with};
use crate::manage::{
    DeleteConfig, LocateConfig, MoveConfig, RenameConfig, run_delete_with, run_locate_with,
    run_move_with, run_rename_with,
};
use rstest::{fixture, rstest};
use serde_json::Value;
use trailstore_repo::{ErrorKind, MoveTarget};

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn ingest(workspace: &Workspace, file: Utf8PathBuf, location: Option<(f64, f64)>) -> Value {
    let mut buffer = Vec::new();
    let config = IngestConfig {
        repo: workspace.repo().clone(),
        file,
        category: None,
        location,
        date: None,
    };
    run_ingest_with(config, &mut buffer).expect("ingest");
    output(&buffer)
}

fn listing(workspace: &Workspace) -> Vec<String> {
    let mut buffer = Vec::new();
    run_list_with(workspace.repo(), &mut buffer).expect("list");
    output(&buffer)
        .as_array()
        .expect("array")
        .iter()
        .map(|entry| entry["path"].as_str().expect("path").to_owned())
        .collect()
}

fn repository_error(err: CliError) -> ErrorKind {
    match err {
        CliError::Repository(err) => err.kind(),
        other => panic!("expected a repository error, found {other:?}"),
    }
}

#[rstest]
fn ingest_prints_the_stored_path(workspace: Workspace) {
    let stored = ingest(&workspace, workspace.ride(), None);
    assert_eq!(stored["path"], "trail/2024/01/ride.gpx");
    assert_eq!(stored["category"], "trail");
    assert!(workspace.repo().join("trail/2024/01/ride.gpx").is_file());
}

#[rstest]
fn ingest_reports_unreadable_input(workspace: Workspace) {
    let config = IngestConfig {
        repo: workspace.repo().clone(),
        file: workspace.repo().join("missing.gpx"),
        category: None,
        location: None,
        date: None,
    };
    let err = run_ingest_with(config, &mut Vec::new()).expect_err("missing input");
    assert!(matches!(err, CliError::ReadInput { .. }), "got {err:?}");
}

#[rstest]
fn list_reports_category_and_kind(workspace: Workspace) {
    ingest(&workspace, workspace.ride(), None);
    let mut buffer = Vec::new();
    run_list_with(workspace.repo(), &mut buffer).expect("list");
    let files = output(&buffer);
    assert_eq!(files[0]["path"], "trail/2024/01/ride.gpx");
    assert_eq!(files[0]["category"], "trail");
    assert_eq!(files[0]["kind"], "track");
}

#[rstest]
fn geojson_prints_a_feature_collection(workspace: Workspace) {
    ingest(&workspace, workspace.ride(), None);
    let mut buffer = Vec::new();
    let config = GeojsonConfig {
        repo: workspace.repo().clone(),
        path: "trail/2024/01/ride.gpx".to_owned(),
    };
    run_geojson_with(config, &mut buffer).expect("geojson");
    let collection = output(&buffer);
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"][0]["geometry"]["type"], "LineString");
}

#[rstest]
fn rename_then_delete(workspace: Workspace) {
    ingest(&workspace, workspace.ride(), None);

    let mut buffer = Vec::new();
    let rename = RenameConfig {
        repo: workspace.repo().clone(),
        path: "trail/2024/01/ride.gpx".to_owned(),
        new_name: "morning".to_owned(),
    };
    run_rename_with(rename, &mut buffer).expect("rename");
    assert_eq!(output(&buffer)["to"], "trail/2024/01/morning.gpx");

    let mut buffer = Vec::new();
    let delete = DeleteConfig {
        repo: workspace.repo().clone(),
        path: "trail/2024/01/morning.gpx".to_owned(),
    };
    run_delete_with(delete, &mut buffer).expect("delete");
    assert_eq!(output(&buffer)["deleted"], "trail/2024/01/morning.gpx");
    assert!(listing(&workspace).is_empty());
}

#[rstest]
fn move_across_kinds_needs_the_flag(workspace: Workspace) {
    ingest(&workspace, workspace.ride(), None);
    let config = |options| MoveConfig {
        repo: workspace.repo().clone(),
        path: "trail/2024/01/ride.gpx".to_owned(),
        target: MoveTarget::category("media"),
        options,
    };

    let err = run_move_with(config(RepositoryOptions::default()), &mut Vec::new())
        .expect_err("tracks stay out of media by default");
    assert_eq!(repository_error(err), ErrorKind::Validation);

    let mut buffer = Vec::new();
    let allow = RepositoryOptions {
        cross_kind_moves: trailstore_repo::CrossKindMoves::Allow,
    };
    run_move_with(config(allow), &mut buffer).expect("move");
    assert_eq!(output(&buffer)["to"], "media/ride.gpx");
}

#[rstest]
fn locate_records_media_positions_only(workspace: Workspace) {
    ingest(&workspace, workspace.ride(), None);
    let stored = ingest(&workspace, workspace.photo(), Some((1.0, 2.0)));
    assert_eq!(stored["path"], "media/photo.jpg");

    let mut buffer = Vec::new();
    let locate = LocateConfig {
        repo: workspace.repo().clone(),
        path: "media/photo.jpg".to_owned(),
        latitude: -33.9,
        longitude: 18.4,
    };
    run_locate_with(locate.clone(), &mut buffer).expect("locate");
    let sidecar = output(&buffer);
    assert_eq!(sidecar["latitude"], -33.9);
    assert_eq!(sidecar["longitude"], 18.4);

    let track = LocateConfig {
        path: "trail/2024/01/ride.gpx".to_owned(),
        ..locate
    };
    let err = run_locate_with(track, &mut Vec::new()).expect_err("tracks take no location");
    assert_eq!(repository_error(err), ErrorKind::Validation);
}

#[rstest]
fn categories_are_listed_by_identifier(workspace: Workspace) {
    let mut buffer = Vec::new();
    run_categories_with(workspace.repo(), &mut buffer).expect("categories");
    let ids: Vec<_> = output(&buffer)
        .as_array()
        .expect("array")
        .iter()
        .map(|category| category["id"].as_str().expect("id").to_owned())
        .collect();
    assert_eq!(ids, ["media", "trail"]);
}

#[rstest]
fn missing_files_surface_as_not_found(workspace: Workspace) {
    let config = DeleteConfig {
        repo: workspace.repo().clone(),
        path: "trail/2024/01/ghost.gpx".to_owned(),
    };
    let err = run_delete_with(config, &mut Vec::new()).expect_err("nothing to delete");
    assert_eq!(repository_error(err), ErrorKind::NotFound);
}
