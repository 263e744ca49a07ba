//! Integration tests for rendering templates from a directory store

use super::test_utils::Workspace;
use assimilate::config::ConfigLoader;
use assimilate::cycle::{context, Cycle};
use assimilate::error::RenderError;
use assimilate::template::{
    DirectoryTemplateStore, Node, Renderer, TemplateContext, TemplateId, TemplateStore,
};
use assimilate::time::parse_timestamp;
use assimilate::window::Window;
use std::fs;

fn render_setup(ws: &Workspace, observations: &[&str]) -> (Renderer, TemplateContext) {
    let path = ws.write_config(observations, "");
    let config = ConfigLoader::load_from_file(&path).unwrap();
    let time = parse_timestamp("2021-12-12T00:00:00Z").unwrap();
    let cycle = Cycle::new(&config, time);
    let window = Window::compute(time, &config.window).unwrap();
    let ctx = context::build(&config, &cycle, &window).unwrap();
    let store = DirectoryTemplateStore::new(&config.templates.root, &config.templates.interface)
        .with_records_path(config.observations.records_path.clone());
    (Renderer::from_store(store), ctx)
}

#[test]
fn test_render_variational_document() {
    let ws = Workspace::new();
    let (renderer, ctx) = render_setup(&ws, &["aircraft", "amsua_n19"]);

    let doc = renderer
        .render(&TemplateId::Executable("variational3D".into()), &ctx)
        .unwrap();
    assert_eq!(doc.delegate_count(), 0);

    let cost = doc.get_path(&["cost function"]).unwrap();
    assert_eq!(
        cost.get_path(&["window begin"]).and_then(Node::as_str),
        Some("2021-12-11T21:00:00Z")
    );
    assert_eq!(cost.get_path(&["window length"]).and_then(Node::as_str), Some("PT6H"));
    assert_eq!(cost.get_path(&["geometry", "npx"]).and_then(Node::as_int), Some(91));
    assert_eq!(
        cost.get_path(&["geometry", "layout"])
            .and_then(Node::as_seq)
            .map(|s| s.len()),
        Some(2)
    );

    let observers = cost
        .get_path(&["observations", "observers"])
        .and_then(Node::as_seq)
        .unwrap();
    assert_eq!(observers.len(), 2);
    assert_eq!(
        observers[0].get_path(&["obs space", "name"]).and_then(Node::as_str),
        Some("Aircraft")
    );
    let satbias = observers[1]
        .get_path(&["obs bias", "input file"])
        .and_then(Node::as_str)
        .unwrap();
    assert!(satbias.ends_with("run/20211212T000000Z/amsua_n19.20211211T210000Z.satbias.nc4"));

    // Output is valid YAML that parses back to the same structure
    let text = doc.to_yaml_string().unwrap();
    let reparsed: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert!(reparsed.get("cost function").is_some());
}

#[test]
fn test_records_path_takes_precedence() {
    let ws = Workspace::new();
    let records = ws.root().join("records");
    fs::create_dir_all(&records).unwrap();
    fs::write(
        records.join("aircraft.yaml"),
        "obs space:\n  name: Aircraft (records)\n",
    )
    .unwrap();

    let path = ws.write_config_with(
        &["aircraft"],
        &format!("records_path = '{}'", records.display()),
        "",
    );

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let store = DirectoryTemplateStore::new(&config.templates.root, &config.templates.interface)
        .with_records_path(config.observations.records_path.clone());
    let names = store.observation_names().unwrap();
    assert_eq!(names, vec!["aircraft", "amsua_n19"]);

    let time = parse_timestamp("2021-12-12T00:00:00Z").unwrap();
    let cycle = Cycle::new(&config, time);
    let window = Window::compute(time, &config.window).unwrap();
    let ctx = context::build(&config, &cycle, &window).unwrap();
    let doc = Renderer::from_store(store)
        .render_observation("aircraft", &ctx)
        .unwrap();
    assert_eq!(
        doc.get_path(&["obs space", "name"]).and_then(Node::as_str),
        Some("Aircraft (records)")
    );
}

#[test]
fn test_unresolved_key_names_template_and_key() {
    let ws = Workspace::new();
    ws.template(
        "interfaces/geos_atmosphere/model/geometry",
        "npx: {{no_such_key}}\n",
    );
    let (renderer, ctx) = render_setup(&ws, &["aircraft"]);

    match renderer.render(&TemplateId::Executable("variational3D".into()), &ctx) {
        Err(RenderError::UnresolvedKey { template, key }) => {
            assert_eq!(key, "no_such_key");
            assert!(template.contains("geometry"), "{}", template);
        }
        other => panic!("expected UnresolvedKey, got {:?}", other),
    }
}

#[test]
fn test_missing_observation_template() {
    let ws = Workspace::new();
    let (renderer, ctx) = render_setup(&ws, &["sondes"]);
    assert!(matches!(
        renderer.render(&TemplateId::Executable("variational3D".into()), &ctx),
        Err(RenderError::TemplateNotFound(_))
    ));
}
