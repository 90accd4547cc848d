use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn run_cli(repo: &Path, home: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_recipe-box"));
    cmd.current_dir(repo)
        .args(args)
        .env("HOME", home)
        .env_remove("RECIPE_BOX_LOG");
    if stdin.is_none() {
        return cmd.output().expect("command runs");
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("command spawns");
    {
        let mut pipe = child.stdin.take().expect("stdin pipe");
        pipe.write_all(stdin.expect("stdin content").as_bytes())
            .expect("stdin write");
    }
    child.wait_with_output().expect("command output")
}

fn run_json(repo: &Path, home: &Path, args: &[&str], stdin: Option<&str>) -> Value {
    let output = run_cli(repo, home, args, stdin);
    assert!(
        output.status.success(),
        "command failed: args={args:?}\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn run_error(repo: &Path, home: &Path, args: &[&str]) -> Value {
    let output = run_cli(repo, home, args, None);
    assert!(
        !output.status.success(),
        "command unexpectedly succeeded: args={args:?}\nstdout={}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().expect("error payload line");
    serde_json::from_str(last).expect("json stderr")
}

fn workspace() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let repo = temp.path().join("repo");
    let home = temp.path().join("home");
    fs::create_dir_all(&repo).expect("repo dir");
    fs::create_dir_all(&home).expect("home dir");
    (temp, repo, home)
}

#[test]
fn commands_require_init() {
    let (_temp, repo, home) = workspace();
    let err = run_error(&repo, &home, &["tags", "list"]);
    assert_eq!(err["error"]["code"], "not_initialized");
}

#[test]
fn init_writes_config_and_database() {
    let (_temp, repo, home) = workspace();
    let init = run_json(&repo, &home, &["init"], None);
    assert_eq!(init["status"], "ok");
    assert_eq!(init["mode"], "repo");
    assert!(repo.join(".recipe-box/config.yml").is_file());
    assert!(repo.join(".recipe-box/recipes.sqlite").is_file());

    let again = run_json(&repo, &home, &["init"], None);
    assert_eq!(again["status"], "ok");
}

#[test]
fn tag_tree_and_cascading_delete_roundtrip() {
    let (_temp, repo, home) = workspace();
    let _ = run_json(&repo, &home, &["init"], None);

    let meal = run_json(&repo, &home, &["tags", "add", "Meal"], None);
    let meal_id = meal["tag"]["id"].as_i64().expect("meal id").to_string();
    let _ = run_json(
        &repo,
        &home,
        &["tags", "add", "Lunch", "--parent", &meal_id],
        None,
    );
    let _ = run_json(
        &repo,
        &home,
        &["tags", "add", "Breakfast", "--parent", &meal_id],
        None,
    );

    let tree = run_json(&repo, &home, &["tags", "list"], None);
    let roots = tree["tags"].as_array().expect("roots");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], "Meal");
    assert_eq!(roots[0]["children"][0]["name"], "Breakfast");
    assert_eq!(roots[0]["children"][1]["name"], "Lunch");
    assert_eq!(tree["reachable_count"], 3);

    let recipe = run_json(
        &repo,
        &home,
        &[
            "add",
            "--title",
            "Omelette",
            "--ingredients",
            "eggs",
            "--instructions",
            "whisk, cook",
            "--tag",
            "Meal",
            "--tag",
            "Quick",
        ],
        None,
    );
    let recipe_id = recipe["id"].as_i64().expect("recipe id");

    let usage = run_json(&repo, &home, &["tags", "usage", &meal_id], None);
    assert_eq!(usage["count"], 1);
    assert_eq!(usage["recipes"][0]["title"], "Omelette");

    let removed = run_json(&repo, &home, &["tags", "rm", &meal_id], None);
    let report = &removed["report"];
    assert_eq!(report["affected_count"], 1);
    assert_eq!(report["affected_recipes"][0]["id"], recipe_id);
    assert_eq!(report["promoted_count"], 2);
    assert_eq!(report["promoted_children"][0]["name"], "Breakfast");
    assert_eq!(report["promoted_children"][1]["name"], "Lunch");
    assert!(report["new_parent_id"].is_null());

    let tree = run_json(&repo, &home, &["tags", "list"], None);
    let root_names: Vec<&str> = tree["tags"]
        .as_array()
        .expect("roots")
        .iter()
        .map(|node| node["name"].as_str().expect("name"))
        .collect();
    assert_eq!(root_names, vec!["Breakfast", "Lunch", "Quick"]);

    let show = run_json(&repo, &home, &["show", &recipe_id.to_string()], None);
    assert_eq!(show["recipe"]["tags"], serde_json::json!(["Quick"]));

    let again = run_json(&repo, &home, &["tags", "rm", &meal_id], None);
    assert_eq!(again["report"]["affected_count"], 0);
    assert_eq!(again["report"]["promoted_count"], 0);
}

#[test]
fn invalid_ids_and_duplicates_map_to_error_codes() {
    let (_temp, repo, home) = workspace();
    let _ = run_json(&repo, &home, &["init"], None);

    let err = run_error(&repo, &home, &["tags", "rm", "abc"]);
    assert_eq!(err["error"]["code"], "invalid_argument");
    let err = run_error(&repo, &home, &["tags", "usage", "0"]);
    assert_eq!(err["error"]["code"], "invalid_argument");

    let _ = run_json(&repo, &home, &["tags", "add", "Dinner"], None);
    let err = run_error(&repo, &home, &["tags", "add", "Dinner"]);
    assert_eq!(err["error"]["code"], "duplicate_name");

    let err = run_error(&repo, &home, &["rm", "41"]);
    assert_eq!(err["error"]["code"], "not_found");

    let err = run_error(&repo, &home, &["add", "--title", "No body"]);
    assert_eq!(err["error"]["code"], "missing_field");
}

#[test]
fn stdin_recipes_update_and_search() {
    let (_temp, repo, home) = workspace();
    let _ = run_json(&repo, &home, &["init"], None);

    let soup = run_json(
        &repo,
        &home,
        &["add", "--stdin"],
        Some(
            r#"{"title":"Tomato Soup","description":"Warming","ingredients":"tomatoes","instructions":"blend","servings":4,"tags":["Dinner","Vegan","Dinner"]}"#,
        ),
    );
    let soup_id = soup["id"].as_i64().expect("soup id").to_string();
    let _ = run_json(
        &repo,
        &home,
        &["add", "--stdin"],
        Some(r#"{"title":"Steak","ingredients":"beef","instructions":"sear","tags":["Dinner"]}"#),
    );

    let both = run_json(
        &repo,
        &home,
        &["search", "--tag", "Dinner", "--tag", "Vegan"],
        None,
    );
    assert_eq!(both["count"], 1);
    assert_eq!(both["recipes"][0]["title"], "Tomato Soup");
    assert_eq!(both["recipes"][0]["tags"], serde_json::json!(["Dinner", "Vegan"]));

    let dinner = run_json(&repo, &home, &["search", "--tag", "Dinner"], None);
    assert_eq!(dinner["count"], 2);
    assert_eq!(dinner["recipes"][0]["title"], "Steak");

    let _ = run_json(
        &repo,
        &home,
        &["update", &soup_id, "--stdin"],
        Some(r#"{"title":"Tomato Soup","ingredients":"tomatoes","instructions":"blend","tags":["Dinner"]}"#),
    );
    let vegan = run_json(&repo, &home, &["search", "--tag", "Vegan"], None);
    assert_eq!(vegan["count"], 0);

    let text = run_json(&repo, &home, &["search", "--text", "SOUP"], None);
    assert_eq!(text["count"], 1);
    assert!(text["recipes"][0]["servings"].is_null());

    let _ = run_json(&repo, &home, &["rm", &soup_id], None);
    let err = run_error(&repo, &home, &["show", &soup_id]);
    assert_eq!(err["error"]["code"], "not_found");
}

#[test]
fn global_mode_uses_home_storage_and_config() {
    let (_temp, repo, home) = workspace();
    let init = run_json(&repo, &home, &["init", "--global"], None);
    assert_eq!(init["mode"], "global");
    assert!(home.join(".recipe-box/config.yml").is_file());
    assert!(!repo.join(".recipe-box").exists());

    fs::write(
        home.join(".recipe-box/config.yml"),
        "database: ~/kitchen.sqlite\nlog_level: error\n",
    )
    .expect("rewrite global config");
    let _ = run_json(&repo, &home, &["tags", "add", "Snack", "--global"], None);
    assert!(home.join("kitchen.sqlite").is_file());

    let flat = run_json(&repo, &home, &["tags", "list", "--flat", "--global"], None);
    assert_eq!(flat["tags"][0]["name"], "Snack");
}
