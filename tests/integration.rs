use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_amare"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        eprintln!("failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
    }
    output.status.success()
}

fn config_contents(survivability: &str) -> String {
    String::new()
        + "[model]\n"
        + "sensitivity = 0.42\n"
        + "survivability = "
        + survivability
        + "\n"
        + "batch_size = 50\n"
        + "\n"
        + "[init]\n"
        + "n_agents = 400\n"
        + "beauty = { dist = \"normal\", mean = 5.5, std_dev = 1.5 }\n"
        + "\n"
        + "[output]\n"
        + "steps_per_file = 256\n"
        + "steps_per_save = 4\n"
        + "hist_bins = 8\n"
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    fs::write(&config_path, config_contents("0.9746794344808963"))
        .expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));

    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]));

    for run_dir in ["run-0000", "run-0001"] {
        let run_dir = test_dir.join(run_dir);
        assert!(run_dir.join("checkpoint.msgpack").is_file());
        assert!(run_dir.join("trajectory-0000.msgpack").is_file());
        assert!(run_dir.join("trajectory-0001.msgpack").is_file());
    }

    assert!(run_bin(&["--sim-dir", test_dir_str, "analyze"]));
    assert!(test_dir.join("run-0000").join("results.msgpack").is_file());
    assert!(test_dir.join("run-0001").join("results.msgpack").is_file());

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_changed_config_on_resume() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("changed_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    fs::write(&config_path, config_contents("0.9")).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));

    fs::write(&config_path, config_contents("0.5")).expect("failed to write config file");
    assert!(!run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]));

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_invalid_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let contents = config_contents("0.9").replace("n_agents = 400", "n_agents = 0");
    fs::write(test_dir.join("config.toml"), contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
