use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_predation"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");
        eprintln!("binary failed with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
    }
    output.status.success()
}

fn write_config(test_dir: &Path, config_contents: &str) {
    fs::remove_dir_all(test_dir).ok();
    fs::create_dir(test_dir).expect("failed to create test directory");
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    let config_contents = String::new()
        + "[model]\n"
        + "width = 20\n"
        + "height = 20\n"
        + "activation = \"global\"\n"
        + "termination = \"both\"\n"
        + "\n"
        + "[model.prey]\n"
        + "reproduce = 0.04\n"
        + "\n"
        + "[model.predator]\n"
        + "reproduce = 0.05\n"
        + "max_energy = 80.0\n"
        + "\n"
        + "[model.grass]\n"
        + "enabled = true\n"
        + "\n"
        + "[model.grass.regrowth]\n"
        + "policy = \"continuous\"\n"
        + "regrowth_rate = 0.5\n"
        + "max_energy = 4.0\n"
        + "min_energy_regrowth = 0.5\n"
        + "\n"
        + "[init]\n"
        + "n_predators = 20\n"
        + "n_prey = 80\n"
        + "energy_predators = 20.0\n"
        + "energy_prey = [ 2.0, 8.0,]\n"
        + "\n"
        + "[output]\n"
        + "steps_per_file = 100\n"
        + "steps_per_save = 10\n";
    write_config(&test_dir, &config_contents);

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create", "--n-runs", "2"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(test_dir.join("run-0002").is_dir());

    assert!(run_bin(&[
        "--sim-dir",
        test_dir_str,
        "resume",
        "--run-idx",
        "0",
        "--n-files",
        "2",
    ]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]));

    assert!(run_bin(&["--sim-dir", test_dir_str, "analyze"]));
    for run in ["run-0000", "run-0001", "run-0002"] {
        let run_dir = test_dir.join(run);
        assert!(run_dir.join("trajectory-0000.msgpack").is_file());
        assert!(run_dir.join("checkpoint.msgpack").is_file());
        let results = fs::read_to_string(run_dir.join("results.json"))
            .expect("failed to read results file");
        assert!(results.contains("\"population\""));
        assert!(results.contains("\"lifespan\""));
    }

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_is_rejected() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_config");

    let config_contents = String::new()
        + "[model]\n"
        + "width = 10\n"
        + "height = 10\n"
        + "\n"
        + "[model.prey]\n"
        + "reproduce = 1.5\n"
        + "\n"
        + "[model.predator]\n"
        + "reproduce = 0.05\n"
        + "\n"
        + "[init]\n"
        + "n_predators = 5\n"
        + "n_prey = 5\n"
        + "energy_predators = 10.0\n"
        + "energy_prey = 10.0\n"
        + "\n"
        + "[output]\n"
        + "steps_per_file = 10\n"
        + "steps_per_save = 10\n";
    write_config(&test_dir, &config_contents);

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(!test_dir.join("run-0000").exists());
    assert!(!run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "3"]));

    fs::remove_dir_all(&test_dir).ok();
}
